//! Application entry point and builder pattern implementation.

use std::{future::Future, io};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::broadcast::error::RecvError,
};

use crate::{
    config::Config,
    controller::{Controller, Hardware},
    drivers,
    event::Event,
};

/// Main application structure that owns the configuration and hardware
/// until the controller takes them over.
///
/// # Example
///
/// ```no_run
/// use poe_hatd::{application::Application, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load(None)?;
/// Application::builder()
///     .with_config(config)
///     .build()?
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    config: Config,
    hardware: Hardware,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Runs the daemon until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;

        self.run_until(wait_for_shutdown(tokio::signal::ctrl_c(), async move {
            terminate.recv().await;
        }))
        .await
    }

    /// Starts the controller, logs its events until `shutdown` resolves,
    /// then stops it.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let controller = Controller::start(self.config, self.hardware).await?;
        let mut event_rx = controller.subscribe();
        tokio::pin!(shutdown);

        info!("Starting main event loop");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                event = event_rx.recv() => match event {
                    // sampled every tick, logged by the controller at debug level
                    Ok(Event::TemperatureSampled(_)) => {}
                    Ok(event) => info!("Received event: {event:?}"),
                    Err(RecvError::Lagged(n)) => warn!("Event bus lagged by {n} messages"),
                    Err(RecvError::Closed) => bail!("Event bus channel closed unexpectedly"),
                },
            }
        }

        controller
            .stop()
            .await
            .context("Failed to shutdown gracefully")?;
        info!("Main event loop terminated");
        Ok(())
    }
}

/// Resolves on Ctrl+C or when `terminate` fires.
///
/// A Ctrl+C listener that fails to install leaves SIGTERM as the only way
/// out instead of ending the wait.
async fn wait_for_shutdown<C, T>(ctrl_c: C, terminate: T)
where
    C: Future<Output = io::Result<()>>,
    T: Future<Output = ()>,
{
    tokio::pin!(terminate);

    let ctrl_c_failed = tokio::select! {
        result = ctrl_c => match result {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                return;
            }
            Err(e) => {
                warn!("Failed to listen for Ctrl+C, waiting for SIGTERM: {e}");
                true
            }
        },
        () = &mut terminate => false,
    };

    if ctrl_c_failed {
        terminate.await;
    }
    info!("Received SIGTERM, initiating graceful shutdown...");
}

/// Builder pattern for creating Application instances.
///
/// Without explicit hardware, [`build`](ApplicationBuilder::build) opens the
/// devices named in the configuration.
#[derive(Default)]
pub struct ApplicationBuilder {
    config: Option<Config>,
    hardware: Option<Hardware>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration; the built-in defaults are used otherwise.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Supplies already opened hardware.
    pub fn with_hardware(mut self, hardware: Hardware) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// Validates the configuration and opens any missing hardware.
    pub fn build(self) -> Result<Application> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let hardware = match self.hardware {
            Some(hardware) => hardware,
            None => drivers::open_hardware(&config)?,
        };

        Ok(Application { config, hardware })
    }
}
