//! Controller tying the sensor, fan relay and display together.
//!
//! All mutable state lives in one [`ControllerState`] behind a single
//! `tokio::sync::Mutex`. The three periodic activities (temperature
//! sampling, default-mode rendering and auto-inversion) are tasks in a
//! [`TaskManager`]; every tick locks the state, re-checks its cancellation
//! token and only then touches hardware. A tick cancelled while it waited
//! for the lock therefore never runs.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::{
    sync::{Mutex, MutexGuard, broadcast},
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

use crate::{
    bus::I2cBus,
    config::{Config, TempUnit},
    display::{DisplayRenderer, DisplayTransport},
    error::HatError,
    event::{Event, EventBus},
    fan_controller::FanController,
    mode::{DisplayMode, ModeStateMachine, Transition},
    network::AddressSource,
    sensors::TemperatureSensor,
    task_manager::TaskManager,
};

pub const TEMPERATURE_TASK: &str = "temperature-sample";
pub const DEFAULT_RENDER_TASK: &str = "default-render";
pub const AUTO_INVERT_TASK: &str = "auto-invert";

/// Shown on the status line when the interface has no address.
pub const NO_ADDRESS: &str = "N/A";

/// Hardware handles handed to the controller at startup.
pub struct Hardware {
    pub bus: Box<dyn I2cBus>,
    pub display: Box<dyn DisplayTransport>,
    pub sensor: Arc<dyn TemperatureSensor>,
    pub addresses: Box<dyn AddressSource>,
}

struct Devices {
    bus: Box<dyn I2cBus>,
    display: Box<dyn DisplayTransport>,
    addresses: Box<dyn AddressSource>,
}

struct ControllerState {
    mode: ModeStateMachine,
    fan: FanController,
    renderer: DisplayRenderer,
    current_temperature: f32,
    auto_invert: bool,
    tasks: TaskManager,
    // None once stopped
    devices: Option<Devices>,
}

struct Shared {
    config: Config,
    sensor: Arc<dyn TemperatureSensor>,
    events: EventBus,
    state: Mutex<ControllerState>,
}

/// Builds the three status lines shown in default mode.
pub fn status_lines(address: &str, celsius: f32, fan_running: bool, unit: TempUnit) -> [String; 3] {
    [
        format!("eth: {address}"),
        format!("Temp: {}{}", unit.convert(celsius), unit.symbol()),
        format!("Fan: {}", if fan_running { "ON" } else { "OFF" }),
    ]
}

impl ControllerState {
    fn devices(&mut self) -> Result<&mut Devices> {
        self.devices.as_mut().ok_or_else(|| HatError::Stopped.into())
    }

    fn clear_display(&mut self) -> Result<()> {
        self.devices()?.display.clear_display()
    }

    fn invert(&mut self, value: Option<bool>, events: &EventBus) -> Result<bool> {
        let Some(devices) = self.devices.as_mut() else {
            return Err(HatError::Stopped.into());
        };
        let inverted = self.renderer.invert(devices.display.as_mut(), value)?;
        events.publish(Event::InversionChanged(inverted));
        Ok(inverted)
    }

    fn write_lines<S: AsRef<str>>(&mut self, lines: &[S], clear_first: bool) -> Result<()> {
        let Some(devices) = self.devices.as_mut() else {
            return Err(HatError::Stopped.into());
        };
        self.renderer
            .write_lines(devices.display.as_mut(), lines, clear_first)
    }

    fn set_fan_power(&mut self, power: bool, events: &EventBus) -> Result<()> {
        let Some(devices) = self.devices.as_mut() else {
            return Err(HatError::Stopped.into());
        };
        let previous = self.fan.is_running();
        self.fan.set_power(devices.bus.as_mut(), power)?;
        if previous != power {
            events.publish(Event::FanPowerChanged(power));
        }
        Ok(())
    }

    fn record_temperature(&mut self, celsius: f32, events: &EventBus) {
        self.current_temperature = celsius;
        debug!("Temperature: {celsius:.1}°C");
        events.publish(Event::TemperatureSampled(celsius));

        let Some(devices) = self.devices.as_mut() else {
            return;
        };
        match self.fan.update(devices.bus.as_mut(), celsius) {
            Ok(Some(command)) => events.publish(Event::FanPowerChanged(command.is_on())),
            Ok(None) => {}
            Err(e) => error!("Fan update failed: {e:#}"),
        }
    }

    fn render_default_frame(&mut self, config: &Config) -> Result<()> {
        let Some(devices) = self.devices.as_mut() else {
            return Err(HatError::Stopped.into());
        };

        let address = match devices
            .addresses
            .first_address(&config.network_interface_name)
        {
            Ok(address) => address,
            Err(e) => {
                debug!("Status line address unavailable: {e:#}");
                NO_ADDRESS.to_string()
            }
        };

        let mut lines = status_lines(
            &address,
            self.current_temperature,
            self.fan.is_running(),
            config.temp_unit,
        )
        .to_vec();
        // layouts with more rows than the status frame get blank rows
        if lines.len() < self.renderer.char_lines() {
            lines.resize(self.renderer.char_lines(), String::new());
        }

        self.renderer
            .write_lines(devices.display.as_mut(), &lines, true)
    }
}

/// The board controller.
///
/// Created with [`Controller::start`], which arms the periodic activities
/// right away. Call [`Controller::stop`] to cancel them and release the
/// hardware.
///
/// # Example
///
/// ```no_run
/// use poe_hatd::{config::Config, controller::Controller, drivers};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// let hardware = drivers::open_hardware(&config)?;
/// let controller = Controller::start(config, hardware).await?;
///
/// controller.set_display_mode_str("custom").await?;
/// controller.write_lines(&["hello", "from", "the hat"], true).await?;
///
/// controller.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct Controller {
    shared: Arc<Shared>,
    root_token: CancellationToken,
}

impl Controller {
    /// Validates `config`, takes ownership of `hardware` and starts the
    /// periodic activities.
    pub async fn start(config: Config, hardware: Hardware) -> Result<Self> {
        config.validate()?;

        let Hardware {
            bus,
            display,
            sensor,
            addresses,
        } = hardware;

        let tasks = TaskManager::new();
        let root_token = tasks.global_token.clone();

        let state = ControllerState {
            mode: ModeStateMachine::new(config.display_mode),
            fan: FanController::new(config.fan_address, config.fan_temp_on, config.fan_temp_off),
            renderer: DisplayRenderer::new(
                config.font,
                config.char_lines,
                config.line_height,
                config.oled_inverted,
            ),
            current_temperature: 0.0,
            auto_invert: config.oled_inverted_auto,
            tasks,
            devices: Some(Devices {
                bus,
                display,
                addresses,
            }),
        };

        let controller = Self {
            shared: Arc::new(Shared {
                config,
                sensor,
                events: EventBus::new(),
                state: Mutex::new(state),
            }),
            root_token,
        };

        {
            let shared = &controller.shared;
            let mut state = shared.state.lock().await;

            if let Err(e) = state.invert(Some(shared.config.oled_inverted), &shared.events) {
                warn!("Failed to apply initial display inversion: {e:#}");
            }

            arm_temperature_sampling(shared, &mut state);

            match state.mode.mode() {
                DisplayMode::Default => arm_default_render(shared, &mut state),
                DisplayMode::Custom => {
                    if let Err(e) = state.clear_display() {
                        warn!("Failed to clear display: {e:#}");
                    }
                }
            }

            if state.auto_invert {
                arm_auto_invert(shared, &mut state);
            }

            info!(
                "Controller started (mode: {}, fan on/off: {}/{}°C, auto invert: {})",
                state.mode.mode(),
                shared.config.fan_temp_on,
                shared.config.fan_temp_off,
                state.auto_invert
            );
        }

        if let Some(name) = controller.shared.sensor.sensor_name().await {
            info!("Sampling temperature from {name}");
        }

        Ok(controller)
    }

    /// Configuration the controller was started with.
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Subscribes to state-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    async fn lock_running(&self) -> Result<MutexGuard<'_, ControllerState>> {
        let state = self.shared.state.lock().await;
        if state.devices.is_none() {
            return Err(HatError::Stopped.into());
        }
        Ok(state)
    }

    /// Whether the auto-inversion cycle is armed.
    pub async fn auto_invert(&self) -> bool {
        self.shared.state.lock().await.auto_invert
    }

    /// Arms or cancels the auto-inversion cycle.
    ///
    /// Enabling while already armed keeps the running cycle.
    pub async fn set_auto_invert(&self, enabled: bool) -> Result<()> {
        let mut state = self.lock_running().await?;
        state.auto_invert = enabled;

        if enabled {
            if !state.tasks.is_running(AUTO_INVERT_TASK) {
                arm_auto_invert(&self.shared, &mut state);
            }
        } else {
            state.tasks.cancel(AUTO_INVERT_TASK);
        }
        Ok(())
    }

    pub async fn display_mode(&self) -> DisplayMode {
        self.shared.state.lock().await.mode.mode()
    }

    /// Switches the display mode.
    ///
    /// Setting the current mode does nothing. Entering `Custom` stops the
    /// status cycle and clears the panel; entering `Default` clears the
    /// panel, restarts the cycle and renders one frame before returning.
    pub async fn set_display_mode(&self, mode: DisplayMode) -> Result<()> {
        let mut state = self.lock_running().await?;
        let Some(transition) = state.mode.transition(mode) else {
            return Ok(());
        };

        info!("Display mode: {mode}");
        self.shared.events.publish(Event::DisplayModeChanged(mode));

        match transition {
            Transition::EnterCustom => {
                state.tasks.cancel(DEFAULT_RENDER_TASK);
                state.clear_display()
            }
            Transition::EnterDefault => {
                let cleared = state.clear_display();
                arm_default_render(&self.shared, &mut state);
                cleared?;
                state.render_default_frame(&self.shared.config)
            }
        }
    }

    /// Like [`set_display_mode`](Self::set_display_mode), but takes a mode
    /// name; unknown names select `Default`.
    pub async fn set_display_mode_str(&self, mode: &str) -> Result<()> {
        self.set_display_mode(DisplayMode::from_str_lossy(mode)).await
    }

    /// Fan power as last accepted by the relay.
    pub async fn fan_power(&self) -> bool {
        self.shared.state.lock().await.fan.is_running()
    }

    /// Switches the fan directly, bypassing hysteresis.
    ///
    /// The next temperature sample applies hysteresis again, so an override
    /// outside the band is undone once the temperature crosses a threshold.
    pub async fn set_fan_power(&self, power: bool) -> Result<()> {
        let mut state = self.lock_running().await?;
        state.set_fan_power(power, &self.shared.events)
    }

    /// Toggles inversion when `value` is `None`, otherwise sets it.
    /// Returns the new state.
    pub async fn invert(&self, value: Option<bool>) -> Result<bool> {
        let mut state = self.lock_running().await?;
        state.invert(value, &self.shared.events)
    }

    pub async fn inverted(&self) -> bool {
        self.shared.state.lock().await.renderer.inverted()
    }

    /// Renders `lines` on the panel, clearing it first when `clear_first`.
    ///
    /// At least `charLines` lines are required. In default mode the next
    /// status frame overwrites them.
    pub async fn write_lines<S: AsRef<str>>(&self, lines: &[S], clear_first: bool) -> Result<()> {
        let mut state = self.lock_running().await?;
        state.write_lines(lines, clear_first)
    }

    /// Last sampled temperature in Celsius.
    pub async fn current_temperature(&self) -> f32 {
        self.shared.state.lock().await.current_temperature
    }

    pub async fn is_stopped(&self) -> bool {
        self.shared.state.lock().await.devices.is_none()
    }

    /// Cancels all periodic activities and releases the hardware.
    ///
    /// Calling it again is a no-op. Every later operation fails with
    /// [`HatError::Stopped`].
    pub async fn stop(&self) -> Result<()> {
        let (mut tasks, devices) = {
            let mut state = self.shared.state.lock().await;
            if state.devices.is_none() {
                return Ok(());
            }
            state.tasks.global_token.cancel();
            (std::mem::take(&mut state.tasks), state.devices.take())
        };

        info!("Stopping controller");
        drop(devices);
        self.shared.events.publish(Event::Stopped);

        // tasks wait on the state lock, so it must be released here
        tasks.shutdown_all().await
    }

    #[cfg(test)]
    async fn is_task_running(&self, name: &str) -> bool {
        self.shared.state.lock().await.tasks.is_running(name)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.root_token.cancel();
    }
}

/// Interval whose first tick comes one period from now.
fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn arm_temperature_sampling(shared: &Arc<Shared>, state: &mut ControllerState) {
    let shared = Arc::clone(shared);
    state
        .tasks
        .spawn_task(TEMPERATURE_TASK, move |token| run_temperature_sampling(shared, token));
}

fn arm_default_render(shared: &Arc<Shared>, state: &mut ControllerState) {
    let shared = Arc::clone(shared);
    state
        .tasks
        .spawn_task(DEFAULT_RENDER_TASK, move |token| run_default_render(shared, token));
}

fn arm_auto_invert(shared: &Arc<Shared>, state: &mut ControllerState) {
    let shared = Arc::clone(shared);
    state
        .tasks
        .spawn_task(AUTO_INVERT_TASK, move |token| run_auto_invert(shared, token));
}

async fn run_temperature_sampling(shared: Arc<Shared>, token: CancellationToken) -> Result<()> {
    let mut ticker = ticker(shared.config.temp_update_period());

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let celsius = match shared.sensor.read_celsius().await {
                    Ok(celsius) => celsius,
                    Err(e) => {
                        error!("Temperature read error: {e:#}");
                        continue;
                    }
                };

                let mut state = shared.state.lock().await;
                if token.is_cancelled() {
                    break;
                }
                state.record_temperature(celsius, &shared.events);
            }
        }
    }
    Ok(())
}

async fn run_default_render(shared: Arc<Shared>, token: CancellationToken) -> Result<()> {
    let mut ticker = ticker(shared.config.oled_update_period());

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let mut state = shared.state.lock().await;
                if token.is_cancelled() {
                    break;
                }
                if let Err(e) = state.render_default_frame(&shared.config) {
                    error!("Failed to render status frame: {e:#}");
                }
            }
        }
    }
    Ok(())
}

async fn run_auto_invert(shared: Arc<Shared>, token: CancellationToken) -> Result<()> {
    let mut ticker = ticker(shared.config.oled_inverted_period());

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let mut state = shared.state.lock().await;
                if token.is_cancelled() {
                    break;
                }
                if let Err(e) = state.invert(None, &shared.events) {
                    error!("Auto inversion failed: {e:#}");
                }
            }
        }
    }
    Ok(())
}
