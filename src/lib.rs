//! # poe_hatd
//!
//! A Linux daemon for the Raspberry Pi PoE HAT with a small SSD1306 OLED
//! panel and an I2C fan relay.
//!
//! ## Features
//!
//! - **Fan Control**: Relay switched with on/off hysteresis on the SoC temperature
//! - **Status Display**: Network address, temperature and fan state, refreshed periodically
//! - **Custom Display**: Caller-supplied text lines instead of the status frame
//! - **Burn-in Protection**: Optional periodic display inversion
//! - **Events**: State changes published on an [`EventBus`](event::EventBus)
//!
//! ## Architecture
//!
//! - [`Controller`](controller::Controller) - Owns the hardware and the three periodic tasks
//! - [`TaskManager`](task_manager::TaskManager) - Named, cancellable background tasks
//! - [`FanController`](fan_controller::FanController) - Hysteresis and relay commands
//! - [`DisplayRenderer`](display::DisplayRenderer) - Line layout and inversion state
//! - [`drivers`] - Linux I2C and SSD1306 backends
//!
//! ## Example
//!
//! ```no_run
//! use poe_hatd::{application::Application, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     Application::builder()
//!         .with_config(config)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod application;
pub mod bus;
pub mod cli;
pub mod config;
pub mod controller;
pub mod display;
pub mod drivers;
pub mod error;
pub mod event;
pub mod fan_controller;
pub mod mode;
pub mod network;
pub mod sensors;
pub mod task_manager;
pub mod temperature_sensors;

#[cfg(test)]
mod mock;
