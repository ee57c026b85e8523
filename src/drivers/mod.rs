//! Linux hardware backends for the board.

pub mod i2c_bus;
pub mod oled;

use std::sync::Arc;

use anyhow::Result;

use crate::{
    config::Config, controller::Hardware, network::SystemAddresses,
    temperature_sensors::ThermalZoneSensor,
};

/// Opens the fan relay bus, the panel, the thermal zone and the address
/// lookup described by `config`.
///
/// The relay and the panel each get their own handle on the same bus.
pub fn open_hardware(config: &Config) -> Result<Hardware> {
    let bus = i2c_bus::open_i2c(&config.i2c_bus)?;
    let display = oled::open_display(config)?;

    Ok(Hardware {
        bus: Box::new(bus),
        display,
        sensor: Arc::new(ThermalZoneSensor::new(config.thermal_zone.clone())),
        addresses: Box::new(SystemAddresses),
    })
}
