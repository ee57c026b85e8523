use std::path::Path;

use anyhow::{Context, Result, anyhow};
use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;

use crate::bus::I2cBus;

/// Opens the I2C character device at `path`.
pub fn open_i2c(path: &Path) -> Result<I2cdev> {
    I2cdev::new(path).with_context(|| format!("Failed to open I2C bus {}", path.display()))
}

impl I2cBus for I2cdev {
    fn send_byte(&mut self, address: u8, command: u8) -> Result<()> {
        I2c::write(self, address, &[command]).map_err(|e| anyhow!("{e:?}"))
    }
}
