//! I2C transport seam used by the fan relay.

use anyhow::Result;

/// Single-byte command writes on the board's I2C bus.
#[cfg_attr(test, mockall::automock)]
pub trait I2cBus: Send + 'static {
    /// Writes `command` to the device at `address`.
    fn send_byte(&mut self, address: u8, command: u8) -> Result<()>;
}
