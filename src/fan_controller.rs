//! Fan relay control with a two-threshold hysteresis band.

use anyhow::{Context, Result};
use log::info;

use crate::bus::I2cBus;

/// Relay command byte that switches the fan on.
pub const FAN_COMMAND_ON: u8 = 0xFE;
/// Relay command byte that switches the fan off.
pub const FAN_COMMAND_OFF: u8 = 0x01;

/// Power command for the fan relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCommand {
    On,
    Off,
}

impl FanCommand {
    /// Requested power state.
    pub fn is_on(self) -> bool {
        matches!(self, FanCommand::On)
    }

    /// Byte written to the relay for this command.
    pub fn byte(self) -> u8 {
        match self {
            FanCommand::On => FAN_COMMAND_ON,
            FanCommand::Off => FAN_COMMAND_OFF,
        }
    }
}

impl From<bool> for FanCommand {
    fn from(power: bool) -> Self {
        if power { FanCommand::On } else { FanCommand::Off }
    }
}

/// Owns the fan power state and decides when it must change.
///
/// The fan switches on at `temp_on` and back off at `temp_off`; in between
/// the current state is kept so the relay never chatters around a single
/// threshold. `temp_off < temp_on` is checked by `Config::validate`.
#[derive(Debug, Clone)]
pub struct FanController {
    address: u8,
    temp_on: f32,
    temp_off: f32,
    running: bool,
}

impl FanController {
    /// Creates a controller for the relay at `address`, initially stopped.
    pub fn new(address: u8, temp_on: f32, temp_off: f32) -> Self {
        Self {
            address,
            temp_on,
            temp_off,
            running: false,
        }
    }

    /// Last power state that was successfully written to the relay.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns the command needed for `temp_celsius`, or `None` when the
    /// current state already matches.
    pub fn evaluate(&self, temp_celsius: f32) -> Option<FanCommand> {
        if temp_celsius >= self.temp_on && !self.running {
            Some(FanCommand::On)
        } else if temp_celsius <= self.temp_off && self.running {
            Some(FanCommand::Off)
        } else {
            None
        }
    }

    /// Writes the power command and records it once the bus accepts it.
    ///
    /// On a bus error the previous state is kept.
    pub fn set_power(&mut self, bus: &mut dyn I2cBus, power: bool) -> Result<()> {
        let command = FanCommand::from(power);
        bus.send_byte(self.address, command.byte())
            .with_context(|| {
                format!(
                    "Failed to send fan command {:#04x} to device {:#04x}",
                    command.byte(),
                    self.address
                )
            })?;

        if self.running != power {
            info!("Fan: POWER {}", if power { "ON" } else { "OFF" });
        }
        self.running = power;
        Ok(())
    }

    /// Applies hysteresis for `temp_celsius` and writes a command only on a
    /// state change. Returns the command that was sent, if any.
    pub fn update(&mut self, bus: &mut dyn I2cBus, temp_celsius: f32) -> Result<Option<FanCommand>> {
        match self.evaluate(temp_celsius) {
            Some(command) => {
                self.set_power(bus, command.is_on())?;
                Ok(Some(command))
            }
            None => Ok(None),
        }
    }
}
