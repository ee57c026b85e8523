//! Error types for conditions callers need to tell apart.

/// Errors raised by the controller core.
///
/// Everything else travels as [`anyhow::Error`]; these variants can be
/// recovered with `downcast_ref::<HatError>()`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HatError {
    /// The fan hysteresis band is empty or inverted.
    #[error("fanTempOff ({off}°C) must be lower than fanTempOn ({on}°C)")]
    InvalidThresholds {
        /// Switch-on threshold in Celsius.
        on: f32,
        /// Switch-off threshold in Celsius.
        off: f32,
    },

    /// Any other rejected configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fewer lines were supplied than the display renders.
    #[error("Expected at least {expected} lines, got {actual}")]
    NotEnoughLines {
        /// Configured line count.
        expected: usize,
        /// Number of lines supplied.
        actual: usize,
    },

    /// The status interface does not exist or carries no address.
    #[error("Network interface '{0}' has no address")]
    NoAddress(String),

    /// The controller was stopped and no longer owns its hardware.
    #[error("Controller has been stopped")]
    Stopped,
}
