//! Display mode state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the display is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DisplayMode {
    /// Periodic status frame (address, temperature, fan).
    #[default]
    Default,
    /// Content supplied by the caller through `write_lines`.
    Custom,
}

impl DisplayMode {
    /// Parses a mode name. Anything other than `custom` means `Default`.
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "custom" => DisplayMode::Custom,
            "default" => DisplayMode::Default,
            other => {
                log::debug!("Unknown display mode '{other}', using default");
                DisplayMode::Default
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Default => "default",
            DisplayMode::Custom => "custom",
        }
    }
}

impl From<String> for DisplayMode {
    fn from(value: String) -> Self {
        Self::from_str_lossy(&value)
    }
}

impl From<DisplayMode> for String {
    fn from(mode: DisplayMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects the owner must carry out for a mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stop the default render cycle, then clear the display.
    EnterCustom,
    /// Clear the display, start the default render cycle and render one
    /// frame right away.
    EnterDefault,
}

#[derive(Debug, Clone)]
pub struct ModeStateMachine {
    mode: DisplayMode,
}

impl ModeStateMachine {
    pub fn new(initial: DisplayMode) -> Self {
        Self { mode: initial }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Moves to `target`. Returns `None` when already there.
    pub fn transition(&mut self, target: DisplayMode) -> Option<Transition> {
        if target == self.mode {
            return None;
        }
        self.mode = target;
        Some(match target {
            DisplayMode::Custom => Transition::EnterCustom,
            DisplayMode::Default => Transition::EnterDefault,
        })
    }
}
