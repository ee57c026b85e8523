//! Character-line rendering on top of the display transport.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::HatError;

/// Horizontal origin of every rendered line, in pixels.
pub const LINE_ORIGIN_X: u32 = 1;
/// Vertical origin of the first rendered line, in pixels.
pub const LINE_ORIGIN_Y: u32 = 1;
/// Text scale passed to the transport.
pub const TEXT_SCALE: u8 = 1;
/// Pixel color passed to the transport; `true` lights the pixel.
pub const TEXT_COLOR: bool = true;

/// Built-in monospace fonts the panel driver can rasterize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Font {
    #[default]
    #[serde(rename = "5x7")]
    Font5x7,
    #[serde(rename = "5x8")]
    Font5x8,
    #[serde(rename = "6x10")]
    Font6x10,
    #[serde(rename = "6x12")]
    Font6x12,
}

/// Low-level operations of the character display.
///
/// Implemented by the SSD1306 driver in production and by recording
/// doubles in tests.
pub trait DisplayTransport: Send + 'static {
    fn clear_display(&mut self) -> Result<()>;
    fn set_cursor(&mut self, x: u32, y: u32) -> Result<()>;
    fn write_string(
        &mut self,
        font: Font,
        scale: u8,
        text: &str,
        color: bool,
        wrap: bool,
    ) -> Result<()>;
    fn invert_display(&mut self, inverted: bool) -> Result<()>;
}

/// Renders fixed-size line sets and tracks the inversion state.
#[derive(Debug, Clone)]
pub struct DisplayRenderer {
    font: Font,
    char_lines: usize,
    line_height: u32,
    inverted: bool,
}

impl DisplayRenderer {
    pub fn new(font: Font, char_lines: usize, line_height: u32, inverted: bool) -> Self {
        Self {
            font,
            char_lines,
            line_height,
            inverted,
        }
    }

    /// Number of lines drawn per frame.
    pub fn char_lines(&self) -> usize {
        self.char_lines
    }

    /// Current inversion flag, as last written to the panel.
    pub fn inverted(&self) -> bool {
        self.inverted
    }

    /// Vertical pixel position of line `index`, saturating at `u32::MAX`.
    pub fn line_y(&self, index: usize) -> u32 {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.line_height
            .saturating_mul(index)
            .saturating_add(LINE_ORIGIN_Y)
    }

    /// Draws the first `char_lines` entries of `lines`, one per row.
    ///
    /// Short inputs are rejected before the panel is touched.
    pub fn write_lines<S: AsRef<str>>(
        &self,
        display: &mut dyn DisplayTransport,
        lines: &[S],
        clear_first: bool,
    ) -> Result<()> {
        if lines.len() < self.char_lines {
            return Err(HatError::NotEnoughLines {
                expected: self.char_lines,
                actual: lines.len(),
            }
            .into());
        }

        if clear_first {
            display.clear_display().context("Failed to clear display")?;
        }

        for (index, line) in lines.iter().take(self.char_lines).enumerate() {
            display.set_cursor(LINE_ORIGIN_X, self.line_y(index))?;
            display
                .write_string(self.font, TEXT_SCALE, line.as_ref(), TEXT_COLOR, true)
                .with_context(|| format!("Failed to write display line {}", index + 1))?;
        }
        Ok(())
    }

    /// Toggles inversion when `value` is `None`, otherwise sets it.
    ///
    /// The resulting state is always written to the panel and only
    /// recorded once that write succeeds. Returns the new state.
    pub fn invert(&mut self, display: &mut dyn DisplayTransport, value: Option<bool>) -> Result<bool> {
        let next = value.unwrap_or(!self.inverted);
        display
            .invert_display(next)
            .context("Failed to apply display inversion")?;
        self.inverted = next;
        Ok(next)
    }
}
