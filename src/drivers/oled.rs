//! SSD1306 panel driven through `ssd1306` and `embedded-graphics`.

use anyhow::{Result, anyhow};
use embedded_graphics::{
    mono_font::{
        MonoFont, MonoTextStyle,
        ascii::{FONT_5X7, FONT_5X8, FONT_6X10, FONT_6X12},
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use linux_embedded_hal::I2cdev;
use log::info;
use ssd1306::{
    I2CDisplayInterface, Ssd1306,
    mode::BufferedGraphicsMode,
    prelude::*,
    size::{DisplaySize128x32, DisplaySize128x64, DisplaySize96x16},
};

use crate::{
    config::Config,
    display::{DisplayTransport, Font},
    error::HatError,
};

use super::i2c_bus::open_i2c;

fn mono_font(font: Font) -> &'static MonoFont<'static> {
    match font {
        Font::Font5x7 => &FONT_5X7,
        Font::Font5x8 => &FONT_5X8,
        Font::Font6x10 => &FONT_6X10,
        Font::Font6x12 => &FONT_6X12,
    }
}

/// Splits `text` into rows of at most `columns` characters.
fn wrap_chunks(text: &str, columns: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(columns.max(1))
        .map(|row| row.iter().collect())
        .collect()
}

/// Buffered SSD1306 panel on its own I2C handle.
///
/// Every operation flushes the frame buffer, so the panel always shows
/// what the last call produced.
pub struct OledPanel<SIZE: DisplaySize> {
    display: Ssd1306<I2CInterface<I2cdev>, SIZE, BufferedGraphicsMode<SIZE>>,
    cursor: Point,
}

impl<SIZE: DisplaySize> OledPanel<SIZE> {
    pub fn new(i2c: I2cdev, address: u8, size: SIZE) -> Result<Self> {
        let interface = I2CDisplayInterface::new_custom_address(i2c, address);
        let mut display =
            Ssd1306::new(interface, size, DisplayRotation::Rotate0).into_buffered_graphics_mode();

        display
            .init()
            .map_err(|e| anyhow!("Failed to initialize display: {e:?}"))?;
        display.clear_buffer();
        display
            .flush()
            .map_err(|e| anyhow!("Failed to flush display: {e:?}"))?;

        Ok(Self {
            display,
            cursor: Point::zero(),
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.display
            .flush()
            .map_err(|e| anyhow!("Failed to flush display: {e:?}"))
    }
}

impl<SIZE> DisplayTransport for OledPanel<SIZE>
where
    SIZE: DisplaySize + Send + 'static,
    SIZE::Buffer: Send,
{
    fn clear_display(&mut self) -> Result<()> {
        self.display.clear_buffer();
        self.flush()
    }

    fn set_cursor(&mut self, x: u32, y: u32) -> Result<()> {
        self.cursor = Point::new(x as i32, y as i32);
        Ok(())
    }

    // mono fonts only render at their native size, so `_scale` is ignored
    fn write_string(
        &mut self,
        font: Font,
        _scale: u8,
        text: &str,
        color: bool,
        wrap: bool,
    ) -> Result<()> {
        let font = mono_font(font);
        let color = if color { BinaryColor::On } else { BinaryColor::Off };
        let style = MonoTextStyle::new(font, color);

        let advance = font.character_size.width + font.character_spacing;
        let free_width = (SIZE::WIDTH as u32).saturating_sub(self.cursor.x.max(0) as u32);
        let rows = if wrap {
            wrap_chunks(text, (free_width / advance) as usize)
        } else {
            vec![text.to_string()]
        };

        let mut position = self.cursor;
        for row in rows {
            Text::with_baseline(&row, position, style, Baseline::Top)
                .draw(&mut self.display)
                .map_err(|e| anyhow!("Failed to draw text: {e:?}"))?;
            position.y += font.character_size.height as i32;
        }
        self.cursor = position;

        self.flush()
    }

    fn invert_display(&mut self, inverted: bool) -> Result<()> {
        self.display
            .set_invert(inverted)
            .map_err(|e| anyhow!("Failed to set display inversion: {e:?}"))
    }
}

/// Opens the panel described by `config` on its I2C bus.
pub fn open_display(config: &Config) -> Result<Box<dyn DisplayTransport>> {
    let i2c = open_i2c(&config.i2c_bus)?;
    let address = config.oled_address;

    let display: Box<dyn DisplayTransport> = match (config.oled_width, config.oled_height) {
        (128, 32) => Box::new(OledPanel::new(i2c, address, DisplaySize128x32)?),
        (128, 64) => Box::new(OledPanel::new(i2c, address, DisplaySize128x64)?),
        (96, 16) => Box::new(OledPanel::new(i2c, address, DisplaySize96x16)?),
        (width, height) => {
            return Err(HatError::InvalidConfig(format!(
                "unsupported panel geometry {width}x{height}"
            ))
            .into());
        }
    };

    info!(
        "Display {}x{} initialized at {:#04x}",
        config.oled_width, config.oled_height, address
    );
    Ok(display)
}
