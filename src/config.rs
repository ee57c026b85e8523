//! Configuration for the poe_hatd daemon.
//!
//! Handles loading, parsing, and validation of the YAML file that describes
//! the display panel, the fan relay and the timers driving them.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{display::Font, error::HatError, mode::DisplayMode};

/// Panel geometries the SSD1306 driver supports, as (width, height).
pub const SUPPORTED_GEOMETRIES: [(u32, u32); 3] = [(128, 32), (128, 64), (96, 16)];

/// Main configuration structure for the daemon.
///
/// Every field has a default, so an empty file is a valid configuration.
/// Keys are camelCase.
///
/// # Example
///
/// ```yaml
/// version: 1
/// oledInvertedAuto: true
/// oledInvertedFreq: 10000
/// fanTempOn: 40
/// fanTempOff: 37
/// tempUnit: F
/// displayMode: default
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// I2C character device shared by the panel and the fan relay.
    pub i2c_bus: PathBuf,

    /// I2C address of the OLED panel.
    pub oled_address: u8,
    pub oled_width: u32,
    pub oled_height: u32,
    /// Default-mode refresh period in milliseconds.
    pub oled_update_freq: u64,
    pub font: Font,
    /// Number of text lines rendered per frame.
    pub char_lines: usize,
    /// Vertical distance between rendered lines, in pixels.
    pub line_height: u32,
    /// Inversion state applied at startup.
    pub oled_inverted: bool,
    /// Whether the periodic burn-in inversion starts armed.
    pub oled_inverted_auto: bool,
    /// Auto-inversion period in milliseconds.
    pub oled_inverted_freq: u64,

    /// I2C address of the fan relay.
    pub fan_address: u8,
    /// Fan switches on at or above this temperature (°C).
    pub fan_temp_on: f32,
    /// Fan switches off at or below this temperature (°C).
    pub fan_temp_off: f32,
    /// Unit used on the status line.
    pub temp_unit: TempUnit,
    /// Temperature sampling period in milliseconds.
    pub temp_update_freq: u64,
    /// Sysfs file holding the SoC temperature in millidegrees.
    pub thermal_zone: PathBuf,

    /// Interface whose first address is shown on the status line.
    pub network_interface_name: String,
    /// Initial display mode; unknown names mean `default`.
    pub display_mode: DisplayMode,
}

/// Temperature unit for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TempUnit {
    #[default]
    C,
    F,
}

impl TempUnit {
    /// Converts a Celsius reading into this unit, rounded to one decimal.
    pub fn convert(self, celsius: f32) -> f32 {
        let value = match self {
            TempUnit::C => celsius,
            TempUnit::F => 32.0 + 1.8 * celsius,
        };
        (value * 10.0).round() / 10.0
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TempUnit::C => "C",
            TempUnit::F => "F",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: defaults::version(),
            i2c_bus: defaults::i2c_bus(),
            oled_address: defaults::oled_address(),
            oled_width: defaults::oled_width(),
            oled_height: defaults::oled_height(),
            oled_update_freq: defaults::oled_update_freq(),
            font: Font::default(),
            char_lines: defaults::char_lines(),
            line_height: defaults::line_height(),
            oled_inverted: false,
            oled_inverted_auto: false,
            oled_inverted_freq: defaults::oled_inverted_freq(),
            fan_address: defaults::fan_address(),
            fan_temp_on: defaults::fan_temp_on(),
            fan_temp_off: defaults::fan_temp_off(),
            temp_unit: TempUnit::default(),
            temp_update_freq: defaults::temp_update_freq(),
            thermal_zone: defaults::thermal_zone(),
            network_interface_name: defaults::network_interface_name(),
            display_mode: DisplayMode::default(),
        }
    }
}

impl Config {
    /// Validates the configuration for consistency.
    ///
    /// Rejects an empty or inverted hysteresis band, zero periods, panel
    /// sizes the driver cannot drive, and line layouts that are empty or
    /// run past the bottom of the panel.
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HatError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            ))
            .into());
        }

        if self.fan_temp_off.partial_cmp(&self.fan_temp_on) != Some(Ordering::Less) {
            return Err(HatError::InvalidThresholds {
                on: self.fan_temp_on,
                off: self.fan_temp_off,
            }
            .into());
        }

        for (name, value) in [
            ("oledUpdateFreq", self.oled_update_freq),
            ("oledInvertedFreq", self.oled_inverted_freq),
            ("tempUpdateFreq", self.temp_update_freq),
        ] {
            if value == 0 {
                return Err(HatError::InvalidConfig(format!("{name} must be greater than 0")).into());
            }
        }

        if self.char_lines == 0 {
            return Err(HatError::InvalidConfig("charLines must be at least 1".into()).into());
        }
        if self.line_height == 0 {
            return Err(HatError::InvalidConfig("lineHeight must be at least 1".into()).into());
        }

        if !SUPPORTED_GEOMETRIES.contains(&(self.oled_width, self.oled_height)) {
            return Err(HatError::InvalidConfig(format!(
                "unsupported panel geometry {}x{}",
                self.oled_width, self.oled_height
            ))
            .into());
        }

        match self.last_row_y() {
            Some(y) if y < self.oled_height => {}
            Some(y) => {
                return Err(HatError::InvalidConfig(format!(
                    "line {} starts at y={y}, outside the {}px panel",
                    self.char_lines, self.oled_height
                ))
                .into());
            }
            None => {
                return Err(HatError::InvalidConfig(format!(
                    "{} lines of {}px do not fit the {}px panel",
                    self.char_lines, self.line_height, self.oled_height
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Top of the last rendered line, or `None` when it does not fit a `u32`.
    fn last_row_y(&self) -> Option<u32> {
        let last_index = u32::try_from(self.char_lines.checked_sub(1)?).ok()?;
        self.line_height
            .checked_mul(last_index)?
            .checked_add(crate::display::LINE_ORIGIN_Y)
    }

    pub fn oled_update_period(&self) -> Duration {
        Duration::from_millis(self.oled_update_freq)
    }

    pub fn oled_inverted_period(&self) -> Duration {
        Duration::from_millis(self.oled_inverted_freq)
    }

    pub fn temp_update_period(&self) -> Duration {
        Duration::from_millis(self.temp_update_freq)
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. POE_HATD_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/poe_hatd/config.yml or ~/.config/poe_hatd/config.yml
    /// 4. /etc/poe_hatd/config.yml
    ///
    /// Falls back to the built-in defaults when no file is found.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => match locate_config() {
                Some(p) => p,
                None => {
                    warn!("No configuration file found, using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        info!("Loading config from: {}", config_path.display());
        Self::load_from_path(&config_path)
    }

    /// Loads and validates configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration in: {}", path.display()))?;

        Ok(config)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        // an empty document deserializes as null, not as an empty map
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML")?
        };

        config.validate()?;
        Ok(config)
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::temperature_sensors::thermal_zone::DEFAULT_THERMAL_ZONE;

    pub fn version() -> u8 {
        1
    }

    pub fn i2c_bus() -> PathBuf {
        PathBuf::from("/dev/i2c-1")
    }

    pub fn oled_address() -> u8 {
        0x3C
    }

    pub fn oled_width() -> u32 {
        128
    }

    pub fn oled_height() -> u32 {
        32
    }

    pub fn oled_update_freq() -> u64 {
        1000
    }

    pub fn char_lines() -> usize {
        3
    }

    pub fn line_height() -> u32 {
        11
    }

    pub fn oled_inverted_freq() -> u64 {
        30_000
    }

    pub fn fan_address() -> u8 {
        0x20
    }

    pub fn fan_temp_on() -> f32 {
        70.0
    }

    pub fn fan_temp_off() -> f32 {
        50.0
    }

    pub fn temp_update_freq() -> u64 {
        500
    }

    pub fn thermal_zone() -> PathBuf {
        PathBuf::from(DEFAULT_THERMAL_ZONE)
    }

    pub fn network_interface_name() -> String {
        "eth0".to_string()
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Ok(env_path) = env::var("POE_HATD_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("poe_hatd/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    let etc = Path::new("/etc/poe_hatd/config.yml");
    if etc.exists() {
        return Some(etc.to_path_buf());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Helper function to create temporary config file
    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn defaults_match_the_board() {
        let config = Config::default();

        assert_eq!(config.oled_address, 0x3C);
        assert_eq!((config.oled_width, config.oled_height), (128, 32));
        assert_eq!(config.oled_update_freq, 1000);
        assert_eq!(config.font, Font::Font5x7);
        assert_eq!(config.char_lines, 3);
        assert_eq!(config.line_height, 11);
        assert!(!config.oled_inverted);
        assert!(!config.oled_inverted_auto);
        assert_eq!(config.oled_inverted_freq, 30_000);
        assert_eq!(config.fan_address, 0x20);
        assert_eq!(config.fan_temp_on, 70.0);
        assert_eq!(config.fan_temp_off, 50.0);
        assert_eq!(config.temp_unit, TempUnit::C);
        assert_eq!(config.temp_update_freq, 500);
        assert_eq!(config.network_interface_name, "eth0");
        assert_eq!(config.display_mode, DisplayMode::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_load_valid_yaml() {
        let yaml_content = r#"
version: 1
i2cBus: /dev/i2c-3
oledAddress: 0x3D
oledHeight: 64
oledUpdateFreq: 2000
font: "6x10"
charLines: 4
lineHeight: 14
oledInvertedAuto: true
oledInvertedFreq: 10000
fanTempOn: 40
fanTempOff: 37
tempUnit: F
networkInterfaceName: wlan0
displayMode: custom
"#;

        let temp_file = create_temp_config(yaml_content);
        let config = Config::load(Some(temp_file.path().to_path_buf())).unwrap();

        assert_eq!(config.i2c_bus, PathBuf::from("/dev/i2c-3"));
        assert_eq!(config.oled_address, 0x3D);
        assert_eq!(config.oled_height, 64);
        assert_eq!(config.oled_update_period(), Duration::from_secs(2));
        assert_eq!(config.font, Font::Font6x10);
        assert_eq!(config.char_lines, 4);
        assert_eq!(config.line_height, 14);
        assert!(config.oled_inverted_auto);
        assert_eq!(config.oled_inverted_period(), Duration::from_secs(10));
        assert_eq!(config.fan_temp_on, 40.0);
        assert_eq!(config.fan_temp_off, 37.0);
        assert_eq!(config.temp_unit, TempUnit::F);
        assert_eq!(config.network_interface_name, "wlan0");
        assert_eq!(config.display_mode, DisplayMode::Custom);
        // untouched keys keep their defaults
        assert_eq!(config.fan_address, 0x20);
        assert_eq!(config.temp_update_period(), Duration::from_millis(500));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let temp_file = create_temp_config("");
        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_display_mode_is_coerced() {
        let config = Config::from_yaml("displayMode: marquee").unwrap();
        assert_eq!(config.display_mode, DisplayMode::Default);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = Config::from_yaml("fanTempOn: 50\nfanTempOff: 60").unwrap_err();
        assert_eq!(
            err.downcast_ref::<HatError>(),
            Some(&HatError::InvalidThresholds { on: 50.0, off: 60.0 })
        );
    }

    #[test]
    fn equal_thresholds_are_rejected() {
        let config = Config {
            fan_temp_on: 55.0,
            fan_temp_off: 55.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_periods_are_rejected() {
        let config = Config {
            oled_update_freq: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("oledUpdateFreq"));
    }

    #[test]
    fn empty_layout_is_rejected() {
        let config = Config {
            char_lines: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn layout_past_the_panel_is_rejected() {
        let config = Config {
            char_lines: 4,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<HatError>(),
            Some(&HatError::InvalidConfig(
                "line 4 starts at y=34, outside the 32px panel".into()
            ))
        );

        let config = Config {
            oled_height: 64,
            char_lines: 4,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_line_height_is_rejected_without_overflow() {
        let err = Config::from_yaml("lineHeight: 3000000000").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HatError>(),
            Some(HatError::InvalidConfig(_))
        ));
    }

    #[test]
    fn huge_line_count_is_rejected() {
        let err = Config::from_yaml("charLines: 4294967297").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HatError>(),
            Some(HatError::InvalidConfig(_))
        ));

        let config = Config {
            char_lines: usize::MAX,
            line_height: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unsupported_geometry_is_rejected() {
        let config = Config {
            oled_width: 200,
            oled_height: 40,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("200x40"));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = Config::from_yaml("version: 2").unwrap_err();
        assert!(err.to_string().contains("version 2"));
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let temp_file = create_temp_config("fanTempOn: [hot");
        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(
            format!("{err:#}").contains(&temp_file.path().display().to_string())
        );
    }

    #[test]
    fn fahrenheit_conversion_rounds_to_one_decimal() {
        assert_eq!(TempUnit::F.convert(21.0), 69.8);
        assert_eq!(TempUnit::C.convert(45.678), 45.7);
        assert_eq!(TempUnit::F.convert(0.0), 32.0);
    }
}
