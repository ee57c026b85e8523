use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::sensors::TemperatureSensor;

/// Default SoC thermal zone on a Raspberry Pi.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Reads a sysfs thermal zone, which reports millidegrees Celsius.
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ThermalZoneSensor {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_ZONE)
    }
}

#[async_trait]
impl TemperatureSensor for ThermalZoneSensor {
    async fn read_raw(&self) -> Result<f32> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        content
            .trim()
            .parse::<f32>()
            .with_context(|| format!("Malformed reading {:?} in {}", content.trim(), self.path.display()))
    }

    async fn sensor_name(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }
}
