use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TemperatureSensor: Send + Sync {
    /// Raw reading in thousandths of a degree Celsius.
    async fn read_raw(&self) -> Result<f32>;

    async fn read_celsius(&self) -> Result<f32> {
        Ok(celsius_from_raw(self.read_raw().await?))
    }

    async fn sensor_name(&self) -> Option<String> {
        None
    }
}

/// Converts a thermal-zone reading (millidegrees) to Celsius.
pub fn celsius_from_raw(raw: f32) -> f32 {
    raw / 1000.0
}
