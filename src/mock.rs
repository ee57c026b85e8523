//! Recording hardware doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::{
    bus::I2cBus,
    display::{DisplayTransport, Font},
    network::AddressSource,
    sensors::TemperatureSensor,
};

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOp {
    Clear,
    Cursor(u32, u32),
    Text(String),
    Invert(bool),
}

#[derive(Debug, Default)]
struct DisplayLog {
    ops: Vec<DisplayOp>,
    fail: bool,
}

/// Shared view into what a [`RecordingDisplay`] received.
#[derive(Debug, Clone, Default)]
pub struct DisplayProbe(Arc<Mutex<DisplayLog>>);

impl DisplayProbe {
    pub fn take(&self) -> Vec<DisplayOp> {
        std::mem::take(&mut self.0.lock().unwrap().ops)
    }

    pub fn ops(&self) -> Vec<DisplayOp> {
        self.0.lock().unwrap().ops.clone()
    }

    pub fn clear_count(&self) -> usize {
        self.ops().iter().filter(|op| **op == DisplayOp::Clear).count()
    }

    pub fn texts(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                DisplayOp::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn inversions(&self) -> Vec<bool> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                DisplayOp::Invert(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.0.lock().unwrap().fail = fail;
    }
}

#[derive(Debug)]
pub struct RecordingDisplay(DisplayProbe);

impl RecordingDisplay {
    pub fn new() -> (Self, DisplayProbe) {
        let probe = DisplayProbe::default();
        (Self(probe.clone()), probe)
    }

    fn record(&self, op: DisplayOp) -> Result<()> {
        let mut log = self.0.0.lock().unwrap();
        if log.fail {
            return Err(anyhow!("display write failed"));
        }
        log.ops.push(op);
        Ok(())
    }
}

impl DisplayTransport for RecordingDisplay {
    fn clear_display(&mut self) -> Result<()> {
        self.record(DisplayOp::Clear)
    }

    fn set_cursor(&mut self, x: u32, y: u32) -> Result<()> {
        self.record(DisplayOp::Cursor(x, y))
    }

    fn write_string(
        &mut self,
        _font: Font,
        _scale: u8,
        text: &str,
        _color: bool,
        _wrap: bool,
    ) -> Result<()> {
        self.record(DisplayOp::Text(text.to_string()))
    }

    fn invert_display(&mut self, inverted: bool) -> Result<()> {
        self.record(DisplayOp::Invert(inverted))
    }
}

#[derive(Debug, Default)]
struct BusLog {
    writes: Vec<(u8, u8)>,
    fail: bool,
}

/// Shared view into what a [`RecordingBus`] received.
#[derive(Debug, Clone, Default)]
pub struct BusProbe(Arc<Mutex<BusLog>>);

impl BusProbe {
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.0.lock().unwrap().writes.clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.0.lock().unwrap().fail = fail;
    }
}

#[derive(Debug)]
pub struct RecordingBus(BusProbe);

impl RecordingBus {
    pub fn new() -> (Self, BusProbe) {
        let probe = BusProbe::default();
        (Self(probe.clone()), probe)
    }
}

impl I2cBus for RecordingBus {
    fn send_byte(&mut self, address: u8, command: u8) -> Result<()> {
        let mut log = self.0.0.lock().unwrap();
        if log.fail {
            return Err(anyhow!("Remote I/O error"));
        }
        log.writes.push((address, command));
        Ok(())
    }
}

/// Sensor that replays queued raw readings, then repeats the last one.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    readings: Arc<Mutex<VecDeque<Result<f32, String>>>>,
    last: Arc<Mutex<Option<f32>>>,
}

impl ScriptedSensor {
    pub fn celsius(values: &[f32]) -> Self {
        let sensor = Self::default();
        for value in values {
            sensor.push(value * 1000.0);
        }
        sensor
    }

    pub fn push(&self, raw: f32) {
        self.readings.lock().unwrap().push_back(Ok(raw));
    }

    pub fn push_error(&self, message: &str) {
        self.readings
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }
}

#[async_trait]
impl TemperatureSensor for ScriptedSensor {
    async fn read_raw(&self) -> Result<f32> {
        let next = self.readings.lock().unwrap().pop_front();
        match next {
            Some(Ok(raw)) => {
                *self.last.lock().unwrap() = Some(raw);
                Ok(raw)
            }
            Some(Err(message)) => Err(anyhow!(message)),
            None => (*self.last.lock().unwrap()).ok_or_else(|| anyhow!("no reading scripted")),
        }
    }
}

/// Address source backed by a fixed interface table.
#[derive(Debug, Clone, Default)]
pub struct StaticAddresses(Vec<(String, String)>);

impl StaticAddresses {
    pub fn with(name: &str, address: &str) -> Self {
        Self(vec![(name.to_string(), address.to_string())])
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl AddressSource for StaticAddresses {
    fn addresses(&self, interface: &str) -> Result<Vec<String>> {
        Ok(self
            .0
            .iter()
            .filter(|(name, _)| name == interface)
            .map(|(_, address)| address.clone())
            .collect())
    }
}
