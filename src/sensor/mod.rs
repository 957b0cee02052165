//! Local sensing
//!
//! Presence comes from edge-triggered sources (PIR, radar) debounced by
//! [`DebouncedSignal`]; temperature comes from a polled [`TemperatureSource`].

pub mod debounce;

pub use self::debounce::{
    DebouncedSignal, DebouncedState, EdgeLatch, PresenceAggregate, SignalState, Transition,
};

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::core::{Result, SensorSnapshot};
use crate::time::Timestamp;

/// Channel name of the first presence input
pub const PIR_CHANNEL: &str = "pir";

/// Channel name of the second presence input
pub const RADAR_CHANNEL: &str = "radar";

/// Channel name of presence mirrored from remote reports
pub const REMOTE_CHANNEL: &str = "remote";

/// Polled temperature input
pub trait TemperatureSource: Send {
    /// Reads the current temperature in degrees Celsius
    fn read_celsius(&mut self) -> Result<f32>;
}

impl<F> TemperatureSource for F
where
    F: FnMut() -> Result<f32> + Send,
{
    fn read_celsius(&mut self) -> Result<f32> {
        self()
    }
}

/// Source for nodes without a temperature sensor
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTemperature;

impl TemperatureSource for NoTemperature {
    fn read_celsius(&mut self) -> Result<f32> {
        Ok(0.0)
    }
}

/// Latches the edge handlers write into
#[derive(Debug, Clone)]
pub struct PresenceLatches {
    pub pir: Arc<EdgeLatch>,
    pub radar: Arc<EdgeLatch>,
    pub remote: Arc<EdgeLatch>,
}

/// Local sensor state sampled once per dispatch cycle
pub struct SensorHub<T> {
    temperature: T,
    last_temperature: f32,
    presence: PresenceAggregate,
    latches: PresenceLatches,
}

impl<T: TemperatureSource> SensorHub<T> {
    /// Creates a hub with PIR, radar and remote presence channels
    pub fn new(temperature: T, detection_timeout: Duration) -> Self {
        let latches = PresenceLatches {
            pir: Arc::new(EdgeLatch::new()),
            radar: Arc::new(EdgeLatch::new()),
            remote: Arc::new(EdgeLatch::new()),
        };
        let presence = PresenceAggregate::new(vec![
            DebouncedSignal::new(PIR_CHANNEL, Arc::clone(&latches.pir), detection_timeout),
            DebouncedSignal::new(RADAR_CHANNEL, Arc::clone(&latches.radar), detection_timeout),
            DebouncedSignal::new(REMOTE_CHANNEL, Arc::clone(&latches.remote), detection_timeout),
        ]);

        SensorHub {
            temperature,
            last_temperature: 0.0,
            presence,
            latches,
        }
    }

    /// Latches for the edge handlers
    pub fn latches(&self) -> PresenceLatches {
        self.latches.clone()
    }

    /// Debounced presence channels
    pub fn presence(&self) -> &PresenceAggregate {
        &self.presence
    }

    /// Evaluates debounce state and reads temperature
    ///
    /// A failed temperature read reports the previous value again.
    pub fn sample(&mut self, now: Timestamp) -> (SensorSnapshot, Option<Transition>) {
        let transition = self.presence.evaluate(now);

        match self.temperature.read_celsius() {
            Ok(celsius) => self.last_temperature = celsius,
            Err(e) => warn!("Temperature read failed, keeping {:.2}: {}", self.last_temperature, e),
        }

        let snapshot = SensorSnapshot {
            temperature: self.last_temperature,
            presence_a: self.channel_active(PIR_CHANNEL),
            presence_b: self.channel_active(RADAR_CHANNEL),
        };
        (snapshot, transition)
    }

    fn channel_active(&self, name: &str) -> bool {
        self.presence
            .channel(name)
            .map(DebouncedSignal::is_active)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    #[test]
    fn test_sample_reports_debounced_presence() {
        let mut hub = SensorHub::new(|| -> Result<f32> { Ok(24.5) }, Duration::from_millis(500));
        let latches = hub.latches();

        latches.radar.trigger(Timestamp::from_millis(10));
        let (snapshot, transition) = hub.sample(Timestamp::from_millis(20));
        assert_eq!(snapshot, SensorSnapshot::new(24.5, false, true));
        assert_eq!(transition, Some(Transition::Activated));

        let (snapshot, transition) = hub.sample(Timestamp::from_millis(510));
        assert_eq!(snapshot, SensorSnapshot::new(24.5, false, false));
        assert_eq!(transition, Some(Transition::Deactivated));
    }

    #[test]
    fn test_remote_channel_latches_output_only() {
        let mut hub = SensorHub::new(NoTemperature, Duration::from_millis(500));
        hub.latches().remote.trigger(Timestamp::ZERO);

        let (snapshot, transition) = hub.sample(Timestamp::ZERO);
        assert!(!snapshot.any_presence());
        assert_eq!(transition, Some(Transition::Activated));
        assert!(hub.presence().is_active());
    }

    #[test]
    fn test_failed_read_keeps_previous_temperature() {
        let mut readings: Vec<Result<f32>> = vec![Err(Error::sensor_read("adc timeout")), Ok(21.0)];
        let mut hub = SensorHub::new(
            move || readings.pop().unwrap_or(Err(Error::sensor_read("no sample"))),
            Duration::from_millis(500),
        );

        let (first, _) = hub.sample(Timestamp::ZERO);
        assert_eq!(first.temperature, 21.0);

        let (second, _) = hub.sample(Timestamp::from_millis(500));
        assert_eq!(second.temperature, 21.0);
    }
}
