use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::core::{Error, Result};
use crate::sensor::EdgeLatch;
use crate::time::Timestamp;

use super::Actuator;

/// Laser and servo deterrent timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Servo duty at the start of the sweep
    pub min_duty: u16,
    /// Servo duty at the far end of the sweep
    pub max_duty: u16,
    /// Delay between duty steps
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub step_delay: Duration,
    /// Pause at each end of the sweep
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub hold: Duration,
    /// How often the trigger latch is polled
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub poll_interval: Duration,
    /// Longest single wait for a trigger before re-checking shutdown
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub max_wait: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            min_duty: 300,
            max_duty: 700,
            step_delay: Duration::from_millis(10),
            hold: Duration::from_millis(500),
            poll_interval: Duration::from_millis(20),
            max_wait: Duration::from_secs(1),
        }
    }
}

/// Waits until `latch` fires, polling every `poll`, for at most `max_wait`
///
/// Returns the trigger timestamp, or `None` if nothing fired in time.
pub async fn wait_for_trigger(
    latch: &EdgeLatch,
    poll: Duration,
    max_wait: Duration,
) -> Option<Timestamp> {
    let deadline = Instant::now() + max_wait;
    loop {
        if let Some(triggered_at) = latch.take() {
            return Some(triggered_at);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(poll.min(deadline - now)).await;
    }
}

/// Resolves once `shutdown` reads true or its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Laser switched on while a servo sweeps out and back
pub struct SweepSequence<L, S> {
    laser: Actuator<L>,
    servo: S,
    config: SweepConfig,
}

impl<L, S> SweepSequence<L, S>
where
    L: OutputPin,
    S: SetDutyCycle,
{
    /// Creates a sequence, checking the duty range against the servo channel
    pub fn new(laser: Actuator<L>, servo: S, config: SweepConfig) -> Result<Self> {
        if config.min_duty > config.max_duty {
            return Err(Error::config(format!(
                "Sweep min duty {} above max duty {}",
                config.min_duty, config.max_duty
            )));
        }
        if config.max_duty > servo.max_duty_cycle() {
            return Err(Error::config(format!(
                "Sweep max duty {} exceeds servo maximum {}",
                config.max_duty,
                servo.max_duty_cycle()
            )));
        }
        if config.poll_interval.is_zero() {
            return Err(Error::config("Sweep poll interval must be non-zero"));
        }
        Ok(SweepSequence { laser, servo, config })
    }

    /// Runs one full sweep; the laser is off again when this returns
    pub async fn run_once(&mut self) -> Result<()> {
        self.laser.set(true);
        let result = self.sweep().await;
        self.laser.set(false);
        result
    }

    async fn sweep(&mut self) -> Result<()> {
        let SweepConfig {
            min_duty,
            max_duty,
            step_delay,
            hold,
            ..
        } = self.config;

        for duty in min_duty..=max_duty {
            self.set_duty(duty)?;
            sleep(step_delay).await;
        }
        sleep(hold).await;

        for duty in (min_duty..=max_duty).rev() {
            self.set_duty(duty)?;
            sleep(step_delay).await;
        }
        sleep(hold).await;
        Ok(())
    }

    fn set_duty(&mut self, duty: u16) -> Result<()> {
        self.servo
            .set_duty_cycle(duty)
            .map_err(|e| Error::actuator(format!("Servo duty {} rejected: {:?}", duty, e)))
    }

    /// Runs a sweep each time `trigger` fires until `shutdown` flips to true
    ///
    /// A shutdown during a sweep cuts it short and turns the laser off.
    pub async fn run(mut self, trigger: Arc<EdgeLatch>, mut shutdown: watch::Receiver<bool>) {
        let (poll, max_wait) = (self.config.poll_interval, self.config.max_wait);
        loop {
            let triggered = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                triggered = wait_for_trigger(&trigger, poll, max_wait) => triggered,
            };
            let Some(at) = triggered else {
                continue;
            };

            info!("Sweep triggered at {} ms", at.as_millis());
            tokio::select! {
                result = self.run_once() => {
                    if let Err(e) = result {
                        warn!("Sweep aborted: {}", e);
                    }
                }
                _ = shutdown_requested(&mut shutdown) => {
                    self.laser.set(false);
                    info!("Sweep interrupted by shutdown");
                    break;
                }
            }
        }
        debug!("Sweep task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::testing::{RecordingPin, RecordingPwm};

    fn quick_config() -> SweepConfig {
        SweepConfig {
            min_duty: 300,
            max_duty: 304,
            step_delay: Duration::from_millis(10),
            hold: Duration::from_millis(500),
            poll_interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_out_and_back() {
        let laser = RecordingPin::default();
        let servo = RecordingPwm::new(8191);
        let laser_actuator = Actuator::new("laser", laser.clone());
        let mut sequence =
            SweepSequence::new(laser_actuator, servo.clone(), quick_config()).unwrap();

        let started = Instant::now();
        sequence.run_once().await.unwrap();

        assert_eq!(
            servo.duties(),
            vec![300, 301, 302, 303, 304, 304, 303, 302, 301, 300]
        );
        assert_eq!(laser.writes(), vec![true, false]);
        assert!(started.elapsed() >= Duration::from_millis(10 * 10 + 2 * 500));
    }

    #[test]
    fn test_rejects_duty_beyond_servo_range() {
        let result = SweepSequence::new(
            Actuator::new("laser", RecordingPin::default()),
            RecordingPwm::new(500),
            SweepConfig::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_trigger_is_bounded() {
        let latch = EdgeLatch::new();
        let started = Instant::now();
        let (poll, max_wait) = (Duration::from_millis(20), Duration::from_millis(100));
        let waited = wait_for_trigger(&latch, poll, max_wait).await;
        assert_eq!(waited, None);
        assert!(started.elapsed() >= Duration::from_millis(100));

        latch.trigger(Timestamp::from_millis(42));
        let waited = wait_for_trigger(&latch, poll, max_wait).await;
        assert_eq!(waited, Some(Timestamp::from_millis(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_on_trigger_and_stops_on_shutdown() {
        let laser = RecordingPin::default();
        let servo = RecordingPwm::new(8191);
        let laser_actuator = Actuator::new("laser", laser.clone());
        let sequence = SweepSequence::new(laser_actuator, servo.clone(), quick_config()).unwrap();

        let trigger = Arc::new(EdgeLatch::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(sequence.run(Arc::clone(&trigger), shutdown_rx));

        trigger.trigger(Timestamp::ZERO);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(laser.writes(), vec![true, false]);
        assert_eq!(servo.duties().len(), 10);

        shutdown_tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cuts_sweep_short() {
        let laser = RecordingPin::default();
        let servo = RecordingPwm::new(8191);
        let config = SweepConfig::default();
        let full_sweep = 2 * usize::from(config.max_duty - config.min_duty + 1);
        let laser_actuator = Actuator::new("laser", laser.clone());
        let sequence = SweepSequence::new(laser_actuator, servo.clone(), config).unwrap();

        let trigger = Arc::new(EdgeLatch::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        trigger.trigger(Timestamp::ZERO);
        let task = tokio::spawn(sequence.run(Arc::clone(&trigger), shutdown_rx));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(laser.writes(), vec![true]);

        let stopping = Instant::now();
        shutdown_tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await);

        assert!(stopping.elapsed() < Duration::from_millis(50));
        assert_eq!(laser.writes(), vec![true, false]);
        assert!(servo.duties().len() < full_sweep);
    }
}
