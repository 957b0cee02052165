use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::Actuator;

/// Default period between input reads
pub const DEFAULT_MIRROR_PERIOD: Duration = Duration::from_millis(1_000);

/// Copies digital inputs onto paired outputs, as valve nodes do
///
/// Each channel pairs one input with the output it drives. A failed read
/// leaves that channel's output where it was.
pub struct InputMirror<I, P> {
    channels: Vec<(I, Actuator<P>)>,
}

impl<I, P> InputMirror<I, P>
where
    I: InputPin,
    P: OutputPin,
{
    pub fn new() -> Self {
        InputMirror {
            channels: Vec::new(),
        }
    }

    /// Adds a channel driving `output` from `input`
    pub fn with_channel(mut self, input: I, output: Actuator<P>) -> Self {
        self.channels.push((input, output));
        self
    }

    /// Number of mirrored channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Reads every input once and drives its output to match
    ///
    /// Returns the output levels in channel order.
    pub fn poll(&mut self) -> Vec<bool> {
        let levels: Vec<bool> = self
            .channels
            .iter_mut()
            .map(|(input, output)| {
                match input.is_high() {
                    Ok(high) => {
                        output.set(high);
                    }
                    Err(e) => warn!("Failed to read input for {}: {:?}", output.name(), e),
                }
                output.level()
            })
            .collect();
        info!("State: {}", self.state_line(&levels));
        levels
    }

    fn state_line(&self, levels: &[bool]) -> String {
        self.channels
            .iter()
            .zip(levels)
            .map(|((_, output), high)| format!("{}={}", output.name(), u8::from(*high)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Polls every `period` until `shutdown` flips to true, then drives all outputs low
    pub async fn run(mut self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        for (_, output) in &mut self.channels {
            output.set(false);
        }
        debug!("Input mirror stopped");
    }
}

impl<I, P> Default for InputMirror<I, P>
where
    I: InputPin,
    P: OutputPin,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Input whose level is set from software, for hosts without GPIO
#[derive(Debug, Clone, Default)]
pub struct SimulatedInput {
    level: Arc<AtomicBool>,
}

impl SimulatedInput {
    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }
}

impl ErrorType for SimulatedInput {
    type Error = Infallible;
}

impl InputPin for SimulatedInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.load(Ordering::Relaxed))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.load(Ordering::Relaxed))
    }
}
