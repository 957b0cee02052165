//! Actuator outputs
//!
//! Digital outputs are driven through `embedded-hal` pins and only written
//! when their level changes.

pub mod mirror;
pub mod sweep;

pub use self::mirror::{InputMirror, SimulatedInput, DEFAULT_MIRROR_PERIOD};
pub use self::sweep::{wait_for_trigger, SweepConfig, SweepSequence};

use std::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use tracing::{info, warn};

/// A digital output bound to one pin
pub struct Actuator<P> {
    name: &'static str,
    pin: P,
    written: Option<bool>,
}

impl<P: OutputPin> Actuator<P> {
    /// Wraps `pin`; nothing is written until the first [`Actuator::set`]
    pub fn new(name: &'static str, pin: P) -> Self {
        Actuator {
            name,
            pin,
            written: None,
        }
    }

    /// Output name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Level last written successfully, `false` before any write
    pub fn level(&self) -> bool {
        self.written.unwrap_or(false)
    }

    /// Drives the output, writing the pin only if the level changes
    ///
    /// Returns whether the pin was written. A failed write is logged and
    /// retried on the next call.
    pub fn set(&mut self, high: bool) -> bool {
        if self.written == Some(high) {
            return false;
        }

        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };

        match result {
            Ok(()) => {
                info!("{} output {}", self.name, if high { "on" } else { "off" });
                self.written = Some(high);
                true
            }
            Err(e) => {
                warn!("Failed to drive {} output: {:?}", self.name, e);
                self.written = None;
                false
            }
        }
    }

    /// Releases the pin
    pub fn into_inner(self) -> P {
        self.pin
    }
}

/// Pin that only logs its level, for hosts without GPIO
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPin {
    pub label: &'static str,
}

impl ErrorType for LoggingPin {
    type Error = Infallible;
}

impl OutputPin for LoggingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        info!("[{}] low", self.label);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        info!("[{}] high", self.label);
        Ok(())
    }
}
