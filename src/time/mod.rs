//! Node-local time
//!
//! Timers in the mesh are all relative to node start, like the tick counter
//! the firmware reads. `Timestamp` fits in a single `AtomicU64` so the edge
//! handler can publish it without locking.
//!
//! # Examples
//!
//! ```
//! use nodo_mesh::time::{Clock, ManualClock, Timestamp};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new(Timestamp::ZERO);
//! clock.advance(Duration::from_millis(500));
//! assert_eq!(clock.now(), Timestamp::from_millis(500));
//! ```

mod clock;

pub use self::clock::{Clock, ManualClock, MonotonicClock, Timestamp};
