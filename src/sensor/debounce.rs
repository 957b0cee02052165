use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::time::Timestamp;

/// Interrupt-side mailbox for one edge source
///
/// The edge handler stores a timestamp and raises a flag; nothing else.
/// The periodic evaluator consumes the pair at most once per edge burst.
/// The two fields are not updated atomically together: the evaluator may
/// see a timestamp slightly newer than the flag it consumed, which only
/// extends activity by the difference.
#[derive(Debug, Default)]
pub struct EdgeLatch {
    pending: AtomicBool,
    last_trigger: AtomicU64,
}

impl EdgeLatch {
    /// Creates an untriggered latch, usable in a `static`
    pub const fn new() -> Self {
        EdgeLatch {
            pending: AtomicBool::new(false),
            last_trigger: AtomicU64::new(0),
        }
    }

    /// Records an edge. Safe to call from the edge handler.
    #[inline]
    pub fn trigger(&self, now: Timestamp) {
        self.last_trigger.store(now.as_millis(), Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    /// Returns whether an edge is waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Consumes the pending edge, returning its timestamp
    pub fn take(&self) -> Option<Timestamp> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(Timestamp::from_millis(self.last_trigger.load(Ordering::Relaxed)))
        } else {
            None
        }
    }
}

/// Debounced output level of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Idle,
    Active,
}

/// Level change reported by an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activated,
    Deactivated,
}

impl Transition {
    fn between(before: bool, after: bool) -> Option<Transition> {
        match (before, after) {
            (false, true) => Some(Transition::Activated),
            (true, false) => Some(Transition::Deactivated),
            _ => None,
        }
    }
}

/// Per-channel debounce bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebouncedState {
    /// An edge was seen and has not yet timed out
    pub raw_flag: bool,
    /// Debounced presence
    pub stable_flag: bool,
    /// Time of the most recent edge
    pub last_trigger_time: Timestamp,
}

/// Timeout-based debounce for one edge source
#[derive(Debug)]
pub struct DebouncedSignal {
    name: &'static str,
    latch: Arc<EdgeLatch>,
    timeout: Duration,
    state: DebouncedState,
}

impl DebouncedSignal {
    /// Creates a signal fed by `latch` that stays active for `timeout` after each edge
    pub fn new(name: &'static str, latch: Arc<EdgeLatch>, timeout: Duration) -> Self {
        DebouncedSignal {
            name,
            latch,
            timeout,
            state: DebouncedState::default(),
        }
    }

    /// Channel name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Latch to hand to the edge handler
    pub fn latch(&self) -> Arc<EdgeLatch> {
        Arc::clone(&self.latch)
    }

    /// Current bookkeeping
    pub fn state(&self) -> DebouncedState {
        self.state
    }

    /// Current debounced level
    pub fn level(&self) -> SignalState {
        if self.state.stable_flag {
            SignalState::Active
        } else {
            SignalState::Idle
        }
    }

    /// Returns whether the channel is active
    pub fn is_active(&self) -> bool {
        self.state.stable_flag
    }

    /// Periodic evaluation: consumes a pending edge, then applies the timeout
    pub fn evaluate(&mut self, now: Timestamp) -> Option<Transition> {
        let before = self.state.stable_flag;

        if let Some(triggered_at) = self.latch.take() {
            self.state.raw_flag = true;
            self.state.stable_flag = true;
            self.state.last_trigger_time = self.state.last_trigger_time.max(triggered_at);
        }

        if self.state.stable_flag
            && now.saturating_elapsed_since(self.state.last_trigger_time) >= self.timeout
        {
            self.state.raw_flag = false;
            self.state.stable_flag = false;
        }

        Transition::between(before, self.state.stable_flag)
    }
}

/// OR of several debounced channels driving one output
///
/// Active as soon as any channel is active, idle only once every channel
/// is idle.
#[derive(Debug, Default)]
pub struct PresenceAggregate {
    channels: Vec<DebouncedSignal>,
    active: bool,
}

impl PresenceAggregate {
    /// Creates an aggregate over `channels`
    pub fn new(channels: Vec<DebouncedSignal>) -> Self {
        PresenceAggregate {
            channels,
            active: false,
        }
    }

    /// Adds a channel
    pub fn push(&mut self, channel: DebouncedSignal) {
        self.channels.push(channel);
    }

    /// Channels in insertion order
    pub fn channels(&self) -> &[DebouncedSignal] {
        &self.channels
    }

    /// Looks up a channel by name
    pub fn channel(&self, name: &str) -> Option<&DebouncedSignal> {
        self.channels.iter().find(|c| c.name() == name)
    }

    /// Returns whether the aggregate output is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Evaluates every channel and reports a change of the aggregate output
    pub fn evaluate(&mut self, now: Timestamp) -> Option<Transition> {
        let before = self.active;
        let mut any_active = false;
        for channel in self.channels.iter_mut() {
            if let Some(transition) = channel.evaluate(now) {
                tracing::trace!(channel = channel.name(), ?transition, "Channel transition");
            }
            any_active |= channel.is_active();
        }
        self.active = any_active;
        Transition::between(before, self.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn ms(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn signal(name: &'static str) -> (Arc<EdgeLatch>, DebouncedSignal) {
        let latch = Arc::new(EdgeLatch::new());
        let signal = DebouncedSignal::new(name, Arc::clone(&latch), TIMEOUT);
        (latch, signal)
    }

    #[test]
    fn test_latch_consumed_once() {
        let latch = EdgeLatch::new();
        assert_eq!(latch.take(), None);

        latch.trigger(ms(10));
        latch.trigger(ms(20));
        assert!(latch.is_pending());
        assert_eq!(latch.take(), Some(ms(20)));
        assert_eq!(latch.take(), None);
    }

    #[test]
    fn test_single_edge_latches_for_timeout() {
        let (latch, mut signal) = signal("pir");
        latch.trigger(ms(100));

        assert_eq!(signal.evaluate(ms(100)), Some(Transition::Activated));
        for now in [150, 300, 599] {
            assert_eq!(signal.evaluate(ms(now)), None);
            assert!(signal.is_active(), "inactive at {now}");
        }
        assert_eq!(signal.evaluate(ms(600)), Some(Transition::Deactivated));
        assert_eq!(signal.level(), SignalState::Idle);
        assert!(!signal.state().raw_flag);
        assert_eq!(signal.evaluate(ms(2_000)), None);
    }

    #[test]
    fn test_retrigger_extends_activity() {
        let (latch, mut signal) = signal("pir");
        latch.trigger(ms(0));
        assert_eq!(signal.evaluate(ms(0)), Some(Transition::Activated));

        latch.trigger(ms(400));
        assert_eq!(signal.evaluate(ms(450)), None);
        assert_eq!(signal.state().last_trigger_time, ms(400));

        assert_eq!(signal.evaluate(ms(600)), None);
        assert!(signal.is_active());
        assert_eq!(signal.evaluate(ms(899)), None);
        assert_eq!(signal.evaluate(ms(900)), Some(Transition::Deactivated));
    }

    #[test]
    fn test_stale_edge_does_not_toggle() {
        let (latch, mut signal) = signal("radar");
        latch.trigger(ms(0));
        assert_eq!(signal.evaluate(ms(1_000)), None);
        assert!(!signal.is_active());
    }

    #[test]
    fn test_idle_without_edges() {
        let (_latch, mut signal) = signal("radar");
        assert_eq!(signal.evaluate(ms(0)), None);
        assert_eq!(signal.evaluate(ms(10_000)), None);
        assert_eq!(signal.state(), DebouncedState::default());
    }

    #[test]
    fn test_aggregate_or_activation_and_deactivation() {
        let (pir_latch, pir) = signal("pir");
        let (radar_latch, radar) = signal("radar");
        let mut aggregate = PresenceAggregate::new(vec![pir, radar]);

        pir_latch.trigger(ms(100));
        assert_eq!(aggregate.evaluate(ms(100)), Some(Transition::Activated));

        radar_latch.trigger(ms(400));
        assert_eq!(aggregate.evaluate(ms(400)), None);

        // pir idles at 600, radar keeps the output latched until 900
        assert_eq!(aggregate.evaluate(ms(600)), None);
        assert!(aggregate.is_active());
        assert!(!aggregate.channel("pir").unwrap().is_active());
        assert!(aggregate.channel("radar").unwrap().is_active());

        assert_eq!(aggregate.evaluate(ms(899)), None);
        assert_eq!(aggregate.evaluate(ms(900)), Some(Transition::Deactivated));
        assert_eq!(aggregate.evaluate(ms(1_000)), None);
    }

    #[test]
    fn test_aggregate_reports_activation_once() {
        let (latch, pir) = signal("pir");
        let mut aggregate = PresenceAggregate::new(vec![pir]);

        let mut activations = 0;
        for now in (0..500).step_by(50) {
            latch.trigger(ms(now));
            if aggregate.evaluate(ms(now)) == Some(Transition::Activated) {
                activations += 1;
            }
        }
        assert_eq!(activations, 1);
    }
}
