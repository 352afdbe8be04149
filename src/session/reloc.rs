//! Relocalization state machine.
//!
//! Transitions are driven exclusively by tracking-quality signals from the
//! pose provider, never by timers or user action. Each transition settles
//! for a debounce window before observers see it, so tracking quality
//! oscillating near the threshold cannot flicker the UI; a newer qualifying
//! signal cancels the pending one outright (last signal wins). The
//! anchor-write gate clears immediately on degradation - only the asserting
//! direction is debounced.

use tracing::debug;

use crate::config::DEFAULT_SETTLE_MS;
use crate::core::{Clock, SystemClock, Timestamp};

/// UI-visible relocalization status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelocState {
    /// No session started against a restored map yet.
    NotStarted,
    /// The pose provider is searching for the captured space.
    Relocalizing,
    /// The pose provider has locked onto the captured space.
    Tracking,
}

/// Three-valued tracking-quality signal from the pose provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingSignal {
    Normal,
    LimitedRelocalizing,
    /// Any other quality value. Ignored: no transition, no cancellation.
    Other,
}

pub struct RelocalizationStateMachine {
    state: RelocState,
    /// Armed transition waiting out the settle window.
    pending: Option<(RelocState, Timestamp)>,
    /// True only while `Tracking` is the exposed state. Gates guide-anchor
    /// seeding and remote anchor import.
    gate: bool,
    settle_ms: u64,
    clock: Box<dyn Clock>,
}

impl RelocalizationStateMachine {
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_SETTLE_MS, Box::new(SystemClock))
    }

    pub fn with_clock(settle_ms: u64, clock: Box<dyn Clock>) -> Self {
        Self {
            state: RelocState::NotStarted,
            pending: None,
            gate: false,
            settle_ms,
            clock,
        }
    }

    /// Externally observed state. Pending transitions are invisible until
    /// they settle.
    pub fn state(&self) -> RelocState {
        self.state
    }

    /// Whether anchor-dependent writes are safe right now.
    pub fn world_is_loaded(&self) -> bool {
        self.gate
    }

    /// Feed one tracking-quality signal. A qualifying signal replaces any
    /// pending transition; `Other` changes nothing.
    pub fn on_signal(&mut self, signal: TrackingSignal) {
        let now = self.clock.now();
        match signal {
            TrackingSignal::Normal => {
                self.arm(RelocState::Tracking, now);
            }
            TrackingSignal::LimitedRelocalizing => {
                // Clearing fails safe: no debounce in this direction.
                if self.gate {
                    debug!("tracking degraded, anchor gate cleared");
                }
                self.gate = false;
                self.arm(RelocState::Relocalizing, now);
            }
            TrackingSignal::Other => {}
        }
    }

    /// Expose a pending transition whose settle window has elapsed. Call
    /// from the session loop; returns the newly exposed state, if any.
    pub fn poll(&mut self) -> Option<RelocState> {
        let now = self.clock.now();
        let (target, deadline) = self.pending?;
        if now < deadline {
            return None;
        }
        self.pending = None;
        self.state = target;
        self.gate = target == RelocState::Tracking;
        debug!(state = ?target, "relocalization state settled");
        Some(target)
    }

    fn arm(&mut self, target: RelocState, now: Timestamp) {
        self.pending = Some((target, now.saturating_add_ms(self.settle_ms)));
    }
}

impl Default for RelocalizationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;

    fn machine(clock: &ManualClock) -> RelocalizationStateMachine {
        RelocalizationStateMachine::with_clock(500, Box::new(clock.clone()))
    }

    #[test]
    fn normal_signal_settles_into_tracking() {
        let clock = ManualClock::at(1_000);
        let mut sm = machine(&clock);

        sm.on_signal(TrackingSignal::Normal);
        assert_eq!(sm.state(), RelocState::NotStarted);
        assert!(!sm.world_is_loaded());

        clock.advance(499);
        assert_eq!(sm.poll(), None);

        clock.advance(1);
        assert_eq!(sm.poll(), Some(RelocState::Tracking));
        assert!(sm.world_is_loaded());
    }

    #[test]
    fn newer_signal_cancels_pending_transition() {
        let clock = ManualClock::at(1_000);
        let mut sm = machine(&clock);

        sm.on_signal(TrackingSignal::Normal);
        clock.advance(200);
        sm.on_signal(TrackingSignal::LimitedRelocalizing);

        // Tracking must never become visible.
        clock.advance(400); // 600ms after Normal, 400ms after Limited
        assert_eq!(sm.poll(), None);
        assert_eq!(sm.state(), RelocState::NotStarted);

        clock.advance(100);
        assert_eq!(sm.poll(), Some(RelocState::Relocalizing));
        assert!(!sm.world_is_loaded());
    }

    #[test]
    fn degradation_clears_gate_immediately() {
        let clock = ManualClock::at(0);
        let mut sm = machine(&clock);

        sm.on_signal(TrackingSignal::Normal);
        clock.advance(500);
        sm.poll();
        assert!(sm.world_is_loaded());

        sm.on_signal(TrackingSignal::LimitedRelocalizing);
        // Gate drops before the state transition settles.
        assert!(!sm.world_is_loaded());
        assert_eq!(sm.state(), RelocState::Tracking);
    }

    #[test]
    fn other_signal_is_ignored_entirely() {
        let clock = ManualClock::at(0);
        let mut sm = machine(&clock);

        sm.on_signal(TrackingSignal::Normal);
        clock.advance(100);
        sm.on_signal(TrackingSignal::Other);

        // Pending transition survives an Other signal.
        clock.advance(400);
        assert_eq!(sm.poll(), Some(RelocState::Tracking));
    }

    #[test]
    fn recovery_within_window_reasserts_gate_after_settle() {
        let clock = ManualClock::at(0);
        let mut sm = machine(&clock);

        sm.on_signal(TrackingSignal::Normal);
        clock.advance(500);
        sm.poll();

        sm.on_signal(TrackingSignal::LimitedRelocalizing);
        clock.advance(200);
        sm.on_signal(TrackingSignal::Normal);
        assert!(!sm.world_is_loaded());

        clock.advance(500);
        assert_eq!(sm.poll(), Some(RelocState::Tracking));
        assert!(sm.world_is_loaded());
    }
}
