//! Server-side throttle for high-frequency behavioral events.
//!
//! The client SDK already rate-limits its own instrumentation; this gate is
//! the server-side counterpart. Consecutive occurrences of a throttled event
//! name from the same (user, session) inside the per-name minimum interval
//! collapse into the previously admitted event, which gains a
//! `coalesced_count` property on flush.

use std::collections::HashMap;

use crate::domain::foundation::{BusinessId, SessionId, Timestamp, UserId};

use super::event::EventName;

/// Outcome of offering one event to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Store the event.
    Admit,
    /// Fold into the previously admitted event; do not store.
    Coalesce { suppressed_so_far: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GateKey {
    business_id: BusinessId,
    user_id: UserId,
    session_id: SessionId,
    event_name: EventName,
}

#[derive(Debug, Clone)]
struct GateState {
    last_admitted: Timestamp,
    suppressed: u64,
}

/// Per-(user, session, event-name) throttle state.
///
/// The gate holds only transient counters; it is the single piece of
/// in-memory state the ingest path keeps across requests.
#[derive(Debug, Default)]
pub struct ThrottleGate {
    states: HashMap<GateKey, GateState>,
}

impl ThrottleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers an event occurrence observed at `at`.
    ///
    /// Events outside the throttle class are always admitted and tracked
    /// for nothing. Throttled names are admitted when the per-name minimum
    /// interval has elapsed since the last admitted occurrence.
    pub fn offer(
        &mut self,
        business_id: &BusinessId,
        user_id: &UserId,
        session_id: &SessionId,
        event_name: EventName,
        at: Timestamp,
    ) -> ThrottleDecision {
        let Some(interval) = event_name.min_interval() else {
            return ThrottleDecision::Admit;
        };

        let key = GateKey {
            business_id: business_id.clone(),
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            event_name,
        };

        match self.states.get_mut(&key) {
            Some(state) => {
                let elapsed = at.secs_since(&state.last_admitted);
                if elapsed >= interval.as_secs_f64() {
                    state.last_admitted = at;
                    state.suppressed = 0;
                    ThrottleDecision::Admit
                } else {
                    state.suppressed += 1;
                    ThrottleDecision::Coalesce {
                        suppressed_so_far: state.suppressed,
                    }
                }
            }
            None => {
                self.states.insert(
                    key,
                    GateState {
                        last_admitted: at,
                        suppressed: 0,
                    },
                );
                ThrottleDecision::Admit
            }
        }
    }

    /// Drops gate state older than `horizon_secs`, bounding memory for
    /// long-lived processes.
    pub fn evict_older_than(&mut self, now: Timestamp, horizon_secs: i64) {
        let cutoff = now.minus_secs(horizon_secs);
        self.states
            .retain(|_, state| state.last_admitted.is_after(&cutoff));
    }

    /// Number of live gate entries.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when no gate state is held.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
