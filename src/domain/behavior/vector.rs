//! Behavioral vector aggregation.
//!
//! Folds a user's recent event stream into five [0, 1] signals. The
//! computation is a pure function of the events inside the window and the
//! observation time; storage hands events in newest-first and the fold
//! re-sorts, which also absorbs the 1 s reordering tolerance of ingestion.

use serde::{Deserialize, Serialize};

use crate::domain::events::{Event, EventName};
use crate::domain::foundation::Timestamp;

/// Hover dwell (seconds) above which a hover counts as a hesitation signal.
const LONG_HOVER_SECS: f64 = 2.0;

/// Cap on aggregate time-on-component when computing engagement.
const ENGAGEMENT_TIME_CAP_SECS: f64 = 300.0;

/// View-to-action latency (seconds) mapping to full decision velocity.
const VELOCITY_FLOOR_SECS: f64 = 2.0;

/// Neutral value used whenever a component has no signal.
const NEUTRAL: f64 = 0.5;

/// Sliding-window parameters for aggregation.
#[derive(Debug, Clone, Copy)]
pub struct AggregationWindow {
    /// Maximum number of most-recent events considered.
    pub max_events: usize,
    /// Age bound, in seconds, relative to the observation time.
    pub max_age_secs: i64,
}

impl Default for AggregationWindow {
    fn default() -> Self {
        Self {
            max_events: 50,
            max_age_secs: 600,
        }
    }
}

/// Five-component summary of a user's recent activity, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehavioralVector {
    /// Breadth of interest: unique components viewed over component views.
    pub exploration_score: f64,
    /// Decision friction from hesitation-class signals.
    pub hesitation_score: f64,
    /// Attention: capped time-on-component over elapsed session time.
    pub engagement_depth: f64,
    /// Speed from viewing a component to acting on it.
    pub decision_velocity: f64,
    /// Focused browsing versus scattered attention.
    pub content_focus_ratio: f64,
}

impl BehavioralVector {
    /// Neutral vector used when no events carry signal.
    pub fn neutral() -> Self {
        Self {
            exploration_score: NEUTRAL,
            hesitation_score: NEUTRAL,
            engagement_depth: NEUTRAL,
            decision_velocity: NEUTRAL,
            content_focus_ratio: NEUTRAL,
        }
    }

    /// Computes the vector from events observed at `now`.
    ///
    /// `events` may arrive in any order; only those inside the window
    /// participate. An empty window yields [`BehavioralVector::neutral`].
    pub fn from_events(events: &[Event], now: Timestamp, window: AggregationWindow) -> Self {
        let cutoff = now.minus_secs(window.max_age_secs);

        let mut in_window: Vec<&Event> = events
            .iter()
            .filter(|e| e.timestamp.is_after(&cutoff))
            .collect();
        in_window.sort_by_key(|e| e.timestamp);
        if in_window.len() > window.max_events {
            let start = in_window.len() - window.max_events;
            in_window.drain(..start);
        }

        if in_window.is_empty() {
            return Self::neutral();
        }

        Self {
            exploration_score: exploration(&in_window),
            hesitation_score: hesitation(&in_window),
            engagement_depth: engagement(&in_window),
            decision_velocity: velocity(&in_window),
            content_focus_ratio: focus(&in_window),
        }
    }
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Unique components viewed / total component views.
fn exploration(events: &[&Event]) -> f64 {
    let views: Vec<&&Event> = events
        .iter()
        .filter(|e| e.event_name == EventName::ComponentViewed)
        .collect();
    if views.is_empty() {
        return NEUTRAL;
    }

    let mut seen = std::collections::HashSet::new();
    for view in &views {
        if let Some(component) = &view.component_id {
            seen.insert(component.as_str());
        }
    }
    if seen.is_empty() {
        return NEUTRAL;
    }

    clamp01(seen.len() as f64 / views.len() as f64)
}

/// Weighted count of hesitation-class signals, normalized by event volume.
fn hesitation(events: &[&Event]) -> f64 {
    let mut weighted = 0.0;
    let mut saw_signal_class = false;

    for event in events {
        let weight = match event.event_name {
            EventName::MouseHesitation => 1.0,
            EventName::MouseIdleStart => 0.75,
            EventName::ScrollDirectionChange => 0.5,
            EventName::Backtrack => 1.0,
            EventName::Hover => {
                let dwell = event.numeric_property("duration_seconds").unwrap_or(0.0);
                if dwell >= LONG_HOVER_SECS {
                    0.5
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        if weight > 0.0 {
            saw_signal_class = true;
            weighted += weight * event.coalesced_count() as f64;
        }
    }

    if !saw_signal_class {
        return NEUTRAL;
    }

    // Six weighted hesitation signals inside the window saturate the score.
    clamp01(weighted / 6.0)
}

/// Aggregate time-on-component (capped) over elapsed session time.
fn engagement(events: &[&Event]) -> f64 {
    let mut total_secs = 0.0;
    let mut saw_time_event = false;

    for event in events {
        if event.event_name == EventName::TimeOnComponent {
            saw_time_event = true;
            total_secs += event.numeric_property("time_seconds").unwrap_or(0.0);
        }
    }
    if !saw_time_event {
        return NEUTRAL;
    }

    let first = events.first().map(|e| e.timestamp).unwrap_or_default();
    let last = events.last().map(|e| e.timestamp).unwrap_or_default();
    let elapsed = last.secs_since(&first).max(1.0);

    clamp01(total_secs.min(ENGAGEMENT_TIME_CAP_SECS) / elapsed.min(ENGAGEMENT_TIME_CAP_SECS))
}

/// Inverse median latency between a component view and the first subsequent
/// click or add-to-cart on that component.
fn velocity(events: &[&Event]) -> f64 {
    let mut latencies: Vec<f64> = Vec::new();

    for (idx, event) in events.iter().enumerate() {
        if event.event_name != EventName::ComponentViewed {
            continue;
        }
        let Some(component) = &event.component_id else {
            continue;
        };

        let action = events[idx + 1..].iter().find(|later| {
            matches!(later.event_name, EventName::Click | EventName::AddToCart)
                && later.component_id.as_ref() == Some(component)
        });
        if let Some(action) = action {
            latencies.push(action.timestamp.secs_since(&event.timestamp));
        }
    }

    if latencies.is_empty() {
        return NEUTRAL;
    }

    latencies.sort_by(|a, b| a.total_cmp(b));
    let median = latencies[latencies.len() / 2];

    // A median at or below the floor reads as full velocity; it decays
    // hyperbolically from there.
    clamp01(VELOCITY_FLOOR_SECS / median.max(VELOCITY_FLOOR_SECS))
}

/// 1 − (direction-change rate + tab-hidden fraction).
fn focus(events: &[&Event]) -> f64 {
    let total = events.len() as f64;
    let mut direction_changes = 0.0;
    let mut hidden = 0.0;
    let mut saw_signal_class = false;

    for event in events {
        match event.event_name {
            EventName::ScrollDirectionChange => {
                saw_signal_class = true;
                direction_changes += event.coalesced_count() as f64;
            }
            EventName::TabHidden | EventName::WindowBlur => {
                saw_signal_class = true;
                hidden += 1.0;
            }
            EventName::TabVisible | EventName::WindowFocus | EventName::ScrollPause => {
                saw_signal_class = true;
            }
            _ => {}
        }
    }

    if !saw_signal_class {
        return NEUTRAL;
    }

    clamp01(1.0 - (direction_changes / total + hidden / total))
}
