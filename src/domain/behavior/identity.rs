//! Identity classification: behavioral vector to psychological state.
//!
//! The rule layer is deterministic and total; an LLM refinement step may run
//! after it, but the rules remain the source of truth. Rules are evaluated
//! in fixed priority order and the first match wins.

use serde::{Deserialize, Serialize};

use crate::domain::events::Event;

use super::vector::BehavioralVector;

/// Session duration (seconds) above which sustained hesitation reads as
/// caution rather than noise.
const CAUTIOUS_SESSION_SECS: f64 = 60.0;

/// Revisit count at which comparison behavior is assumed.
const COMPARISON_REVISITS: u32 = 2;

/// Margin past a rule's thresholds that maps to full confidence.
const FULL_CONFIDENCE_MARGIN: f64 = 0.3;

/// Semantic identity states interpreted from the behavioral vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityState {
    Confident,
    Exploratory,
    Overwhelmed,
    ComparisonFocused,
    ReadyToDecide,
    Cautious,
    ImpulseBuyer,
}

impl IdentityState {
    /// Stable wire form of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityState::Confident => "confident",
            IdentityState::Exploratory => "exploratory",
            IdentityState::Overwhelmed => "overwhelmed",
            IdentityState::ComparisonFocused => "comparison_focused",
            IdentityState::ReadyToDecide => "ready_to_decide",
            IdentityState::Cautious => "cautious",
            IdentityState::ImpulseBuyer => "impulse_buyer",
        }
    }
}

impl std::fmt::Display for IdentityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session-level signals the vector alone cannot carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionSignals {
    /// Any explicit conversion-intent event inside the window.
    pub conversion_signal: bool,
    /// Elapsed time between the oldest and newest windowed event.
    pub session_duration_secs: f64,
    /// Components viewed more than once inside the window.
    pub revisit_count: u32,
}

impl SessionSignals {
    /// Derives signals from the aggregation window's events.
    pub fn from_events(events: &[Event]) -> Self {
        if events.is_empty() {
            return Self::default();
        }

        let conversion_signal = events.iter().any(|e| e.event_name.is_conversion_signal());

        let mut first = events[0].timestamp;
        let mut last = events[0].timestamp;
        for event in events {
            if event.timestamp.is_before(&first) {
                first = event.timestamp;
            }
            if event.timestamp.is_after(&last) {
                last = event.timestamp;
            }
        }

        let mut view_counts: std::collections::HashMap<&str, u32> =
            std::collections::HashMap::new();
        for event in events {
            if event.event_name == crate::domain::events::EventName::ComponentViewed {
                if let Some(component) = &event.component_id {
                    *view_counts.entry(component.as_str()).or_insert(0) += 1;
                }
            }
        }
        let revisit_count = view_counts.values().filter(|&&count| count > 1).count() as u32;

        Self {
            conversion_signal,
            session_duration_secs: last.secs_since(&first),
            revisit_count,
        }
    }
}

/// Classification outcome: the state plus a confidence in [0.5, 0.95].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub state: IdentityState,
    pub confidence: f64,
}

/// Classifies the vector, highest-priority rule first.
///
/// Confidence is the margin by which the winning rule's thresholds were
/// cleared (for the default state, the distance from the nearest rejected
/// rule), rescaled into [0.5, 0.95]. A fully neutral vector carries no
/// signal and classifies as exploratory at the confidence floor.
pub fn classify(vector: &BehavioralVector, signals: &SessionSignals) -> Classification {
    if *vector == BehavioralVector::neutral() && !signals.conversion_signal {
        return Classification {
            state: IdentityState::Exploratory,
            confidence: 0.5,
        };
    }

    // Each rule reports the slack past its thresholds when it matches,
    // or the shortfall of its nearest-missing condition when it does not.
    let rules: [(IdentityState, RuleOutcome); 6] = [
        (IdentityState::ImpulseBuyer, impulse_buyer(vector)),
        (IdentityState::ReadyToDecide, ready_to_decide(vector, signals)),
        (IdentityState::Confident, confident(vector)),
        (IdentityState::Overwhelmed, overwhelmed(vector)),
        (IdentityState::Cautious, cautious(vector, signals)),
        (
            IdentityState::ComparisonFocused,
            comparison_focused(vector, signals),
        ),
    ];

    for (state, outcome) in &rules {
        if let RuleOutcome::Matched { margin } = outcome {
            return Classification {
                state: *state,
                confidence: rescale(*margin),
            };
        }
    }

    // Default: confidence from the distance to the nearest rejected rule.
    let nearest_shortfall = rules
        .iter()
        .filter_map(|(_, outcome)| match outcome {
            RuleOutcome::Missed { shortfall } => Some(*shortfall),
            RuleOutcome::Matched { .. } => None,
        })
        .fold(f64::INFINITY, f64::min);

    Classification {
        state: IdentityState::Exploratory,
        confidence: rescale(nearest_shortfall.min(FULL_CONFIDENCE_MARGIN)),
    }
}

enum RuleOutcome {
    Matched { margin: f64 },
    Missed { shortfall: f64 },
}

fn rescale(margin: f64) -> f64 {
    let normalized = (margin / FULL_CONFIDENCE_MARGIN).clamp(0.0, 1.0);
    0.5 + 0.45 * normalized
}

/// Combines per-condition slacks: all non-negative means a match whose
/// margin is the weakest condition; otherwise the shortfall is how far the
/// worst condition missed.
fn combine(slacks: &[f64]) -> RuleOutcome {
    let weakest = slacks.iter().fold(f64::INFINITY, |acc, s| acc.min(*s));
    if weakest >= 0.0 {
        RuleOutcome::Matched { margin: weakest }
    } else {
        RuleOutcome::Missed {
            shortfall: -weakest,
        }
    }
}

fn impulse_buyer(v: &BehavioralVector) -> RuleOutcome {
    combine(&[v.decision_velocity - 0.8, 0.2 - v.hesitation_score])
}

fn ready_to_decide(v: &BehavioralVector, signals: &SessionSignals) -> RuleOutcome {
    let conversion_slack = if signals.conversion_signal { 0.3 } else { -0.3 };
    combine(&[v.decision_velocity - 0.6, conversion_slack])
}

fn confident(v: &BehavioralVector) -> RuleOutcome {
    combine(&[v.decision_velocity - 0.5, 0.4 - v.exploration_score])
}

fn overwhelmed(v: &BehavioralVector) -> RuleOutcome {
    combine(&[v.hesitation_score - 0.5, 0.5 - v.content_focus_ratio])
}

fn cautious(v: &BehavioralVector, signals: &SessionSignals) -> RuleOutcome {
    let duration_slack = if signals.session_duration_secs >= CAUTIOUS_SESSION_SECS {
        0.3
    } else {
        -0.3
    };
    let no_conversion_slack = if signals.conversion_signal { -0.3 } else { 0.3 };
    combine(&[v.hesitation_score - 0.5, duration_slack, no_conversion_slack])
}

fn comparison_focused(v: &BehavioralVector, signals: &SessionSignals) -> RuleOutcome {
    let revisit_slack = if signals.revisit_count >= COMPARISON_REVISITS {
        0.3
    } else {
        -0.3
    };
    combine(&[v.engagement_depth - 0.5, revisit_slack])
}
