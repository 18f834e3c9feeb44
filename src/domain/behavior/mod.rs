//! Behavioral analytics: event aggregation and identity classification.

mod identity;
mod vector;

pub use identity::{classify, Classification, IdentityState, SessionSignals};
pub use vector::{AggregationWindow, BehavioralVector};
