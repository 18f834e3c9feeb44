//! Per-request audit trail.
//!
//! Every pipeline stage appends one timestamped entry; the full log is
//! returned to the caller and mirrored to the server log.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// One stage outcome in the per-request audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Stage that produced the entry (e.g. "analytics", "guardrail").
    pub stage: String,
    /// Human-readable outcome.
    pub detail: String,
    /// When the stage completed.
    pub at: Timestamp,
}

/// Append-only audit log owned by one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage entry stamped now.
    pub fn record(&mut self, stage: impl Into<String>, detail: impl Into<String>) {
        let entry = AuditEntry {
            stage: stage.into(),
            detail: detail.into(),
            at: Timestamp::now(),
        };
        tracing::debug!(stage = %entry.stage, "{}", entry.detail);
        self.entries.push(entry);
    }

    /// The recorded entries, oldest first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Stage name of the final entry, if any.
    pub fn last_stage(&self) -> Option<&str> {
        self.entries.last().map(|e| e.stage.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_accumulate_in_order() {
        let mut log = AuditLog::new();
        log.record("analytics", "vector computed from 12 events");
        log.record("identity", "classified as cautious (0.72)");

        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].stage, "analytics");
        assert_eq!(log.last_stage(), Some("identity"));
    }

    #[test]
    fn log_serializes_as_a_bare_array() {
        let mut log = AuditLog::new();
        log.record("decision", "selected A");

        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["stage"], "decision");
    }
}
