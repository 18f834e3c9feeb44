//! Guardrail validation of candidate markup.
//!
//! A pure check over the (slot, html) pair about to be served or installed:
//! size bound, script and handler-attribute rejection, preservation of the
//! seed's `data-ai-*` markers, and a configurable flagged-phrase list.
//! Rejections never reach the client as errors; the caller substitutes the
//! other slot or the original seed and logs the outcome.

use std::collections::BTreeSet;

/// Guardrail configuration.
#[derive(Debug, Clone)]
pub struct GuardrailPolicy {
    /// Maximum accepted markup size in bytes.
    pub max_bytes: usize,
    /// Phrases that disqualify a candidate outright (matched
    /// case-insensitively).
    pub flagged_phrases: Vec<String>,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024,
            flagged_phrases: Vec::new(),
        }
    }
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    /// Serve the candidate as-is.
    Approve,
    /// Fall back to the other slot or the seed; reasons feed the audit log.
    Reject { reasons: Vec<String> },
}

impl GuardrailVerdict {
    /// True when the candidate passed.
    pub fn is_approved(&self) -> bool {
        matches!(self, GuardrailVerdict::Approve)
    }
}

/// Tags whose presence disqualifies a candidate regardless of attributes.
const FORBIDDEN_TAGS: [&str; 4] = ["<script", "<iframe", "<object", "<embed"];

impl GuardrailPolicy {
    /// Creates a policy with the given flagged-phrase list.
    pub fn new(max_bytes: usize, flagged_phrases: Vec<String>) -> Self {
        Self {
            max_bytes,
            flagged_phrases,
        }
    }

    /// Validates `candidate_html` against the policy and the markers the
    /// original `seed_html` carries.
    pub fn validate(&self, seed_html: &str, candidate_html: &str) -> GuardrailVerdict {
        let mut reasons = Vec::new();

        if candidate_html.len() > self.max_bytes {
            reasons.push(format!(
                "markup size {} exceeds bound of {} bytes",
                candidate_html.len(),
                self.max_bytes
            ));
        }

        let lowered = candidate_html.to_ascii_lowercase();

        for tag in FORBIDDEN_TAGS {
            if lowered.contains(tag) {
                reasons.push(format!("forbidden element {}>", tag));
            }
        }

        if let Some(attr) = find_event_handler_attribute(&lowered) {
            reasons.push(format!("event handler attribute '{}' not allowed", attr));
        }

        if lowered.contains("javascript:") {
            reasons.push("javascript: url not allowed".to_string());
        }

        let seed_markers = data_ai_markers(seed_html);
        let candidate_markers = data_ai_markers(candidate_html);
        for marker in seed_markers.difference(&candidate_markers) {
            reasons.push(format!("required marker '{}' was stripped", marker));
        }

        for phrase in &self.flagged_phrases {
            if !phrase.is_empty() && lowered.contains(&phrase.to_ascii_lowercase()) {
                reasons.push(format!("flagged phrase '{}' present", phrase));
            }
        }

        if reasons.is_empty() {
            GuardrailVerdict::Approve
        } else {
            GuardrailVerdict::Reject { reasons }
        }
    }
}

/// Collects the `data-ai-*` attribute names appearing in a fragment.
///
/// The client element keys its behavior off these markers, so any candidate
/// must retain every marker present in the author's seed.
pub fn data_ai_markers(html: &str) -> BTreeSet<String> {
    let lowered = html.to_ascii_lowercase();
    let mut markers = BTreeSet::new();
    let mut rest = lowered.as_str();

    while let Some(pos) = rest.find("data-ai-") {
        let tail = &rest[pos..];
        let end = tail
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(tail.len());
        markers.insert(tail[..end].to_string());
        rest = &tail[end..];
    }

    markers
}

/// Scans for `on*=` handler attributes (onclick, onload, ...) in attribute
/// position. Works on lowercased input.
fn find_event_handler_attribute(lowered: &str) -> Option<String> {
    let bytes = lowered.as_bytes();
    let mut i = 0;

    while let Some(offset) = lowered[i..].find(" on") {
        let start = i + offset + 1;
        let name_end = lowered[start..]
            .find(|c: char| !(c.is_ascii_alphanumeric()))
            .map(|e| start + e)
            .unwrap_or(lowered.len());

        // Attribute form requires a following '=' and a plausible name
        let name = &lowered[start..name_end];
        if name.len() > 2 && name_end < bytes.len() && bytes[name_end] == b'=' {
            return Some(name.to_string());
        }
        i = start + 2;
    }

    None
}
