//! Request/response DTOs for the optimize endpoints.
//!
//! Field names follow the embedded element's wire contract, camelCase
//! `changingHtml`/`contextHtml` included; the legacy `/tagAi` body is the
//! same shape.

use serde::{Deserialize, Serialize};

use crate::application::{AuditLog, EngineMode, OptimizeCommand, OptimizeOutcome};
use crate::domain::behavior::{BehavioralVector, IdentityState};
use crate::domain::variants::SlotLabel;

/// Body of `POST /api/optimize` and `POST /tagAi`.
#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub global_uid: Option<String>,
    pub component_id: String,
    #[serde(rename = "changingHtml")]
    pub changing_html: String,
    #[serde(rename = "contextHtml", default)]
    pub context_html: Option<String>,
}

impl From<OptimizeRequest> for OptimizeCommand {
    fn from(request: OptimizeRequest) -> Self {
        Self {
            user_id: request.user_id,
            session_id: request.session_id,
            global_uid: request.global_uid,
            component_id: request.component_id,
            changing_html: request.changing_html,
            context_html: request.context_html,
        }
    }
}

/// The selected variant and the inference behind it.
#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub status: &'static str,
    pub user_id: String,
    pub session_id: String,
    pub variant: SlotLabel,
    #[serde(rename = "changingHtml")]
    pub changing_html: String,
    pub identity_state: IdentityState,
    pub confidence: f64,
    pub behavioral_vector: BehavioralVector,
    pub audit_log: AuditLog,
    pub mode: EngineMode,
}

impl From<OptimizeOutcome> for OptimizeResponse {
    fn from(outcome: OptimizeOutcome) -> Self {
        Self {
            status: "optimized",
            user_id: outcome.user_id.to_string(),
            session_id: outcome.session_id.to_string(),
            variant: outcome.variant,
            changing_html: outcome.changing_html,
            identity_state: outcome.identity_state,
            confidence: outcome.confidence,
            behavioral_vector: outcome.behavioral_vector,
            audit_log: outcome.audit_log,
            mode: outcome.mode,
        }
    }
}
