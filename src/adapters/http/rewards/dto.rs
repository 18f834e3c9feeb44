//! Request/response DTOs for the reward endpoints.

use serde::{Deserialize, Serialize};

use crate::application::{ComponentScore, RewardCommand};
use crate::domain::foundation::DomainError;
use crate::domain::variants::SlotLabel;

/// Body of the reward endpoints. The legacy shape sends a single
/// `component_id`; the current shape sends `component_ids`.
#[derive(Debug, Deserialize)]
pub struct RewardRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(rename = "variantAttributed")]
    pub variant_attributed: String,
    #[serde(default)]
    pub reward: Option<f64>,
    #[serde(default)]
    pub reward_type: Option<String>,
    #[serde(default)]
    pub component_ids: Vec<String>,
    #[serde(default)]
    pub component_id: Option<String>,
    #[serde(rename = "contextHtml", default)]
    pub context_html: Option<String>,
}

impl TryFrom<RewardRequest> for RewardCommand {
    type Error = DomainError;

    fn try_from(request: RewardRequest) -> Result<Self, Self::Error> {
        let slot = SlotLabel::parse(&request.variant_attributed).ok_or_else(|| {
            DomainError::validation("variantAttributed", "must be \"A\" or \"B\"")
        })?;

        let mut component_ids = request.component_ids;
        if let Some(single) = request.component_id.filter(|c| !c.is_empty()) {
            if !component_ids.contains(&single) {
                component_ids.push(single);
            }
        }

        Ok(Self {
            user_id: request.user_id,
            session_id: request.session_id,
            slot,
            reward: request.reward,
            reward_type: request.reward_type,
            component_ids,
        })
    }
}

/// Post-update scores, one entry per component.
#[derive(Debug, Serialize)]
pub struct RewardResponse {
    pub status: &'static str,
    pub new_scores: Vec<ComponentScore>,
}
