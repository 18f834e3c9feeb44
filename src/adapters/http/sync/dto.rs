//! Request/response DTOs for cross-site sync.

use serde::{Deserialize, Serialize};

/// Body of `POST /sync/link`.
#[derive(Debug, Deserialize)]
pub struct SyncLinkRequest {
    pub local_uid: String,
    #[serde(default)]
    pub global_uid: Option<String>,
}

/// Link confirmation, echoing the (possibly minted) global uid.
#[derive(Debug, Serialize)]
pub struct SyncLinkResponse {
    pub global_uid: String,
    pub linked: bool,
    pub linked_businesses: usize,
}
