//! Cross-site sync endpoint: `/sync/link`.

mod dto;
mod handlers;
mod routes;

pub use dto::{SyncLinkRequest, SyncLinkResponse};
pub use routes::routes;
