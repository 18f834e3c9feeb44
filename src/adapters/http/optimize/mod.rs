//! Optimize endpoints: `/api/optimize` and the legacy `/tagAi`.

mod dto;
mod handlers;
mod routes;

pub use dto::{OptimizeRequest, OptimizeResponse};
pub use routes::routes;
