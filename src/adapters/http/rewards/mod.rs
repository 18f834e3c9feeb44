//! Reward endpoints: `/api/reward`, `/api/component/reward`, and the
//! legacy `/rewardTag`.

mod dto;
mod handlers;
mod routes;

pub use dto::{RewardRequest, RewardResponse};
pub use routes::routes;
