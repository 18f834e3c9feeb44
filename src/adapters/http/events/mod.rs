//! Event ingest endpoints: `/api/events/track` and `/api/events/batch`.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    BatchEventRequest, BatchEventResponse, EventItem, TrackEventRequest, TrackEventResponse,
};
pub use routes::routes;
