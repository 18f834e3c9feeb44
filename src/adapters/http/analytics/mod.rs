//! Read-only admin and analytics endpoints.

mod handlers;
mod routes;

pub use routes::routes;
