//! In-memory store implementations.
//!
//! Back the keyless development mode and the test suites. Single-process
//! only; semantics (CAS, quota, lock TTL, idempotent init) match the
//! Postgres adapters.

mod agreement_store;
mod business_store;
mod event_store;
mod global_user_store;
mod user_store;
mod variant_store;

pub use agreement_store::InMemoryAgreementStore;
pub use business_store::InMemoryBusinessStore;
pub use event_store::InMemoryEventStore;
pub use global_user_store::InMemoryGlobalUserStore;
pub use user_store::InMemoryUserStore;
pub use variant_store::InMemoryVariantStore;
