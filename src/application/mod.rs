//! Application layer: request orchestration over the domain and the ports.
//!
//! Each HTTP request is served by one pipeline invocation holding a
//! request-scoped context; nothing here outlives a request except the
//! event ingestor's write queue and the detached regeneration tasks.

mod analytics;
mod audit;
mod event_ingestor;
mod identity_resolver;
mod optimizer;
mod regeneration;
mod rewards;
mod services;
mod sync;

pub use analytics::{
    dashboard, journey, roster, ComponentSlotStats, ComponentStats, DashboardView, JourneyView,
    VariantSnapshotView,
};
pub use audit::{AuditEntry, AuditLog};
pub use event_ingestor::{EventIngestor, EventStatus, IncomingEvent, IngestOutcome};
pub use identity_resolver::{authenticate, resolve_user, ResolvedUser};
pub use optimizer::{optimize, OptimizeCommand, OptimizeOutcome};
pub use regeneration::RegenerationEngine;
pub use rewards::{apply_reward, ComponentScore, RewardCommand};
pub use services::{EngineMode, Services, Stores};
pub use sync::link_global_user;
