//! Variant records, the selection bandit, and guardrail validation.

mod bandit;
mod guardrail;
mod record;

pub use bandit::{RegenerationCheck, SelectionPolicy};
pub use guardrail::{data_ai_markers, GuardrailPolicy, GuardrailVerdict};
pub use record::{ArchivedVariant, SlotLabel, VariantKey, VariantRecord, VariantSlot};
