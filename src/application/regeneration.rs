//! LLM-driven variant regeneration.
//!
//! Regeneration is a fire-and-forget job keyed by the variant record. The
//! reward pipeline schedules it after acknowledging the trigger; the job
//! holds the storage advisory lock for its duration, so concurrent
//! triggers coalesce and a crashed worker is fenced out by the lock TTL.
//! Failures never touch the active slot.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::behavior::{BehavioralVector, IdentityState};
use crate::domain::foundation::Timestamp;
use crate::domain::variants::{
    data_ai_markers, ArchivedVariant, GuardrailPolicy, SlotLabel, VariantKey, VariantRecord,
};
use crate::ports::{AiProvider, RewriteRequest, VariantStore};

/// Advisory lock TTL; outlives any single regeneration attempt.
const LOCK_TTL_SECS: i64 = 30;

/// The regeneration worker.
pub struct RegenerationEngine {
    variants: Arc<dyn VariantStore>,
    provider: Arc<dyn AiProvider>,
    guardrail: GuardrailPolicy,
    deadline: Duration,
}

impl RegenerationEngine {
    pub fn new(
        variants: Arc<dyn VariantStore>,
        provider: Arc<dyn AiProvider>,
        guardrail: GuardrailPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            variants,
            provider,
            guardrail,
            deadline,
        }
    }

    /// Schedules regeneration of `loser` if no job is already in flight
    /// for the record. Returns true when a job was spawned.
    pub async fn schedule(
        self: &Arc<Self>,
        key: VariantKey,
        loser: SlotLabel,
        identity_state: IdentityState,
        behavioral_vector: BehavioralVector,
    ) -> bool {
        match self
            .variants
            .try_acquire_regeneration_lock(&key, LOCK_TTL_SECS)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(key = %key, "regeneration already in flight, coalescing");
                return false;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "regeneration lock unavailable");
                return false;
            }
        }

        let engine = self.clone();
        tokio::spawn(async move {
            engine
                .run(key, loser, identity_state, behavioral_vector)
                .await;
        });
        true
    }

    /// Runs one regeneration attempt. The lock is already held and is
    /// always released on the way out.
    async fn run(
        &self,
        key: VariantKey,
        loser: SlotLabel,
        identity_state: IdentityState,
        behavioral_vector: BehavioralVector,
    ) {
        let result = tokio::time::timeout(
            self.deadline,
            self.regenerate(&key, loser, identity_state, behavioral_vector),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!(key = %key, slot = %loser, "regeneration installed new candidate");
            }
            Ok(Err(reason)) => {
                tracing::warn!(key = %key, slot = %loser, reason = %reason, "regeneration failed, slot unchanged");
            }
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    slot = %loser,
                    deadline_secs = self.deadline.as_secs(),
                    "regeneration deadline exceeded, slot unchanged"
                );
            }
        }

        if let Err(e) = self.variants.release_regeneration_lock(&key).await {
            tracing::warn!(key = %key, error = %e, "failed to release regeneration lock");
        }
    }

    async fn regenerate(
        &self,
        key: &VariantKey,
        loser: SlotLabel,
        identity_state: IdentityState,
        behavioral_vector: BehavioralVector,
    ) -> Result<(), String> {
        let record = self
            .variants
            .get(key)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "record disappeared".to_string())?;

        let losing = record.slot(loser).clone();
        let winning = record.slot(loser.other()).clone();
        let seed = seed_of(&record, loser);

        let response = self
            .provider
            .rewrite(RewriteRequest {
                seed_html: seed.clone(),
                losing_html: losing.current_html.clone(),
                winning_html: winning.current_html,
                identity_state,
                behavioral_vector,
                component_id: key.component_id.clone(),
            })
            .await
            .map_err(|e| e.to_string())?;

        let candidate = graft_skeleton(&seed, &response.html);

        if let crate::domain::variants::GuardrailVerdict::Reject { reasons } =
            self.guardrail.validate(&seed, &candidate)
        {
            return Err(format!("guardrail rejected candidate: {}", reasons.join("; ")));
        }

        let archive = ArchivedVariant {
            html: losing.current_html,
            score: losing.current_score,
            retired_at: Timestamp::now(),
        };
        self.variants
            .replace_html(key, loser, &candidate, archive)
            .await
            .map_err(|e| e.to_string())
    }
}

/// The author's original fragment for a slot: the oldest archived markup
/// when the slot has regenerated before, otherwise its live markup (both
/// slots start seeded from the original).
fn seed_of(record: &VariantRecord, slot: SlotLabel) -> String {
    let s = record.slot(slot);
    s.history
        .first()
        .map(|archived| archived.html.clone())
        .unwrap_or_else(|| s.current_html.clone())
}

/// Re-grafts the seed's structural skeleton onto the model output: the
/// top-level tag and every `data-ai-*` marker must survive even when the
/// model drops them.
pub(crate) fn graft_skeleton(seed_html: &str, candidate_html: &str) -> String {
    let candidate = candidate_html.trim();
    let Some((seed_open, seed_tag)) = opening_tag(seed_html) else {
        return candidate.to_string();
    };

    let markers_ok = data_ai_markers(seed_html)
        .difference(&data_ai_markers(candidate))
        .next()
        .is_none();
    let tag_ok = opening_tag(candidate)
        .map(|(_, tag)| tag == seed_tag)
        .unwrap_or(false);

    if markers_ok && tag_ok {
        return candidate.to_string();
    }

    // Rebuild: seed's opening/closing tags around the candidate's inner
    // content (or the whole candidate when it has no element of its own).
    let inner = inner_content(candidate).unwrap_or(candidate);
    format!("{seed_open}{inner}</{seed_tag}>")
}

/// Extracts a fragment's opening tag and tag name.
fn opening_tag(html: &str) -> Option<(&str, &str)> {
    let trimmed = html.trim_start();
    if !trimmed.starts_with('<') || trimmed.starts_with("</") {
        return None;
    }
    let end = trimmed.find('>')?;
    let open = &trimmed[..=end];
    let name_end = trimmed[1..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .map(|i| i + 1)?;
    let name = &trimmed[1..name_end];
    if name.is_empty() {
        return None;
    }
    Some((open, name))
}

/// The content between a fragment's outermost tags, when it has one
/// element wrapping everything.
fn inner_content(html: &str) -> Option<&str> {
    let trimmed = html.trim();
    let (open, tag) = opening_tag(trimmed)?;
    let close = format!("</{tag}>");
    let rest = &trimmed[open.len()..];
    let close_pos = rest.rfind(&close)?;
    Some(&rest[..close_pos])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockProvider;
    use crate::adapters::memory::InMemoryVariantStore;
    use crate::domain::foundation::{BusinessId, ComponentId, UserId};
    use crate::ports::VariantStore as _;

    const SEED: &str = r#"<div data-ai-component="hero"><h1>Welcome</h1></div>"#;

    fn key() -> VariantKey {
        VariantKey::new(
            BusinessId::new("biz_1").unwrap(),
            UserId::new("user_1").unwrap(),
            ComponentId::new("hero").unwrap(),
        )
    }

    async fn engine_with(
        provider: MockProvider,
    ) -> (Arc<RegenerationEngine>, Arc<InMemoryVariantStore>) {
        let variants = Arc::new(InMemoryVariantStore::new());
        let engine = Arc::new(RegenerationEngine::new(
            variants.clone(),
            Arc::new(provider),
            GuardrailPolicy::default(),
            Duration::from_secs(10),
        ));
        (engine, variants)
    }

    #[tokio::test]
    async fn success_archives_loser_and_installs_candidate() {
        let (engine, variants) = engine_with(MockProvider::new()).await;
        variants.get_or_init(&key(), SEED).await.unwrap();
        variants
            .update_slot(&key(), SlotLabel::B, (0.0, 0), 1.5, 5)
            .await
            .unwrap();

        let scheduled = engine
            .schedule(
                key(),
                SlotLabel::B,
                IdentityState::Cautious,
                BehavioralVector::neutral(),
            )
            .await;
        assert!(scheduled);

        // Detached job: poll for completion
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let record = variants.get(&key()).await.unwrap().unwrap();
            if !record.slot_b.history.is_empty() {
                assert_eq!(record.slot_b.history[0].score, 1.5);
                assert_eq!(record.slot_b.current_score, 0.0);
                assert_eq!(record.slot_b.number_of_trials, 0);
                assert_ne!(record.slot_b.current_html, SEED);
                return;
            }
        }
        panic!("regeneration did not complete");
    }

    #[tokio::test]
    async fn failure_leaves_slot_untouched_and_releases_lock() {
        let (engine, variants) = engine_with(MockProvider::failing()).await;
        variants.get_or_init(&key(), SEED).await.unwrap();

        assert!(engine
            .schedule(
                key(),
                SlotLabel::B,
                IdentityState::Exploratory,
                BehavioralVector::neutral(),
            )
            .await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let record = variants.get(&key()).await.unwrap().unwrap();
        assert_eq!(record.slot_b.current_html, SEED);
        assert!(record.slot_b.history.is_empty());

        // Lock released: a new job can be scheduled
        assert!(engine
            .schedule(
                key(),
                SlotLabel::B,
                IdentityState::Exploratory,
                BehavioralVector::neutral(),
            )
            .await);
    }

    #[tokio::test]
    async fn concurrent_triggers_coalesce_on_the_lock() {
        let (engine, variants) = engine_with(MockProvider::new()).await;
        variants.get_or_init(&key(), SEED).await.unwrap();

        assert!(variants
            .try_acquire_regeneration_lock(&key(), 30)
            .await
            .unwrap());
        // Lock held elsewhere: scheduling is refused
        assert!(!engine
            .schedule(
                key(),
                SlotLabel::B,
                IdentityState::Exploratory,
                BehavioralVector::neutral(),
            )
            .await);
    }

    mod graft {
        use super::*;

        #[test]
        fn compliant_candidate_passes_through() {
            let candidate = r#"<div data-ai-component="hero"><h1>Better!</h1></div>"#;
            assert_eq!(graft_skeleton(SEED, candidate), candidate);
        }

        #[test]
        fn stripped_markers_are_regrafted() {
            let candidate = "<div><h1>Better!</h1></div>";
            let grafted = graft_skeleton(SEED, candidate);

            assert!(grafted.starts_with(r#"<div data-ai-component="hero">"#));
            assert!(grafted.contains("<h1>Better!</h1>"));
            assert!(grafted.ends_with("</div>"));
        }

        #[test]
        fn wrong_top_level_tag_is_replaced() {
            let candidate = r#"<section data-ai-component="hero"><h1>Hi</h1></section>"#;
            let grafted = graft_skeleton(SEED, candidate);

            assert!(grafted.starts_with(r#"<div data-ai-component="hero">"#));
            assert!(grafted.ends_with("</div>"));
            assert!(grafted.contains("<h1>Hi</h1>"));
        }

        #[test]
        fn bare_text_output_gets_wrapped() {
            let grafted = graft_skeleton(SEED, "Just some copy");
            assert_eq!(
                grafted,
                r#"<div data-ai-component="hero">Just some copy</div>"#
            );
        }
    }
}
