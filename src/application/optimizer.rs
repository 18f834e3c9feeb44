//! The optimize pipeline: resolve, ingest, aggregate, classify, select,
//! validate, respond.
//!
//! Stages after identity resolution run under the request's soft deadline.
//! Every stage appends an audit entry; failures degrade to serving the
//! author's seed rather than erroring, so the embedding page always gets
//! markup back.

use serde_json::Value;

use crate::domain::behavior::{classify, BehavioralVector, IdentityState, SessionSignals};
use crate::domain::events::{Event, EventName};
use crate::domain::foundation::{
    ComponentId, DomainError, ErrorCode, SessionId, Timestamp, UserId,
};
use crate::domain::tenant::Business;
use crate::domain::variants::{GuardrailVerdict, SlotLabel, VariantKey, VariantRecord};
use crate::ports::{EventStore, SessionSnapshot, UserStore, VariantStore};

use super::audit::AuditLog;
use super::identity_resolver::resolve_user;
use super::services::{EngineMode, Services};

/// How much of the seed markup the synthetic view event retains.
const CONTEXT_HTML_SNIPPET_LEN: usize = 500;

/// Trial-increment attempts before serving without recording.
const TRIAL_CAS_ATTEMPTS: u32 = 2;

/// One optimize request, after DTO decoding.
#[derive(Debug, Clone)]
pub struct OptimizeCommand {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub global_uid: Option<String>,
    pub component_id: String,
    pub changing_html: String,
    pub context_html: Option<String>,
}

/// The selected variant plus everything the client renders and reports.
#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub variant: SlotLabel,
    pub changing_html: String,
    pub identity_state: IdentityState,
    pub confidence: f64,
    pub behavioral_vector: BehavioralVector,
    pub audit_log: AuditLog,
    pub mode: EngineMode,
}

/// Runs the optimize pipeline for one request.
pub async fn optimize(
    services: &Services,
    business: &Business,
    command: OptimizeCommand,
) -> Result<OptimizeOutcome, DomainError> {
    if command.changing_html.is_empty() {
        return Err(DomainError::validation("changingHtml", "markup is required"));
    }
    if command.changing_html.len() > services.guardrail.max_bytes {
        return Err(DomainError::validation(
            "changingHtml",
            format!(
                "markup exceeds the {} byte bound",
                services.guardrail.max_bytes
            ),
        ));
    }
    let component_id = ComponentId::new(command.component_id.clone())?;

    let mut audit = AuditLog::new();

    let resolved = resolve_user(
        command.user_id.clone(),
        command.session_id.clone(),
        command.global_uid.clone(),
    )?;
    audit.record(
        "identity_resolver",
        format!(
            "resolved user {} (minted: {})",
            resolved.user_id, resolved.minted_user
        ),
    );

    // Synthetic view event; read back by the aggregation below.
    let mut cut = CONTEXT_HTML_SNIPPET_LEN.min(command.changing_html.len());
    while !command.changing_html.is_char_boundary(cut) {
        cut -= 1;
    }
    let snippet = command.changing_html[..cut].to_string();
    let view_event = Event::new(
        business.business_id.clone(),
        resolved.user_id.clone(),
        resolved.session_id.clone(),
        EventName::ComponentViewed,
        Timestamp::now(),
    )
    .with_component(component_id.clone())
    .with_global_uid(resolved.global_uid.clone())
    .with_property("original_html", Value::String(snippet));

    match services.ingestor.record_context_event(view_event).await {
        Ok(()) => audit.record("event_ingestor", "recorded component_viewed"),
        Err(e) => audit.record(
            "event_ingestor",
            format!("context event dropped: {e}; continuing"),
        ),
    }

    let key = VariantKey::new(
        business.business_id.clone(),
        resolved.user_id.clone(),
        component_id,
    );
    let policy = services.selection_for(business.tier);

    let timed = tokio::time::timeout(
        services.request_deadline,
        select_under_deadline(services, policy, &key, &command.changing_html, &mut audit),
    )
    .await;

    let (variant, changing_html, vector, classification) = match timed {
        Ok(Ok(selection)) => selection,
        Ok(Err(e)) if e.code == ErrorCode::StorageUnavailable => {
            // Visible-but-safe degradation: the seed goes out as-is.
            audit.record("degraded", format!("storage unavailable: {e}"));
            return Ok(degraded_outcome(services, resolved.user_id, resolved.session_id, command, audit));
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            audit.record(
                "deadline_exceeded",
                format!(
                    "selection exceeded {}ms; serving seed",
                    services.request_deadline.as_millis()
                ),
            );
            return Ok(degraded_outcome(services, resolved.user_id, resolved.session_id, command, audit));
        }
    };

    // Preview snapshot for the admin surfaces; never blocks the response.
    let snapshot = SessionSnapshot {
        session_id: resolved.session_id.clone(),
        identity_state: classification.state,
        identity_confidence: classification.confidence,
        behavioral_vector: vector,
        observed_at: Timestamp::now(),
    };
    if let Err(e) = services
        .users
        .upsert_snapshot(
            &business.business_id,
            &resolved.user_id,
            snapshot,
            Some(changing_html.clone()),
        )
        .await
    {
        tracing::warn!(error = %e, "failed to persist user snapshot");
    }

    Ok(OptimizeOutcome {
        user_id: resolved.user_id,
        session_id: resolved.session_id,
        variant,
        changing_html,
        identity_state: classification.state,
        confidence: classification.confidence,
        behavioral_vector: vector,
        audit_log: audit,
        mode: services.mode,
    })
}

/// Aggregation through guardrail: the deadline-bounded span.
async fn select_under_deadline(
    services: &Services,
    policy: crate::domain::variants::SelectionPolicy,
    key: &VariantKey,
    seed_html: &str,
    audit: &mut AuditLog,
) -> Result<
    (
        SlotLabel,
        String,
        BehavioralVector,
        crate::domain::behavior::Classification,
    ),
    DomainError,
> {
    let events = services
        .events
        .recent(
            &key.business_id,
            &key.user_id,
            services.window.max_events,
            services.window.max_age_secs,
        )
        .await?;

    let vector = BehavioralVector::from_events(&events, Timestamp::now(), services.window);
    audit.record(
        "analytics",
        format!(
            "vector from {} events: exploration={:.2} hesitation={:.2} engagement={:.2} velocity={:.2} focus={:.2}",
            events.len(),
            vector.exploration_score,
            vector.hesitation_score,
            vector.engagement_depth,
            vector.decision_velocity,
            vector.content_focus_ratio,
        ),
    );

    let signals = SessionSignals::from_events(&events);
    let classification = classify(&vector, &signals);
    audit.record(
        "identity",
        format!(
            "classified as {} (confidence {:.2})",
            classification.state, classification.confidence
        ),
    );

    let record = services.variants.get_or_init(key, seed_html).await?;

    let roll: f64 = rand::random();
    let chosen = policy.select(&record, roll);
    let explored = roll < policy.epsilon;
    audit.record(
        "decision",
        format!(
            "selected slot {} ({}; A: {:.2}/{} trials, B: {:.2}/{} trials)",
            chosen,
            if explored { "explore" } else { "exploit" },
            record.slot_a.current_score,
            record.slot_a.number_of_trials,
            record.slot_b.current_score,
            record.slot_b.number_of_trials,
        ),
    );

    // Guardrail: a rejected slot falls back to the other, then the seed.
    // Only an approved slot counts a trial; substitutions do not.
    let (label, trial_slot, html) = match services
        .guardrail
        .validate(seed_html, &record.slot(chosen).current_html)
    {
        GuardrailVerdict::Approve => {
            audit.record("guardrail", format!("slot {chosen} approved"));
            (
                chosen,
                Some(chosen),
                record.slot(chosen).current_html.clone(),
            )
        }
        GuardrailVerdict::Reject { reasons } => {
            audit.record(
                "guardrail",
                format!("slot {chosen} rejected: {}", reasons.join("; ")),
            );
            let other = chosen.other();
            match services
                .guardrail
                .validate(seed_html, &record.slot(other).current_html)
            {
                GuardrailVerdict::Approve => {
                    audit.record("guardrail", format!("substituted slot {other}"));
                    (other, None, record.slot(other).current_html.clone())
                }
                GuardrailVerdict::Reject { .. } => {
                    audit.record("guardrail", "both slots rejected; serving seed");
                    (chosen, None, seed_html.to_string())
                }
            }
        }
    };

    if let Some(slot) = trial_slot {
        record_trial(services, key, &record, slot, audit).await?;
    }

    Ok((label, html, vector, classification))
}

/// Counts the served trial with optimistic concurrency: reload and retry
/// once on conflict, then serve without recording.
async fn record_trial(
    services: &Services,
    key: &VariantKey,
    record: &VariantRecord,
    slot: SlotLabel,
    audit: &mut AuditLog,
) -> Result<(), DomainError> {
    let mut current = record.clone();

    for attempt in 1..=TRIAL_CAS_ATTEMPTS {
        let live = current.slot(slot);
        let outcome = services
            .variants
            .update_slot(
                key,
                slot,
                live.version(),
                live.current_score,
                live.number_of_trials + 1,
            )
            .await?;

        match outcome {
            crate::ports::CasOutcome::Committed => return Ok(()),
            crate::ports::CasOutcome::Conflict { current: newer } => {
                if attempt == TRIAL_CAS_ATTEMPTS {
                    audit.record("decision", "trial not recorded: concurrent update");
                    return Ok(());
                }
                current = newer;
            }
        }
    }
    Ok(())
}

fn degraded_outcome(
    services: &Services,
    user_id: UserId,
    session_id: SessionId,
    command: OptimizeCommand,
    audit: AuditLog,
) -> OptimizeOutcome {
    OptimizeOutcome {
        user_id,
        session_id,
        variant: SlotLabel::A,
        changing_html: command.changing_html,
        identity_state: IdentityState::Exploratory,
        confidence: 0.5,
        behavioral_vector: BehavioralVector::neutral(),
        audit_log: audit,
        mode: services.mode,
    }
}
