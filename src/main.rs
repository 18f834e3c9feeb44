//! Service entrypoint: configuration, store selection, capability check,
//! and the HTTP listener.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use uplift::adapters::ai::{AnthropicConfig, AnthropicProvider, MockProvider};
use uplift::adapters::http::{router, AppState};
use uplift::adapters::memory::{
    InMemoryAgreementStore, InMemoryBusinessStore, InMemoryEventStore, InMemoryGlobalUserStore,
    InMemoryUserStore, InMemoryVariantStore,
};
use uplift::adapters::postgres::{
    self, PostgresAgreementStore, PostgresBusinessStore, PostgresEventStore,
    PostgresGlobalUserStore, PostgresUserStore, PostgresVariantStore,
};
use uplift::adapters::rate_limiter::TokenBucketLimiter;
use uplift::application::{EngineMode, Services, Stores};
use uplift::config::AppConfig;
use uplift::ports::AiProvider;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uplift=info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let stores = if config.storage.is_durable() {
        let pool = postgres::connect(&config.storage).await?;
        tracing::info!("connected to postgres storage");
        Stores {
            businesses: Arc::new(PostgresBusinessStore::new(pool.clone())),
            events: Arc::new(PostgresEventStore::new(pool.clone())),
            users: Arc::new(PostgresUserStore::new(pool.clone())),
            variants: Arc::new(PostgresVariantStore::new(pool.clone())),
            global_users: Arc::new(PostgresGlobalUserStore::new(pool.clone())),
            agreements: Arc::new(PostgresAgreementStore::new(pool)),
        }
    } else {
        tracing::warn!("STORAGE_URI not set; using in-memory stores");
        Stores {
            businesses: Arc::new(InMemoryBusinessStore::new()),
            events: Arc::new(InMemoryEventStore::new()),
            users: Arc::new(InMemoryUserStore::new()),
            variants: Arc::new(InMemoryVariantStore::new()),
            global_users: Arc::new(InMemoryGlobalUserStore::new()),
            agreements: Arc::new(InMemoryAgreementStore::new()),
        }
    };

    // Capability check: a provider key selects multi-agent mode, its
    // absence selects the stub provider. Decided once, reported by the
    // health endpoint.
    let (ai, mode): (Arc<dyn AiProvider>, EngineMode) = match &config.ai.api_key {
        Some(key) if !key.is_empty() => {
            let provider_config = AnthropicConfig::new(key.clone())
                .with_model(config.ai.model.clone())
                .with_base_url(config.ai.base_url.clone())
                .with_timeout(Duration::from_secs(config.ai.regeneration_deadline_secs));
            (
                Arc::new(AnthropicProvider::new(provider_config)),
                EngineMode::MultiAgent,
            )
        }
        _ => {
            tracing::warn!("LLM_API_KEY not set; regeneration runs in stub mode");
            (Arc::new(MockProvider::new()), EngineMode::Stub)
        }
    };

    let hf_limiter = Arc::new(TokenBucketLimiter::new(
        config.limits.high_frequency_per_second,
        config.limits.high_frequency_per_second * 2,
    ));
    let services = Services::build(&config, stores, ai, hf_limiter, mode);

    let edge_limiter = Arc::new(TokenBucketLimiter::new(
        config.limits.requests_per_second,
        config.limits.burst,
    ));
    let state = AppState::new(services, edge_limiter);

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, mode = mode.as_str(), "uplift listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
