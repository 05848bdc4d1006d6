use std::sync::Arc;
use std::time::Duration;

use amanah_agent::{provider_from_config, AgentRuntime, ConversationService, GuardrailPolicy};
use amanah_agent::{LlmProvider, ProviderError};
use amanah_channel::{gateway_from_config, GatewayError, MessagingGateway};
use amanah_core::commerce::Commerce;
use amanah_core::config::{AppConfig, CommerceConfig, ConfigError, LoadOptions};
use amanah_core::dedup::DedupGuard;
use amanah_core::flows::{FlowEngine, FlowSettings};
use amanah_core::nisab::{GoldPriceSource, HttpGoldPriceFeed, NisabCalculator};
use amanah_core::session::SessionStore;
use amanah_db::{InMemoryCommerce, SeedError};
use thiserror::Error;
use tracing::info;

const GOLD_FEED_TIMEOUT_SECS: u64 = 10;

pub struct Application {
    pub config: AppConfig,
    pub service: Arc<ConversationService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("demo catalog could not be loaded: {0}")]
    Seed(#[from] SeedError),
    #[error("llm provider could not be configured: {0}")]
    Provider(#[from] ProviderError),
    #[error("messaging gateway could not be configured: {0}")]
    Gateway(#[from] GatewayError),
    #[error("system prompt template is invalid: {0}")]
    Prompt(#[from] tera::Error),
    #[error("gold price client could not be built: {0}")]
    GoldFeed(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let (store, seeded) = InMemoryCommerce::demo().await?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        campaigns = seeded.campaigns,
        zakat_programs = seeded.zakat_programs,
        "demo catalog loaded into the in-memory facades"
    );

    let provider = provider_from_config(&config.llm)?;
    let gateway = gateway_from_config(&config.gateway)?;
    let gold_feed = gold_price_feed(&config.commerce)?;
    let service = assemble(&config, store.commerce(), provider, gateway, gold_feed)?;

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "conversation pipeline assembled"
    );
    Ok(Application { config, service })
}

/// Wires the conversation pipeline over already-built collaborators.
pub fn assemble(
    config: &AppConfig,
    commerce: Commerce,
    provider: Arc<dyn LlmProvider>,
    gateway: Arc<dyn MessagingGateway>,
    gold_feed: Option<Arc<dyn GoldPriceSource>>,
) -> Result<Arc<ConversationService>, BootstrapError> {
    let conversation = &config.conversation;
    let nisab = Arc::new(NisabCalculator::from_config(&config.commerce, gold_feed));
    let engine = FlowEngine::new(commerce, FlowSettings::from(&config.commerce), nisab);
    let agent = AgentRuntime::new(
        provider,
        engine.clone(),
        GuardrailPolicy::default(),
        conversation.max_tool_rounds,
    )?;
    let sessions = Arc::new(SessionStore::new(
        Duration::from_secs(conversation.session_idle_ttl_secs),
        conversation.history_limit,
    ));
    let dedup = Arc::new(DedupGuard::new(Duration::from_secs(conversation.dedup_ttl_secs)));

    Ok(Arc::new(ConversationService::new(sessions, dedup, engine, agent, gateway)))
}

fn gold_price_feed(
    config: &CommerceConfig,
) -> Result<Option<Arc<dyn GoldPriceSource>>, BootstrapError> {
    let Some(url) = config.gold_price_url.as_deref().filter(|url| !url.trim().is_empty()) else {
        return Ok(None);
    };
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(GOLD_FEED_TIMEOUT_SECS))
        .build()
        .map_err(BootstrapError::GoldFeed)?;
    Ok(Some(Arc::new(HttpGoldPriceFeed::new(client, url, config.gold_price_json_pointer.clone()))))
}
