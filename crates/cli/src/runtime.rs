//! Wiring: turns an `AppConfig` into a ready `SessionService`.

use std::sync::Arc;
use std::time::Duration;

use pmos_agents::AgentRegistry;
use pmos_config::AppConfig;
use pmos_core::error::StoreError;
use pmos_core::knowledge::KnowledgeBase;
use pmos_core::store::SessionStore;
use pmos_router::{
    ContextAssembler, ContextLimits, IntentClassifier, Router, RouterSettings, SequenceExecutor,
    SessionService,
};
use pmos_store::{FileSessionStore, InMemorySessionStore, KeywordKnowledgeBase, NoKnowledgeBase, SqliteSessionStore};
use tracing::info;

pub type BoxError = Box<dyn std::error::Error>;

pub fn load_config() -> Result<AppConfig, BoxError> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Fail early with setup instructions when no API key is available.
pub fn require_api_key(config: &AppConfig) -> Result<(), BoxError> {
    if config.has_api_key() {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
    eprintln!("    OPENAI_API_KEY=sk-...");
    eprintln!("    ANTHROPIC_API_KEY=sk-ant-...");
    eprintln!("    PMOS_API_KEY=...                  (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>, StoreError> {
    let store: Arc<dyn SessionStore> = match config.store.backend.as_str() {
        "memory" => Arc::new(InMemorySessionStore::new()),
        "file" => Arc::new(FileSessionStore::new(config.store_path())),
        _ => {
            let path = config.store_path();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Io(e.to_string()))?;
            }
            Arc::new(SqliteSessionStore::new(&path.display().to_string()).await?)
        }
    };
    info!(store = %store.name(), "Session store ready");
    Ok(store)
}

pub fn build_knowledge(config: &AppConfig) -> Arc<dyn KnowledgeBase> {
    match config.knowledge.backend.as_str() {
        "keyword" => Arc::new(KeywordKnowledgeBase::load(&config.knowledge_path())),
        _ => Arc::new(NoKnowledgeBase),
    }
}

/// Build the router from config around an existing store.
pub fn build_router(config: &AppConfig) -> Result<Router, BoxError> {
    let providers = pmos_providers::build_from_config(config);
    let provider = providers
        .completion_provider(
            &config.fallback_providers,
            Duration::from_secs(config.provider_timeout_secs),
        )
        .ok_or("No default provider configured")?;

    let registry = AgentRegistry::from_config(config, provider.clone());
    let mut router = Router::new(
        ContextAssembler::new(build_knowledge(config), ContextLimits::from(&config.context)),
        IntentClassifier::new(
            provider,
            config.classifier_model(),
            Duration::from_secs(config.router.classifier_timeout_secs),
        ),
        SequenceExecutor::new(
            Arc::new(registry),
            Duration::from_secs(config.router.agent_timeout_secs),
        ),
        RouterSettings::from(&config.router),
    );
    if let Some(sink) = pmos_export::build_from_config(config) {
        router = router.with_export_sink(sink);
    }
    Ok(router)
}

pub async fn build_service(config: &AppConfig) -> Result<SessionService, BoxError> {
    let store = build_store(config).await?;
    Ok(SessionService::new(build_router(config)?, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmos_core::session::{Session, SessionId};

    #[tokio::test]
    async fn builds_each_store_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();

        config.store.backend = "memory".into();
        assert_eq!(build_store(&config).await.unwrap().name(), "memory");

        config.store.backend = "file".into();
        config.store.path = Some(dir.path().join("sessions"));
        assert_eq!(build_store(&config).await.unwrap().name(), "file");

        config.store.backend = "sqlite".into();
        config.store.path = Some(dir.path().join("nested").join("sessions.db"));
        let store = build_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        store.save(&Session::new(SessionId::from("s-1"))).await.unwrap();
        assert!(dir.path().join("nested").join("sessions.db").exists());
    }

    #[test]
    fn missing_knowledge_file_is_empty_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.knowledge.path = Some(dir.path().join("absent.jsonl"));
        assert_eq!(build_knowledge(&config).name(), "keyword");

        config.knowledge.backend = "none".into();
        assert_eq!(build_knowledge(&config).name(), "none");
    }

    #[test]
    fn router_builds_without_network() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".into());
        config.export.sink = "none".into();
        let router = build_router(&config).unwrap();
        assert_eq!(router.settings().confidence_threshold, 0.5);
    }
}
