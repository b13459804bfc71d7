//! Provider router: selects the correct LLM provider based on config.
//!
//! Handles provider creation and assembles the primary/fallback chain that
//! the classifier and agents share.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pmos_config::AppConfig;
use pmos_core::provider::Provider;
use tracing::{info, warn};

use crate::anthropic::AnthropicProvider;
use crate::fallback::FallbackProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// The provider used for every completion: the default provider, wrapped
    /// in a [`FallbackProvider`] when fallbacks are configured.
    ///
    /// Fallback entries are `"provider"` or `"provider:model"`.
    pub fn completion_provider(
        &self,
        fallbacks: &[String],
        timeout: Duration,
    ) -> Option<Arc<dyn Provider>> {
        let primary = self.default()?;
        if fallbacks.is_empty() {
            return Some(primary);
        }

        let mut chain = FallbackProvider::new(format!("{}+fallback", self.default_provider))
            .add(primary, timeout);

        for entry in fallbacks {
            let (name, model) = match entry.split_once(':') {
                Some((name, model)) => (name, Some(model)),
                None => (entry.as_str(), None),
            };
            match (self.get(name), model) {
                (Some(p), Some(model)) => chain = chain.add_with_model(p, model, timeout),
                (Some(p), None) => chain = chain.add(p, timeout),
                (None, _) => warn!(provider = %name, "Fallback provider not registered, skipping"),
            }
        }

        info!(providers = chain.len(), "Provider fallback chain ready");
        Some(Arc::new(chain))
    }
}

fn build_provider(name: &str, api_key: &str, api_url: Option<&str>) -> Arc<dyn Provider> {
    if name == "anthropic" {
        let mut p = AnthropicProvider::new(api_key);
        if let Some(url) = api_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = api_url
            .map(str::to_string)
            .unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        router.register(
            name.clone(),
            build_provider(name, &api_key, provider_config.api_url.as_deref()),
        );
    }

    // Ensure the default provider and every fallback exist even if not
    // explicitly configured.
    let implicit = std::iter::once(config.default_provider.as_str()).chain(
        config
            .fallback_providers
            .iter()
            .map(|f| f.split_once(':').map_or(f.as_str(), |(name, _)| name)),
    );
    for name in implicit {
        if router.get(name).is_none() {
            let api_key = config.api_key.clone().unwrap_or_default();
            router.register(name.to_string(), build_provider(name, &api_key, None));
        }
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "anthropic" => "https://api.anthropic.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openrouter");
        router.register("openrouter", Arc::new(OpenAiCompatProvider::openrouter("sk-test")));

        assert!(router.get("openrouter").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        let provider = router
            .completion_provider(&config.fallback_providers, Duration::from_secs(5))
            .unwrap();
        assert_eq!(provider.name(), "openrouter");
    }

    #[test]
    fn fallbacks_are_registered_and_chained() {
        let config = AppConfig {
            fallback_providers: vec!["openai:gpt-4o-mini".into(), "groq".into()],
            ..AppConfig::default()
        };
        let router = build_from_config(&config);
        assert!(router.get("openai").is_some());
        assert!(router.get("groq").is_some());

        let provider = router
            .completion_provider(&config.fallback_providers, Duration::from_secs(5))
            .unwrap();
        assert_eq!(provider.name(), "openrouter+fallback");
    }

    #[test]
    fn anthropic_gets_native_provider() {
        let config = AppConfig {
            default_provider: "anthropic".into(),
            ..AppConfig::default()
        };
        let router = build_from_config(&config);
        assert_eq!(router.default().unwrap().name(), "anthropic");
    }
}
