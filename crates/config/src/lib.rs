//! Configuration loading, validation, and management for PM OS.
//!
//! Loads configuration from `~/.pmos/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use pmos_core::{AgentLabel, RedirectPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.pmos/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature for agent completions
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Providers tried, in order, when the default provider fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_providers: Vec<String>,

    /// Per-provider timeout inside the fallback chain
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Classification, gating and chain settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Context assembly limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Per-agent overrides keyed by agent label
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,

    /// Session persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Knowledge base retrieval
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Document export
    #[serde(default)]
    pub export: ExportConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_provider_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("fallback_providers", &self.fallback_providers)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("providers", &self.providers)
            .field("router", &self.router)
            .field("context", &self.context)
            .field("agents", &self.agents)
            .field("store", &self.store)
            .field("knowledge", &self.knowledge)
            .field("export", &self.export)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

// ── Router ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Classifications below this confidence are treated as unclear.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    #[serde(default)]
    pub redirect_policy: RedirectPolicy,

    /// Model for intent classification; falls back to `default_model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier_model: Option<String>,

    #[serde(default = "default_classifier_timeout_secs")]
    pub classifier_timeout_secs: u64,

    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,

    /// Named agent chains, e.g. `plan = ["framer", "strategist", "executor"]`.
    #[serde(default = "default_chains")]
    pub chains: HashMap<String, Vec<String>>,
}

fn default_confidence_threshold() -> f32 {
    0.5
}
fn default_classifier_timeout_secs() -> u64 {
    20
}
fn default_agent_timeout_secs() -> u64 {
    90
}
fn default_chains() -> HashMap<String, Vec<String>> {
    let mut chains = HashMap::new();
    chains.insert(
        "plan".to_string(),
        vec!["framer".into(), "strategist".into(), "executor".into()],
    );
    chains.insert(
        "launch".to_string(),
        vec!["executor".into(), "narrator".into()],
    );
    chains
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            redirect_policy: RedirectPolicy::default(),
            classifier_model: None,
            classifier_timeout_secs: default_classifier_timeout_secs(),
            agent_timeout_secs: default_agent_timeout_secs(),
            chains: default_chains(),
        }
    }
}

impl RouterConfig {
    /// Resolve a named chain into agent labels.
    pub fn chain(&self, name: &str) -> Option<Vec<AgentLabel>> {
        self.chains
            .get(name)
            .map(|labels| labels.iter().filter_map(|l| l.parse().ok()).collect())
    }
}

// ── Context ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Turns kept in the digest once the history exceeds the token cap.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Token cap for the turn digest.
    #[serde(default = "default_history_token_cap")]
    pub history_token_cap: usize,

    #[serde(default = "default_recent_decisions")]
    pub recent_decisions: usize,

    #[serde(default = "default_kb_top_k")]
    pub kb_top_k: usize,

    #[serde(default = "default_kb_timeout_secs")]
    pub kb_timeout_secs: u64,
}

fn default_max_turns() -> usize {
    10
}
fn default_history_token_cap() -> usize {
    2000
}
fn default_recent_decisions() -> usize {
    5
}
fn default_kb_top_k() -> usize {
    3
}
fn default_kb_timeout_secs() -> u64 {
    5
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            history_token_cap: default_history_token_cap(),
            recent_decisions: default_recent_decisions(),
            kb_top_k: default_kb_top_k(),
            kb_timeout_secs: default_kb_timeout_secs(),
        }
    }
}

// ── Agents ───────────────────────────────────────────────────────────────

/// Optional per-agent completion overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

// ── Store / knowledge / export ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite", "file" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Database file (sqlite) or directory (file). Defaults under `~/.pmos`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// "keyword" or "none"
    #[serde(default = "default_knowledge_backend")]
    pub backend: String,

    /// JSONL snippet file. Defaults to `~/.pmos/knowledge.jsonl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_knowledge_backend() -> String {
    "keyword".into()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: default_knowledge_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// "file", "webhook" or "none"
    #[serde(default = "default_export_sink")]
    pub sink: String,

    /// Output directory for the file sink. Defaults to `~/.pmos/exports`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default = "default_export_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_export_sink() -> String {
    "file".into()
}
fn default_export_timeout_secs() -> u64 {
    15
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sink: default_export_sink(),
            dir: None,
            webhook_url: None,
            timeout_secs: default_export_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.pmos/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `PMOS_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `ANTHROPIC_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("PMOS_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("PMOS_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("PMOS_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".pmos")
    }

    /// Session store location for the configured backend.
    pub fn store_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(|| match self.store.backend.as_str() {
            "file" => Self::config_dir().join("sessions"),
            _ => Self::config_dir().join("sessions.db"),
        })
    }

    pub fn knowledge_path(&self) -> PathBuf {
        self.knowledge
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("knowledge.jsonl"))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("exports"))
    }

    /// Model used for intent classification.
    pub fn classifier_model(&self) -> &str {
        self.router
            .classifier_model
            .as_deref()
            .unwrap_or(&self.default_model)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let threshold = self.router.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ValidationError(
                "router.confidence_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.router.classifier_timeout_secs == 0 || self.router.agent_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "router timeouts must be greater than 0".into(),
            ));
        }

        if self.context.kb_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "context.kb_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.context.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_turns must be greater than 0".into(),
            ));
        }

        for (name, labels) in &self.router.chains {
            if labels.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "chain '{name}' has no agents"
                )));
            }
            for label in labels {
                match label.parse::<AgentLabel>() {
                    Ok(l) if l.is_agent() => {}
                    _ => {
                        return Err(ConfigError::ValidationError(format!(
                            "chain '{name}' names unknown agent '{label}'"
                        )));
                    }
                }
            }
        }

        for key in self.agents.keys() {
            if !key.parse::<AgentLabel>().is_ok_and(|l| l.is_agent()) {
                return Err(ConfigError::ValidationError(format!(
                    "[agents.{key}] is not a known agent"
                )));
            }
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store backend '{}'",
                self.store.backend
            )));
        }

        if !matches!(self.knowledge.backend.as_str(), "keyword" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown knowledge backend '{}'",
                self.knowledge.backend
            )));
        }

        match self.export.sink.as_str() {
            "file" | "none" => {}
            "webhook" if self.export.webhook_url.is_some() => {}
            "webhook" => {
                return Err(ConfigError::ValidationError(
                    "export.webhook_url is required for the webhook sink".into(),
                ));
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown export sink '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            fallback_providers: Vec::new(),
            provider_timeout_secs: default_provider_timeout_secs(),
            providers: HashMap::new(),
            router: RouterConfig::default(),
            context: ContextConfig::default(),
            agents: HashMap::new(),
            store: StoreConfig::default(),
            knowledge: KnowledgeConfig::default(),
            export: ExportConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.router.confidence_threshold, 0.5);
        assert_eq!(config.router.redirect_policy, RedirectPolicy::AskUser);
        assert_eq!(config.context.max_turns, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.router.chains.len(), 2);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.router.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_knowledge_timeout_rejected() {
        let mut config = AppConfig::default();
        config.context.kb_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("kb_timeout_secs"));
        config.context.kb_timeout_secs = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn chain_with_unknown_agent_rejected() {
        let mut config = AppConfig::default();
        config
            .router
            .chains
            .insert("bad".into(), vec!["framer".into(), "designer".into()]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("designer"));
    }

    #[test]
    fn webhook_sink_requires_url() {
        let mut config = AppConfig::default();
        config.export.sink = "webhook".into();
        assert!(config.validate().is_err());
        config.export.webhook_url = Some("https://example.com/hook".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn load_from_file_parses_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "gpt-4o-mini"
fallback_providers = ["openai"]

[router]
confidence_threshold = 0.6
redirect_policy = "auto_chain"

[router.chains]
discover = ["scout", "framer"]

[agents.strategist]
model = "gpt-4o"
temperature = 0.2

[store]
backend = "file"
path = "/tmp/pmos-sessions"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.router.redirect_policy, RedirectPolicy::AutoChain);
        assert_eq!(
            config.router.chain("discover"),
            Some(vec![AgentLabel::Scout, AgentLabel::Framer])
        );
        assert_eq!(config.agents["strategist"].model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.store_path(), PathBuf::from("/tmp/pmos-sessions"));
        assert_eq!(config.classifier_model(), "gpt-4o-mini");
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "router = 3").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_keys() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("confidence_threshold"));
    }
}
