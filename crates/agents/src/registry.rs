//! Agent registry: static label → capability mapping built at startup.

use std::collections::HashMap;
use std::sync::Arc;

use pmos_config::AppConfig;
use pmos_core::agent::{AgentCapability, AgentLabel};
use pmos_core::provider::Provider;
use tracing::info;

use crate::clarify::ClarifyAgent;
use crate::llm::LlmAgent;
use crate::profile::AgentProfile;

pub struct AgentRegistry {
    agents: HashMap<AgentLabel, Arc<dyn AgentCapability>>,
    clarify: Arc<dyn AgentCapability>,
}

impl AgentRegistry {
    /// An empty registry. Every label resolves to the clarification capability
    /// until registered.
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            clarify: Arc::new(ClarifyAgent::new()),
        }
    }

    /// All six LLM agents backed by `provider`.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Self {
        let mut registry = Self::new();
        for profile in AgentProfile::all() {
            registry.register(Arc::new(LlmAgent::from_config(profile, provider.clone(), config)));
        }
        info!(agents = registry.agents.len(), provider = %provider.name(), "Agent registry ready");
        registry
    }

    /// Register a capability under its own label. Replaces any existing one.
    /// Registering for `unclear` replaces the clarification capability.
    pub fn register(&mut self, agent: Arc<dyn AgentCapability>) {
        match agent.label() {
            AgentLabel::Unclear => self.clarify = agent,
            label => {
                self.agents.insert(label, agent);
            }
        }
    }

    /// Never fails: unknown and `unclear` labels get the clarification capability.
    pub fn resolve(&self, label: AgentLabel) -> Arc<dyn AgentCapability> {
        self.agents
            .get(&label)
            .cloned()
            .unwrap_or_else(|| self.clarify.clone())
    }

    pub fn contains(&self, label: AgentLabel) -> bool {
        self.agents.contains_key(&label)
    }

    /// `(label, description)` for every registered agent, in canonical order.
    pub fn descriptions(&self) -> Vec<(AgentLabel, String)> {
        AgentLabel::AGENTS
            .into_iter()
            .filter_map(|label| {
                self.agents
                    .get(&label)
                    .map(|a| (label, a.description().to_string()))
            })
            .collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
