//! Clarification capability: the answer for `unclear` requests.

use async_trait::async_trait;
use pmos_core::agent::{AgentCapability, AgentLabel, AgentRequest, AgentResult};
use pmos_core::error::AgentError;

use crate::profile::AgentProfile;

/// Asks the user to rephrase or pick an agent. Never produces artifacts or
/// decisions and never calls a model.
pub struct ClarifyAgent {
    text: String,
}

impl ClarifyAgent {
    pub fn new() -> Self {
        let mut text = String::from(
            "I'm not sure which part of the product workflow this is about. \
             Could you rephrase, or pick an agent explicitly?\n",
        );
        for profile in AgentProfile::all() {
            text.push_str(&format!("\n- **{}**: {}", profile.label, profile.description));
        }
        Self { text }
    }
}

impl Default for ClarifyAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentCapability for ClarifyAgent {
    fn label(&self) -> AgentLabel {
        AgentLabel::Unclear
    }

    fn description(&self) -> &str {
        "Asks the user to rephrase or choose an agent"
    }

    async fn invoke(&self, _request: AgentRequest) -> Result<AgentResult, AgentError> {
        Ok(AgentResult::text(self.text.clone()))
    }
}
