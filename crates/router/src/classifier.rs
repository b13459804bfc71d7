//! Intent classifier. Maps a user message to exactly one agent label.
//!
//! One JSON completion per call. Anything that goes wrong (provider error,
//! timeout, malformed output, a label outside the closed set) degrades to
//! `unclear` with zero confidence instead of failing the turn.

use std::sync::Arc;
use std::time::Duration;

use pmos_agents::AgentProfile;
use pmos_agents::llm::extract_json;
use pmos_core::agent::{AgentLabel, ClassificationResult};
use pmos_core::context::{ContextPayload, preview};
use pmos_core::message::Message;
use pmos_core::provider::{Provider, ProviderRequest};
use serde_json::Value;
use tracing::{debug, warn};

/// Used when the model omits a confidence value.
const DEFAULT_CONFIDENCE: f32 = 0.5;

pub struct IntentClassifier {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
    system_prompt: String,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
            system_prompt: build_system_prompt(),
        }
    }

    pub async fn classify(&self, message: &str, context: &ContextPayload) -> ClassificationResult {
        let message = message.trim();
        if message.is_empty() {
            return ClassificationResult::unclear("empty message");
        }

        let request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(self.system_prompt.clone()),
                Message::user(format!("{}\n\n[Query]\n{message}", context.render())),
            ],
        )
        .with_temperature(0.0)
        .with_max_tokens(256)
        .json();

        let raw = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => response.message.content,
            Ok(Err(e)) => {
                warn!(provider = %self.provider.name(), error = %e, "Classification failed, treating as unclear");
                return ClassificationResult::unclear(format!("classifier error: {e}"));
            }
            Err(_) => {
                warn!(
                    provider = %self.provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Classification timed out, treating as unclear"
                );
                return ClassificationResult::unclear("classifier timed out");
            }
        };

        let result = parse_classification(&raw);
        debug!(label = %result.label, confidence = result.confidence, "Message classified");
        result
    }
}

fn build_system_prompt() -> String {
    let mut prompt = String::from(
        "You are the intent classifier for a product-management assistant. Decide which \
         agent the user is asking for.\n\nAgents:\n",
    );
    for profile in AgentProfile::all() {
        prompt.push_str(&format!("- {}: {}\n", profile.label, profile.description));
    }
    prompt.push_str(
        "\nRules:\n\
         1. Classify by what the user is asking for, not by what they should do next.\n\
         2. A problem that has not been diagnosed yet (metrics dropping, \"why is\") leans framer.\n\
         3. If the request is not about product work at all, answer \"none\".\n\n\
         Respond with JSON only:\n\
         {\"intent\": \"<agent or none>\", \"confidence\": <0.0-1.0>, \"reasoning\": \"<one sentence>\"}",
    );
    prompt
}

/// Coerce raw classifier output into a result.
pub fn parse_classification(raw: &str) -> ClassificationResult {
    let Some(value) = extract_json(raw) else {
        warn!(output = %preview(raw, 120), "Classifier returned non-JSON output");
        return ClassificationResult::unclear("malformed classifier output");
    };

    let intent = ["intent", "agent", "label"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or_default();

    let label = match intent.parse::<AgentLabel>() {
        Ok(AgentLabel::Unclear) => return ClassificationResult::unclear(format!("classifier answered '{intent}'")),
        Ok(label) => label,
        Err(_) => {
            warn!(intent = %intent, "Classifier label outside the agent set");
            return ClassificationResult::unclear(format!("unknown intent '{intent}'"));
        }
    };

    let confidence = match value.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().map_or(0.0, |f| f as f32),
        Some(Value::String(s)) => s.trim().parse::<f32>().unwrap_or(0.0),
        _ => DEFAULT_CONFIDENCE,
    };
    let rationale = value
        .get("reasoning")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    ClassificationResult::new(label, confidence, rationale)
}
