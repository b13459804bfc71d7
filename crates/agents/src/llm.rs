//! LLM-backed agent: one completion per invocation, JSON envelope out.
//!
//! The model is asked for:
//!
//! ```json
//! {
//!   "rendering": "markdown answer for the user",
//!   "artifact": { ... } | null,
//!   "decisions": [{"description": "...", "impact": 8, "effort": 3, "confidence": 0.7, "context": "..."}],
//!   "exports": [{"kind": "prd", "title": "...", "content": "..."}],
//!   "clarifying_questions": ["..."]
//! }
//! ```
//!
//! Output that is not JSON becomes a plain rendering with nothing else.
//! Clarifying questions mean the agent could not do its job yet; the result
//! then carries only the rendering and the questions.

use std::sync::Arc;

use async_trait::async_trait;
use pmos_config::AppConfig;
use pmos_core::agent::{AgentCapability, AgentLabel, AgentRequest, AgentResult};
use pmos_core::context::preview;
use pmos_core::error::AgentError;
use pmos_core::export::{ExportKind, ExportRequest};
use pmos_core::message::Message;
use pmos_core::provider::{Provider, ProviderRequest};
use pmos_core::session::{Artifact, Decision};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::profile::AgentProfile;

pub struct LlmAgent {
    profile: AgentProfile,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmAgent {
    pub fn new(profile: AgentProfile, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            profile,
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    /// Build with the global defaults and any `[agents.<name>]` overrides.
    pub fn from_config(profile: AgentProfile, provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let overrides = config.agents.get(profile.label.as_str());
        Self {
            profile,
            provider,
            model: overrides
                .and_then(|o| o.model.clone())
                .unwrap_or_else(|| config.default_model.clone()),
            temperature: overrides
                .and_then(|o| o.temperature)
                .unwrap_or(config.default_temperature),
            max_tokens: overrides
                .and_then(|o| o.max_tokens)
                .unwrap_or(config.default_max_tokens),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!("{}\n\n", self.profile.persona);
        prompt.push_str(
            "Respond with a single JSON object and nothing else. Fields:\n\
             - \"rendering\": your full answer for the user, in markdown.\n",
        );
        match self.profile.artifact {
            Some(kind) => prompt.push_str(&format!(
                "- \"artifact\": {} as a JSON object with a \"summary\" field, or null if you \
                 cannot produce one yet.\n",
                kind.describe()
            )),
            None => prompt.push_str("- \"artifact\": always null.\n"),
        }
        prompt.push_str(
            "- \"decisions\": product decisions you are making, each \
             {\"description\", \"impact\", \"effort\", \"confidence\", \"context\"}; may be empty.\n",
        );
        prompt.push_str(
            "- \"clarifying_questions\": only when the request lacks the detail you need to do \
             your job at all; otherwise an empty list. When you ask, leave artifact null.\n",
        );
        if self.profile.exports.is_empty() {
            prompt.push_str("- \"exports\": always an empty list.\n");
        } else {
            let kinds: Vec<&str> = self.profile.exports.iter().map(|k| k.as_str()).collect();
            prompt.push_str(&format!(
                "- \"exports\": documents to export only when the user asks for them, each \
                 {{\"kind\", \"title\", \"content\"}} with kind one of: {}.\n",
                kinds.join(", ")
            ));
        }
        prompt
    }

    fn user_prompt(request: &AgentRequest) -> String {
        format!("{}\n\n[Request]\n{}", request.context.render(), request.message)
    }

    fn build_result(&self, raw: &str, message: &str) -> AgentResult {
        let label = self.profile.label;
        let Some(Value::Object(mut envelope)) = extract_json(raw) else {
            debug!(agent = %label, "Agent output is not a JSON envelope, using it as plain text");
            return AgentResult::text(raw.trim());
        };

        let rendering = match envelope.remove("rendering") {
            Some(Value::String(text)) => text,
            _ => String::new(),
        };

        let questions: Vec<String> = entries(&mut envelope, "clarifying_questions")
            .into_iter()
            .filter_map(|q| match q {
                Value::String(q) if !q.trim().is_empty() => Some(q.trim().to_string()),
                _ => None,
            })
            .collect();
        if !questions.is_empty() {
            debug!(agent = %label, questions = questions.len(), "Agent needs clarification");
            let rendering = if rendering.trim().is_empty() {
                "I need a bit more detail before I can help with this.".to_string()
            } else {
                rendering
            };
            return AgentResult {
                rendering,
                clarifying_questions: questions,
                ..Default::default()
            };
        }

        let artifact = match (self.profile.artifact, envelope.remove("artifact")) {
            (_, None | Some(Value::Null)) => None,
            (Some(kind), Some(value)) => Some(Artifact::new(kind, value, label)),
            (None, Some(_)) => {
                warn!(agent = %label, "Agent returned an artifact it does not produce; ignoring");
                None
            }
        };

        let mut decisions: Vec<Decision> = entries(&mut envelope, "decisions")
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<DecisionDraft>(entry) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!(agent = %label, error = %e, "Skipping malformed decision");
                    None
                }
            })
            .filter(|d| !d.description.trim().is_empty())
            .map(|d| Decision {
                impact: score(&d.impact),
                effort: score(&d.effort),
                confidence: score(&d.confidence),
                context: d.context,
                query: message.to_string(),
                ..Decision::new(label, d.description.trim())
            })
            .collect();

        if decisions.is_empty() && self.profile.records_decision {
            if let Some(artifact) = &artifact {
                let mut synthesized = Decision::new(label, artifact.summary());
                synthesized.query = message.to_string();
                decisions.push(synthesized);
            }
        }

        let exports: Vec<ExportRequest> = entries(&mut envelope, "exports")
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<ExportDraft>(entry) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!(agent = %label, error = %e, "Skipping malformed export request");
                    None
                }
            })
            .filter(|e| {
                let allowed = self.profile.may_export(e.kind);
                if !allowed {
                    warn!(agent = %label, kind = %e.kind, "Agent requested an export it may not produce");
                }
                allowed
            })
            .map(|e| ExportRequest {
                kind: e.kind,
                title: e
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| preview(message, 60)),
                payload: match e.content {
                    Value::Null => artifact
                        .as_ref()
                        .map(|a| a.value.clone())
                        .unwrap_or_else(|| Value::String(rendering.clone())),
                    content => content,
                },
            })
            .collect();

        let rendering = if rendering.trim().is_empty() {
            artifact.as_ref().map(Artifact::summary).unwrap_or_default()
        } else {
            rendering
        };

        AgentResult {
            rendering,
            artifacts: artifact.into_iter().collect(),
            decisions,
            exports,
            clarifying_questions: Vec::new(),
        }
    }
}

#[async_trait]
impl AgentCapability for LlmAgent {
    fn label(&self) -> AgentLabel {
        self.profile.label
    }

    fn description(&self) -> &str {
        self.profile.description
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentResult, AgentError> {
        let label = self.profile.label;
        let provider_request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(self.system_prompt()),
                Message::user(Self::user_prompt(&request)),
            ],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .json();

        debug!(agent = %label, model = %self.model, provider = %self.provider.name(), "Invoking agent");

        let response = self
            .provider
            .complete(provider_request)
            .await
            .map_err(|source| AgentError::Completion {
                agent: label.to_string(),
                source,
            })?;

        let raw = response.message.content;
        if raw.trim().is_empty() {
            return Err(AgentError::InvalidOutput {
                agent: label.to_string(),
                reason: "empty completion".into(),
            });
        }

        Ok(self.build_result(&raw, &request.message))
    }
}

// ── Envelope ────────────────────────────────────────────────────────────────
//
// Each envelope field is read on its own so one bad entry never costs the
// artifact.

/// Take a list field out of the envelope. Anything but an array is empty.
fn entries(envelope: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match envelope.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// A decision score: a number or a numeric string. Words like "high" are dropped.
fn score(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|n| n as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

#[derive(Debug, Deserialize)]
struct DecisionDraft {
    description: String,
    #[serde(default)]
    impact: Value,
    #[serde(default)]
    effort: Value,
    #[serde(default)]
    confidence: Value,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportDraft {
    kind: ExportKind,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Value,
}

/// Pull a JSON object out of model output.
///
/// Accepts bare JSON, JSON inside a markdown code fence, and JSON surrounded
/// by prose.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(unfenced) {
        return Some(value);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&unfenced[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
