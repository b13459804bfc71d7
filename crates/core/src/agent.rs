//! Agent labels, classification results, and the agent capability trait.
//!
//! The set of agents is closed. Each label maps to exactly one
//! [`AgentCapability`] in the registry; `Unclear` maps to the built-in
//! clarification capability.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ContextPayload;
use crate::error::AgentError;
use crate::export::ExportRequest;
use crate::session::{Artifact, ArtifactMap, Decision};

/// The closed set of routing targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLabel {
    Scout,
    Framer,
    Strategist,
    Aligner,
    Executor,
    Narrator,
    Unclear,
}

impl AgentLabel {
    /// The six real agents, in canonical workflow order.
    pub const AGENTS: [AgentLabel; 6] = [
        AgentLabel::Framer,
        AgentLabel::Scout,
        AgentLabel::Strategist,
        AgentLabel::Aligner,
        AgentLabel::Executor,
        AgentLabel::Narrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Framer => "framer",
            Self::Strategist => "strategist",
            Self::Aligner => "aligner",
            Self::Executor => "executor",
            Self::Narrator => "narrator",
            Self::Unclear => "unclear",
        }
    }

    /// `false` only for [`AgentLabel::Unclear`].
    pub fn is_agent(&self) -> bool {
        !matches!(self, Self::Unclear)
    }
}

impl fmt::Display for AgentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown agent label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for AgentLabel {
    type Err = UnknownLabel;

    /// Case-insensitive. `none` is an accepted spelling of `unclear`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scout" => Ok(Self::Scout),
            "framer" => Ok(Self::Framer),
            "strategist" => Ok(Self::Strategist),
            "aligner" => Ok(Self::Aligner),
            "executor" => Ok(Self::Executor),
            "narrator" => Ok(Self::Narrator),
            "unclear" | "none" => Ok(Self::Unclear),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Output of the intent classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: AgentLabel,

    /// Always within `[0.0, 1.0]`.
    pub confidence: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl ClassificationResult {
    pub fn new(label: AgentLabel, confidence: f32, rationale: Option<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { label, confidence, rationale }
    }

    /// A degraded classification: `unclear` with zero confidence.
    pub fn unclear(rationale: impl Into<String>) -> Self {
        Self {
            label: AgentLabel::Unclear,
            confidence: 0.0,
            rationale: Some(rationale.into()),
        }
    }

    /// Explicit user selection, which skips the classifier.
    pub fn explicit(label: AgentLabel) -> Self {
        Self {
            label,
            confidence: 1.0,
            rationale: Some("selected explicitly".into()),
        }
    }
}

/// Everything an agent sees for one invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub message: String,
    pub context: ContextPayload,
    /// Committed artifacts plus anything staged earlier in the same chain.
    pub artifacts: ArtifactMap,
}

/// Structured output of one agent invocation.
///
/// Agents never touch the session. The router applies this value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub rendering: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<Decision>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<ExportRequest>,

    /// Non-empty when the agent cannot do its job without more input.
    /// A chain stops at such a step and nothing from it is committed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clarifying_questions: Vec<String>,
}

impl AgentResult {
    pub fn text(rendering: impl Into<String>) -> Self {
        Self {
            rendering: rendering.into(),
            ..Default::default()
        }
    }

    pub fn needs_clarification(&self) -> bool {
        !self.clarifying_questions.is_empty()
    }
}

/// The uniform invocation capability every agent implements.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    fn label(&self) -> AgentLabel;

    /// One-line description, used in classifier prompts and help output.
    fn description(&self) -> &str;

    async fn invoke(&self, request: AgentRequest) -> std::result::Result<AgentResult, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parsing_is_case_insensitive() {
        assert_eq!("Framer".parse::<AgentLabel>().unwrap(), AgentLabel::Framer);
        assert_eq!(" EXECUTOR ".parse::<AgentLabel>().unwrap(), AgentLabel::Executor);
        assert_eq!("none".parse::<AgentLabel>().unwrap(), AgentLabel::Unclear);
        assert!("designer".parse::<AgentLabel>().is_err());
    }

    #[test]
    fn label_display_matches_serde() {
        for label in AgentLabel::AGENTS {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{label}\""));
        }
    }

    #[test]
    fn classification_confidence_is_clamped() {
        assert_eq!(ClassificationResult::new(AgentLabel::Scout, 1.7, None).confidence, 1.0);
        assert_eq!(ClassificationResult::new(AgentLabel::Scout, -0.2, None).confidence, 0.0);
        assert_eq!(ClassificationResult::new(AgentLabel::Scout, f32::NAN, None).confidence, 0.0);
    }

    #[test]
    fn only_unclear_is_not_an_agent() {
        assert!(AgentLabel::AGENTS.iter().all(|l| l.is_agent()));
        assert!(!AgentLabel::Unclear.is_agent());
    }
}
