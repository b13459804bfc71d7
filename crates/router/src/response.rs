//! What a turn returns to the CLI and the HTTP gateway.

use pmos_core::agent::{AgentLabel, ClassificationResult};
use pmos_core::export::ExportLink;
use pmos_core::session::{Phase, SessionId, TurnOutcome};
use pmos_workflow::{Authorization, Denial};
use serde::{Deserialize, Serialize};

/// A turn failure shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnError {
    /// An agent failed; nothing from the turn was committed.
    Agent { agent: AgentLabel, message: String },
    /// The turn ran but the session could not be saved.
    Persistence { message: String },
}

impl std::fmt::Display for TurnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent { agent, message } => write!(f, "{agent} failed: {message}"),
            Self::Persistence { message } => write!(f, "session not saved: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterResponse {
    pub session_id: SessionId,
    pub rendered_text: String,
    /// Phase after the turn.
    pub phase: Phase,
    /// The last agent that ran, or the classified label when none did.
    pub agent: AgentLabel,
    pub agents: Vec<AgentLabel>,
    pub confidence: f32,
    pub outcome: TurnOutcome,
    pub decisions_appended: usize,
    pub export_links: Vec<ExportLink>,
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<Denial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TurnError>,
    /// Questions from an agent that stopped the turn to ask for detail.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clarifying_questions: Vec<String>,
    /// Agents that did not run because an earlier one asked for clarification.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_agents: Vec<AgentLabel>,
    /// Set by the session service once the session is persisted.
    pub saved: bool,
}

/// Result of a dry-run route: what would happen, with nothing executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub session_id: SessionId,
    pub classification: ClassificationResult,
    /// The label that would run after the confidence threshold.
    pub effective: AgentLabel,
    pub below_threshold: bool,
    pub authorization: Authorization,
    /// Where an auto-chain redirect would go, if the gate denies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<AgentLabel>,
    pub phase: Phase,
    pub snippets: usize,
    pub knowledge_degraded: bool,
}
