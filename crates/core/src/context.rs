//! The bounded context payload handed to the classifier and to agents.
//!
//! Built by the context assembler once per turn. During a chain the
//! sequence executor derives a fresh snapshot per step, with the staged
//! artifacts and a digest of the steps that already ran.

use serde::{Deserialize, Serialize};

use crate::agent::AgentLabel;
use crate::knowledge::Snippet;
use crate::session::{ArtifactMap, Decision, Phase};

/// Compressed view of one earlier turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDigest {
    pub input: String,
    pub agents: Vec<AgentLabel>,
    pub rendering: String,
}

/// Output of an earlier step in the current chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorStep {
    pub agent: AgentLabel,
    pub rendering: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextPayload {
    pub phase: Phase,
    /// Oldest first.
    pub history: Vec<TurnDigest>,
    /// Turns left out by the window or the token cap.
    pub history_dropped: usize,
    pub artifacts: ArtifactMap,
    pub recent_decisions: Vec<Decision>,
    pub snippets: Vec<Snippet>,
    /// Set when retrieval failed or timed out and `snippets` is empty because of it.
    pub knowledge_degraded: bool,
    pub prior_steps: Vec<PriorStep>,
}

impl ContextPayload {
    /// Snapshot for the next chain step.
    pub fn for_step(&self, artifacts: ArtifactMap, prior_steps: Vec<PriorStep>) -> Self {
        Self {
            artifacts,
            prior_steps,
            ..self.clone()
        }
    }

    /// Render as prompt sections. Empty sections are omitted.
    pub fn render(&self) -> String {
        let mut sections = vec![format!("[Workflow Phase]\n{}", self.phase)];

        if !self.artifacts.is_empty() {
            let lines: Vec<String> = self
                .artifacts
                .iter()
                .map(|a| format!("- {} (by {}): {}", a.kind, a.produced_by, a.summary()))
                .collect();
            sections.push(format!("[Artifacts]\n{}", lines.join("\n")));
        }

        if !self.recent_decisions.is_empty() {
            let lines: Vec<String> = self
                .recent_decisions
                .iter()
                .enumerate()
                .map(|(i, d)| format!("{}. [{}] {}", i + 1, d.agent, d.description))
                .collect();
            sections.push(format!("[Recent Decisions]\n{}", lines.join("\n")));
        }

        if !self.history.is_empty() {
            let mut lines = Vec::with_capacity(self.history.len() * 2);
            for turn in &self.history {
                lines.push(format!("User: {}", turn.input));
                let who = turn
                    .agents
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(" → ");
                let who = if who.is_empty() { "assistant".to_string() } else { who };
                lines.push(format!("{who}: {}", turn.rendering));
            }
            sections.push(format!("[Conversation History]\n{}", lines.join("\n")));
        }

        if !self.prior_steps.is_empty() {
            let lines: Vec<String> = self
                .prior_steps
                .iter()
                .map(|s| format!("- {}: {}", s.agent, preview(&s.rendering, 600)))
                .collect();
            sections.push(format!("[Earlier In This Chain]\n{}", lines.join("\n")));
        }

        if !self.snippets.is_empty() {
            let lines: Vec<String> = self
                .snippets
                .iter()
                .enumerate()
                .map(|(i, s)| format!("{}. ({}) {}", i + 1, s.source, s.text))
                .collect();
            sections.push(format!("[Retrieved Knowledge]\n{}", lines.join("\n")));
        }

        sections.join("\n\n")
    }
}

/// Truncate to at most `max_chars` characters, appending "..." when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
