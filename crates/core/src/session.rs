//! Session domain types.
//!
//! A [`Session`] is the unit of persistence: one per conversation, loaded
//! before and saved after every turn. Its turn history and decision log are
//! append-only; its artifacts are latest-wins per kind.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{AgentLabel, AgentResult, UnknownLabel};
use crate::context::preview;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Phase ────────────────────────────────────────────────────────────────

/// Workflow phase. Ordered: later variants are more advanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    ProblemDiscovery,
    Decision,
    Execution,
    Communication,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::ProblemDiscovery,
        Phase::Decision,
        Phase::Execution,
        Phase::Communication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProblemDiscovery => "problem_discovery",
            Self::Decision => "decision",
            Self::Execution => "execution",
            Self::Communication => "communication",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// What the router does when the workflow gate denies an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectPolicy {
    /// Explain the missing artifact and wait for the next turn.
    #[default]
    AskUser,
    /// Run the suggested agent in the same turn.
    AutoChain,
}

// ── Artifacts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    ProblemStatement,
    DecisionRecord,
    MvpScope,
    ExecSummary,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProblemStatement => "problem_statement",
            Self::DecisionRecord => "decision_record",
            Self::MvpScope => "mvp_scope",
            Self::ExecSummary => "exec_summary",
        }
    }

    /// Human wording, e.g. "a problem statement".
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ProblemStatement => "a problem statement",
            Self::DecisionRecord => "a logged decision",
            Self::MvpScope => "an MVP scope",
            Self::ExecSummary => "an executive summary",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured work product that unlocks later phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub value: serde_json::Value,
    pub produced_by: AgentLabel,
    pub produced_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, value: serde_json::Value, produced_by: AgentLabel) -> Self {
        Self {
            kind,
            value,
            produced_by,
            produced_at: Utc::now(),
        }
    }

    /// One-line summary for prompts, logs and decision synthesis.
    pub fn summary(&self) -> String {
        const KEYS: [&str; 5] = ["summary", "statement", "recommendation", "decision", "title"];
        let text = match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()).map(str::to_string))
                .unwrap_or_else(|| self.value.to_string()),
            other => other.to_string(),
        };
        preview(&text, 200)
    }
}

/// Latest artifact per kind.
///
/// Serialized as a list so that the JSON form is independent of map key
/// handling in the backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Artifact>", into = "Vec<Artifact>")]
pub struct ArtifactMap(BTreeMap<ArtifactKind, Artifact>);

impl ArtifactMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any existing artifact of the same kind.
    pub fn insert(&mut self, artifact: Artifact) -> Option<Artifact> {
        self.0.insert(artifact.kind, artifact)
    }

    /// Apply a batch of artifacts in order; the last one of each kind wins.
    pub fn merge(&mut self, artifacts: impl IntoIterator<Item = Artifact>) {
        for artifact in artifacts {
            self.insert(artifact);
        }
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.0.get(&kind)
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Artifact>> for ArtifactMap {
    fn from(list: Vec<Artifact>) -> Self {
        let mut map = Self::new();
        map.merge(list);
        map
    }
}

impl From<ArtifactMap> for Vec<Artifact> {
    fn from(map: ArtifactMap) -> Self {
        map.0.into_values().collect()
    }
}

// ── Decisions ────────────────────────────────────────────────────────────

/// A logged product decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub agent: AgentLabel,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// Free-text context the agent attached to the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// The user message that produced this decision.
    #[serde(default)]
    pub query: String,

    pub timestamp: DateTime<Utc>,
}

impl Decision {
    pub fn new(agent: AgentLabel, description: impl Into<String>) -> Self {
        Self {
            agent,
            description: description.into(),
            impact: None,
            effort: None,
            confidence: None,
            context: None,
            query: String::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only decision log. Entries are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionLog(Vec<Decision>);

impl DecisionLog {
    pub fn append(&mut self, decision: Decision) {
        self.0.push(decision);
    }

    pub fn entries(&self) -> &[Decision] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recent `k` decisions, oldest first.
    pub fn recent(&self, k: usize) -> &[Decision] {
        let start = self.0.len().saturating_sub(k);
        &self.0[start..]
    }

    /// Markdown view of the whole log.
    pub fn to_markdown(&self) -> String {
        if self.0.is_empty() {
            return "*No decisions logged yet.*".to_string();
        }

        let mut out = String::from("## Decision Log\n\n");
        for (i, d) in self.0.iter().enumerate() {
            out.push_str(&format!(
                "### {}. {} ({})\n",
                i + 1,
                d.agent,
                d.timestamp.format("%Y-%m-%d %H:%M")
            ));
            if !d.query.is_empty() {
                out.push_str(&format!("**Query:** {}\n", preview(&d.query, 100)));
            }
            out.push_str(&format!("**Decision:** {}\n", d.description));

            let scores: Vec<String> = [("impact", d.impact), ("effort", d.effort), ("confidence", d.confidence)]
                .into_iter()
                .filter_map(|(name, v)| v.map(|v| format!("{name} {v:.1}")))
                .collect();
            if !scores.is_empty() {
                out.push_str(&format!("**Scores:** {}\n", scores.join(", ")));
            }
            if let Some(ctx) = &d.context {
                out.push_str(&format!("*Context: {ctx}*\n"));
            }
            out.push('\n');
        }
        out
    }
}

// ── Turns ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// One or more agents ran and their results were committed.
    Answered,
    /// The workflow gate denied the request and nothing ran.
    Redirected,
    /// The request was unclear and the clarification capability answered.
    Clarification,
    /// An agent failed, a chain aborted, or the turn otherwise committed nothing.
    Failed,
}

/// One agent invocation inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub agent: AgentLabel,
    pub result: AgentResult,
}

/// One user turn. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub input: String,
    pub classified: AgentLabel,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
    pub rendering: String,
    pub outcome: TurnOutcome,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// The agents that ran during this turn, in order.
    pub fn agents(&self) -> impl Iterator<Item = AgentLabel> + '_ {
        self.steps.iter().map(|s| s.agent)
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// One conversation with the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    phase: Phase,
    #[serde(default)]
    artifacts: ArtifactMap,
    #[serde(default)]
    turns: Vec<Turn>,
    #[serde(default)]
    decisions: DecisionLog,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            phase: Phase::ProblemDiscovery,
            artifacts: ArtifactMap::new(),
            turns: Vec::new(),
            decisions: DecisionLog::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn artifacts(&self) -> &ArtifactMap {
        &self.artifacts
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn decisions(&self) -> &DecisionLog {
        &self.decisions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn append_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.touch();
    }

    /// Merge committed artifacts (latest wins per kind) and append decisions.
    pub fn commit(&mut self, artifacts: Vec<Artifact>, decisions: Vec<Decision>) {
        self.artifacts.merge(artifacts);
        for decision in decisions {
            self.decisions.append(decision);
        }
        self.touch();
    }

    /// Move the phase forward. Requests to move backward are ignored.
    pub fn advance_phase(&mut self, phase: Phase) {
        if phase > self.phase {
            self.phase = phase;
            self.touch();
        }
    }

    /// Explicit reset: clears artifacts and phase. Turns and decisions are kept.
    pub fn reset(&mut self) {
        self.artifacts = ArtifactMap::new();
        self.phase = Phase::ProblemDiscovery;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
