//! Shared test doubles for router tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pmos_agents::AgentRegistry;
use pmos_core::agent::{AgentCapability, AgentLabel, AgentRequest, AgentResult};
use pmos_core::error::{AgentError, ExportError, KnowledgeError, ProviderError, StoreError};
use pmos_core::export::{ExportKind, ExportLink, ExportRequest, ExportSink};
use pmos_core::knowledge::{KnowledgeBase, KnowledgeQuery, Snippet};
use pmos_core::message::Message;
use pmos_core::provider::{Provider, ProviderRequest, ProviderResponse};
use pmos_core::session::{Artifact, ArtifactKind, Decision, Session, SessionId, StepRecord, Turn, TurnOutcome};
use pmos_core::store::{SessionStore, SessionSummary};

use crate::classifier::IntentClassifier;
use crate::context::{ContextAssembler, ContextLimits};
use crate::executor::SequenceExecutor;
use crate::router::{Router, RouterSettings};

// ── Providers ───────────────────────────────────────────────────────────────

/// Returns queued replies in order; errors once the queue is empty.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    seen: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(vec![Err(error)]),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.seen.lock().unwrap().push(request.clone());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(ProviderError::NotConfigured("script exhausted".into()));
        }
        replies.remove(0).map(|content| ProviderResponse {
            message: Message::assistant(content),
            usage: None,
            model: request.model,
            metadata: serde_json::Map::new(),
        })
    }
}

pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ProviderError::Timeout("unreachable".into()))
    }
}

// ── Knowledge ───────────────────────────────────────────────────────────────

pub struct StaticKnowledge {
    snippets: Vec<Snippet>,
}

impl StaticKnowledge {
    pub fn empty() -> Self {
        Self { snippets: Vec::new() }
    }

    pub fn with_texts(texts: &[&str]) -> Self {
        Self {
            snippets: texts
                .iter()
                .map(|t| Snippet {
                    source: "static.md".into(),
                    text: t.to_string(),
                    score: 1.0,
                    tags: vec![],
                })
                .collect(),
        }
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledge {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(&self, query: &KnowledgeQuery) -> Result<Vec<Snippet>, KnowledgeError> {
        Ok(self.snippets.iter().take(query.top_k).cloned().collect())
    }
}

pub struct FailingKnowledge;

#[async_trait]
impl KnowledgeBase for FailingKnowledge {
    fn name(&self) -> &str {
        "failing"
    }

    async fn retrieve(&self, _query: &KnowledgeQuery) -> Result<Vec<Snippet>, KnowledgeError> {
        Err(KnowledgeError::Unavailable("index offline".into()))
    }
}

pub struct HangingKnowledge;

#[async_trait]
impl KnowledgeBase for HangingKnowledge {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn retrieve(&self, _query: &KnowledgeQuery) -> Result<Vec<Snippet>, KnowledgeError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

// ── Agents ──────────────────────────────────────────────────────────────────

enum Behavior {
    Text(String),
    Produce(ArtifactKind),
    Ask(Vec<String>),
    Fail,
    Hang,
}

/// A canned agent that records every request it receives.
pub struct StubAgent {
    label: AgentLabel,
    behavior: Behavior,
    decision: Option<String>,
    exports: Vec<(ExportKind, String)>,
    seen: Arc<Mutex<Vec<AgentRequest>>>,
}

impl StubAgent {
    fn with_behavior(label: AgentLabel, behavior: Behavior) -> Self {
        Self {
            label,
            behavior,
            decision: None,
            exports: Vec::new(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn text(label: AgentLabel, text: &str) -> Self {
        Self::with_behavior(label, Behavior::Text(text.into()))
    }

    pub fn producing(label: AgentLabel, kind: ArtifactKind) -> Self {
        Self::with_behavior(label, Behavior::Produce(kind))
    }

    /// Answers with clarifying questions instead of doing the work.
    pub fn asking(label: AgentLabel, questions: &[&str]) -> Self {
        Self::with_behavior(
            label,
            Behavior::Ask(questions.iter().map(|q| q.to_string()).collect()),
        )
    }

    pub fn failing(label: AgentLabel) -> Self {
        Self::with_behavior(label, Behavior::Fail)
    }

    pub fn hanging(label: AgentLabel) -> Self {
        Self::with_behavior(label, Behavior::Hang)
    }

    pub fn with_decision(mut self, description: &str) -> Self {
        self.decision = Some(description.into());
        self
    }

    pub fn with_export(mut self, kind: ExportKind, title: &str) -> Self {
        self.exports.push((kind, title.into()));
        self
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<AgentRequest>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl AgentCapability for StubAgent {
    fn label(&self) -> AgentLabel {
        self.label
    }

    fn description(&self) -> &str {
        "stub"
    }

    async fn invoke(&self, request: AgentRequest) -> Result<AgentResult, AgentError> {
        self.seen.lock().unwrap().push(request.clone());
        let mut result = match &self.behavior {
            Behavior::Text(text) => AgentResult::text(text.clone()),
            Behavior::Produce(kind) => AgentResult {
                rendering: format!("{} output", self.label),
                artifacts: vec![Artifact::new(
                    *kind,
                    serde_json::json!({"summary": format!("{} from {}", kind, self.label)}),
                    self.label,
                )],
                ..Default::default()
            },
            Behavior::Ask(questions) => AgentResult {
                rendering: format!("{} needs more detail", self.label),
                clarifying_questions: questions.clone(),
                ..Default::default()
            },
            Behavior::Fail => {
                return Err(AgentError::Completion {
                    agent: self.label.to_string(),
                    source: ProviderError::Network("connection reset".into()),
                });
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                AgentResult::default()
            }
        };
        if let Some(description) = &self.decision {
            let mut decision = Decision::new(self.label, description.clone());
            decision.query = request.message.clone();
            result.decisions.push(decision);
        }
        for (kind, title) in &self.exports {
            result.exports.push(ExportRequest {
                kind: *kind,
                title: title.clone(),
                payload: serde_json::json!(result.rendering),
            });
        }
        Ok(result)
    }
}

pub fn registry_with(agents: Vec<StubAgent>) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for agent in agents {
        registry.register(Arc::new(agent));
    }
    registry
}

pub fn router_with(provider: Arc<ScriptedProvider>, agents: Vec<StubAgent>, settings: RouterSettings) -> Router {
    Router::new(
        ContextAssembler::new(Arc::new(StaticKnowledge::empty()), ContextLimits::default()),
        IntentClassifier::new(provider, "test-model", Duration::from_secs(5)),
        SequenceExecutor::new(Arc::new(registry_with(agents)), Duration::from_millis(500)),
        settings,
    )
}

pub fn turn(input: &str, agent: AgentLabel, rendering: &str) -> Turn {
    Turn {
        input: input.into(),
        classified: agent,
        confidence: 0.9,
        steps: vec![StepRecord {
            agent,
            result: AgentResult::text(rendering),
        }],
        rendering: rendering.into(),
        outcome: TurnOutcome::Answered,
        timestamp: Utc::now(),
    }
}

// ── Export / store ──────────────────────────────────────────────────────────

/// Accepts every export except one kind.
pub struct RecordingSink {
    reject: ExportKind,
    exported: Mutex<Vec<ExportRequest>>,
}

impl RecordingSink {
    pub fn rejecting(reject: ExportKind) -> Self {
        Self {
            reject,
            exported: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExportSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportLink, ExportError> {
        if request.kind == self.reject {
            return Err(ExportError::Rejected {
                status_code: 422,
                message: "unsupported".into(),
            });
        }
        self.exported.lock().unwrap().push(request.clone());
        Ok(ExportLink {
            kind: request.kind,
            title: request.title.clone(),
            location: format!("memory://{}", request.kind),
        })
    }
}

/// A store whose loads or saves always fail.
pub struct FlakyStore {
    fail_loads: bool,
    saves: Mutex<usize>,
}

impl FlakyStore {
    pub fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            saves: Mutex::new(0),
        }
    }

    pub fn failing_saves() -> Self {
        Self {
            fail_loads: false,
            saves: Mutex::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn load(&self, _id: &SessionId) -> Result<Option<Session>, StoreError> {
        if self.fail_loads {
            Err(StoreError::Database("disk I/O error".into()))
        } else {
            Ok(None)
        }
    }

    async fn save(&self, _session: &Session) -> Result<(), StoreError> {
        *self.saves.lock().unwrap() += 1;
        Err(StoreError::Io("read-only file system".into()))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        Ok(Vec::new())
    }
}
