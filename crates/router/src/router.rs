//! The router. Takes one user turn from message to committed session state.
//!
//! The router owns no session state. It receives the session by `&mut`,
//! appends exactly one [`Turn`] per call, and commits artifacts and
//! decisions only when every agent that ran in the turn succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use pmos_config::RouterConfig;
use pmos_core::agent::{AgentLabel, ClassificationResult};
use pmos_core::export::{ExportKind, ExportLink, ExportRequest, ExportSink};
use pmos_core::session::{RedirectPolicy, Session, Turn, TurnOutcome};
use pmos_workflow::{Authorization, Denial, authorize, redirect_target};
use tracing::{info, instrument, warn};

use crate::classifier::IntentClassifier;
use crate::context::ContextAssembler;
use crate::executor::{ExecutionOutcome, ExecutionRun, SequenceExecutor};
use crate::response::{RouteDecision, RouterResponse, TurnError};

/// How the agent(s) for a turn are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Ask the intent classifier.
    Classify,
    /// Explicit selection. Skips the classifier but not the workflow gate.
    Agent(AgentLabel),
    /// Run these agents in order with a staged commit.
    Chain(Vec<AgentLabel>),
    /// A chain defined under `[router.chains]`.
    NamedChain(String),
}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: String,
    pub target: Target,
}

impl TurnRequest {
    pub fn classify(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            target: Target::Classify,
        }
    }

    pub fn agent(message: impl Into<String>, label: AgentLabel) -> Self {
        Self {
            message: message.into(),
            target: Target::Agent(label),
        }
    }

    pub fn chain(message: impl Into<String>, labels: Vec<AgentLabel>) -> Self {
        Self {
            message: message.into(),
            target: Target::Chain(labels),
        }
    }

    pub fn named_chain(message: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            target: Target::NamedChain(name.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// `confidence < threshold` is unclear; `confidence >= threshold` is accepted.
    pub confidence_threshold: f32,
    pub redirect_policy: RedirectPolicy,
    pub chains: HashMap<String, Vec<AgentLabel>>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

impl From<&RouterConfig> for RouterSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            redirect_policy: config.redirect_policy,
            chains: config
                .chains
                .keys()
                .filter_map(|name| config.chain(name).map(|labels| (name.clone(), labels)))
                .collect(),
        }
    }
}

enum Plan {
    Single(AgentLabel),
    Chain(Vec<AgentLabel>),
    UnknownChain(String),
}

/// Everything decided during a turn, before it is recorded.
struct Finished {
    run: ExecutionRun,
    rendering: String,
    outcome: TurnOutcome,
    denial: Option<Denial>,
    error: Option<TurnError>,
    decisions_appended: usize,
    export_links: Vec<ExportLink>,
    clarifying_questions: Vec<String>,
    pending_agents: Vec<AgentLabel>,
}

impl Finished {
    fn uncommitted(run: ExecutionRun, rendering: String, outcome: TurnOutcome) -> Self {
        Self {
            run,
            rendering,
            outcome,
            denial: None,
            error: None,
            decisions_appended: 0,
            export_links: Vec::new(),
            clarifying_questions: Vec::new(),
            pending_agents: Vec::new(),
        }
    }
}

pub struct Router {
    assembler: ContextAssembler,
    classifier: IntentClassifier,
    executor: SequenceExecutor,
    export_sink: Option<Arc<dyn ExportSink>>,
    settings: RouterSettings,
}

impl Router {
    pub fn new(
        assembler: ContextAssembler,
        classifier: IntentClassifier,
        executor: SequenceExecutor,
        settings: RouterSettings,
    ) -> Self {
        Self {
            assembler,
            classifier,
            executor,
            export_sink: None,
            settings,
        }
    }

    pub fn with_export_sink(mut self, sink: Arc<dyn ExportSink>) -> Self {
        self.export_sink = Some(sink);
        self
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Classify and handle one message.
    pub async fn handle(&self, session: &mut Session, message: &str) -> RouterResponse {
        self.handle_request(session, TurnRequest::classify(message)).await
    }

    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn handle_request(&self, session: &mut Session, request: TurnRequest) -> RouterResponse {
        let message = request.message.trim().to_string();
        let context = self.assembler.assemble(session, &message).await;

        let (classification, plan) = match request.target {
            Target::Classify => {
                let classification = self.classifier.classify(&message, &context).await;
                let effective = self.effective_label(&classification);
                (classification, Plan::Single(effective))
            }
            Target::Agent(label) => (ClassificationResult::explicit(label), Plan::Single(label)),
            Target::Chain(labels) => self.chain_plan(labels),
            Target::NamedChain(name) => match self.settings.chains.get(&name) {
                Some(labels) if !labels.is_empty() => self.chain_plan(labels.clone()),
                _ => (
                    ClassificationResult::unclear(format!("unknown chain '{name}'")),
                    Plan::UnknownChain(name),
                ),
            },
        };

        info!(
            label = %classification.label,
            confidence = classification.confidence,
            phase = %session.phase(),
            "Routing turn"
        );

        let mut notes = Vec::new();
        let finished = match plan {
            Plan::UnknownChain(name) => self.unknown_chain(&name),
            Plan::Chain(labels) => {
                let outcome = self.executor.run_chain(session, &labels, &message, &context).await;
                self.settle(session, outcome, None, &mut notes).await
            }
            Plan::Single(label) => match authorize(session.artifacts(), label) {
                Authorization::Allow => {
                    let outcome = self.executor.run(session, label, &message, &context).await;
                    self.settle(session, outcome, None, &mut notes).await
                }
                Authorization::Deny(denial) => {
                    self.redirect(session, denial, &message, &context, &mut notes).await
                }
            },
        };

        self.record(session, message, classification, finished, notes)
    }

    /// Dry run: assemble, classify, and authorize without invoking any agent
    /// or touching the session.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn route(&self, session: &Session, message: &str) -> RouteDecision {
        let message = message.trim();
        let context = self.assembler.assemble(session, message).await;
        let classification = self.classifier.classify(message, &context).await;
        let effective = self.effective_label(&classification);
        let authorization = authorize(session.artifacts(), effective);
        let redirect_to = match authorization {
            Authorization::Allow => None,
            Authorization::Deny(_) => redirect_target(session.artifacts(), effective),
        };

        RouteDecision {
            session_id: session.id().clone(),
            below_threshold: effective != classification.label,
            classification,
            effective,
            authorization,
            redirect_to,
            phase: session.phase(),
            snippets: context.snippets.len(),
            knowledge_degraded: context.knowledge_degraded,
        }
    }

    fn effective_label(&self, classification: &ClassificationResult) -> AgentLabel {
        if classification.label.is_agent() && classification.confidence < self.settings.confidence_threshold {
            info!(
                label = %classification.label,
                confidence = classification.confidence,
                threshold = self.settings.confidence_threshold,
                "Classification below threshold, treating as unclear"
            );
            AgentLabel::Unclear
        } else {
            classification.label
        }
    }

    fn chain_plan(&self, labels: Vec<AgentLabel>) -> (ClassificationResult, Plan) {
        match labels.first() {
            Some(&first) => (ClassificationResult::explicit(first), Plan::Chain(labels)),
            None => (ClassificationResult::unclear("empty chain"), Plan::Single(AgentLabel::Unclear)),
        }
    }

    fn unknown_chain(&self, name: &str) -> Finished {
        let mut known: Vec<&str> = self.settings.chains.keys().map(String::as_str).collect();
        known.sort_unstable();
        let rendering = if known.is_empty() {
            format!("There is no chain named '{name}', and no chains are configured.")
        } else {
            format!("There is no chain named '{name}'. Known chains: {}.", known.join(", "))
        };
        Finished::uncommitted(ExecutionRun::default(), rendering, TurnOutcome::Clarification)
    }

    async fn redirect(
        &self,
        session: &mut Session,
        denial: Denial,
        message: &str,
        context: &pmos_core::context::ContextPayload,
        notes: &mut Vec<String>,
    ) -> Finished {
        let target = match self.settings.redirect_policy {
            RedirectPolicy::AskUser => None,
            RedirectPolicy::AutoChain => redirect_target(session.artifacts(), denial.requested),
        };

        let Some(target) = target else {
            let outcome = ExecutionOutcome::Denied {
                run: ExecutionRun::default(),
                denial,
            };
            return self.settle(session, outcome, None, notes).await;
        };

        info!(requested = %denial.requested, redirected_to = %target, "Auto-chaining to suggested agent");
        let outcome = self.executor.run(session, target, message, context).await;
        self.settle(session, outcome, Some(denial), notes).await
    }

    /// Commit a completed run, or explain why nothing was committed.
    async fn settle(
        &self,
        session: &mut Session,
        outcome: ExecutionOutcome,
        redirected_from: Option<Denial>,
        notes: &mut Vec<String>,
    ) -> Finished {
        match outcome {
            ExecutionOutcome::Completed(run) => {
                let decisions_appended = run.decisions.len();
                pmos_workflow::commit(session, run.artifacts.clone(), run.decisions.clone());
                let export_links = self.dispatch_exports(session, &run.exports, notes).await;

                let outcome = if run.steps.iter().all(|s| !s.agent.is_agent()) {
                    TurnOutcome::Clarification
                } else {
                    TurnOutcome::Answered
                };
                let rendering = match &redirected_from {
                    Some(denial) => format!("{}\n\n{}", denial.explanation(), run.rendering()),
                    None => run.rendering(),
                };

                Finished {
                    denial: redirected_from,
                    decisions_appended,
                    export_links,
                    ..Finished::uncommitted(run, rendering, outcome)
                }
            }
            ExecutionOutcome::Denied { run, denial } => {
                let rendering = if run.steps.is_empty() {
                    denial.explanation()
                } else {
                    format!(
                        "{}\n\nThe chain stopped here. {} Nothing from this chain was saved.",
                        run.rendering(),
                        denial.explanation()
                    )
                };
                Finished {
                    denial: Some(denial),
                    ..Finished::uncommitted(run, rendering, TurnOutcome::Redirected)
                }
            }
            ExecutionOutcome::Failed { run, agent, error } => Finished {
                denial: redirected_from,
                error: Some(TurnError::Agent {
                    agent,
                    message: error.to_string(),
                }),
                ..Finished::uncommitted(
                    run,
                    format!(
                        "The {agent} could not complete this request ({error}). Nothing was changed; please try again."
                    ),
                    TurnOutcome::Failed,
                )
            },
            ExecutionOutcome::NeedsClarification {
                run,
                agent,
                questions,
                pending,
            } => {
                let asked = run
                    .steps
                    .last()
                    .map(|s| s.result.rendering.clone())
                    .unwrap_or_default();
                let mut rendering = format!("{asked}\n\n**The {agent} needs a few answers first:**\n");
                for question in &questions {
                    rendering.push_str(&format!("- {question}\n"));
                }
                if !pending.is_empty() {
                    let names: Vec<&str> = pending.iter().map(|a| a.as_str()).collect();
                    rendering.push_str(&format!("\nStill to run once you answer: {}.", names.join(", ")));
                }
                if run.steps.len() > 1 {
                    rendering.push_str("\nNothing from this chain was saved.");
                }
                Finished {
                    denial: redirected_from,
                    clarifying_questions: questions,
                    pending_agents: pending,
                    ..Finished::uncommitted(run, rendering.trim_end().to_string(), TurnOutcome::Clarification)
                }
            }
        }
    }

    /// Export failures never fail the turn; they become notes.
    async fn dispatch_exports(
        &self,
        session: &Session,
        requests: &[ExportRequest],
        notes: &mut Vec<String>,
    ) -> Vec<ExportLink> {
        if requests.is_empty() {
            return Vec::new();
        }
        let Some(sink) = &self.export_sink else {
            notes.push(format!(
                "{} export(s) skipped: no export sink is configured.",
                requests.len()
            ));
            return Vec::new();
        };

        let mut links = Vec::with_capacity(requests.len());
        for request in requests {
            let mut request = request.clone();
            if request.kind == ExportKind::DecisionLog {
                request.payload = serde_json::Value::String(session.decisions().to_markdown());
            }
            match sink.export(&request).await {
                Ok(link) => {
                    info!(kind = %link.kind, location = %link.location, "Exported document");
                    links.push(link);
                }
                Err(e) => {
                    warn!(kind = %request.kind, sink = %sink.name(), error = %e, "Export failed");
                    notes.push(format!("Could not export \"{}\": {e}", request.title));
                }
            }
        }
        links
    }

    fn record(
        &self,
        session: &mut Session,
        input: String,
        classification: ClassificationResult,
        finished: Finished,
        notes: Vec<String>,
    ) -> RouterResponse {
        let agents = finished.run.agents();
        let agent = agents.last().copied().unwrap_or(classification.label);

        session.append_turn(Turn {
            input,
            classified: classification.label,
            confidence: classification.confidence,
            steps: finished.run.steps,
            rendering: finished.rendering.clone(),
            outcome: finished.outcome,
            timestamp: Utc::now(),
        });

        RouterResponse {
            session_id: session.id().clone(),
            rendered_text: finished.rendering,
            phase: session.phase(),
            agent,
            agents,
            confidence: classification.confidence,
            outcome: finished.outcome,
            decisions_appended: finished.decisions_appended,
            export_links: finished.export_links,
            notes,
            denial: finished.denial,
            error: finished.error,
            clarifying_questions: finished.clarifying_questions,
            pending_agents: finished.pending_agents,
            saved: false,
        }
    }
}
