//! Sequence executor. Runs one agent or a chain with staged commits.
//!
//! Every step is authorized against a working view: the committed session
//! artifacts plus whatever earlier steps produced. Nothing reaches the
//! session from here. The caller commits a [`ExecutionOutcome::Completed`]
//! run and discards the rest.

use std::sync::Arc;
use std::time::Duration;

use pmos_agents::AgentRegistry;
use pmos_core::agent::{AgentLabel, AgentRequest};
use pmos_core::context::{ContextPayload, PriorStep};
use pmos_core::error::AgentError;
use pmos_core::export::ExportRequest;
use pmos_core::session::{Artifact, Decision, Session, StepRecord};
use pmos_workflow::{Authorization, Denial, authorize};
use tracing::{debug, error, info};

/// What a (possibly partial) run produced, in step order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRun {
    pub steps: Vec<StepRecord>,
    pub artifacts: Vec<Artifact>,
    pub decisions: Vec<Decision>,
    pub exports: Vec<ExportRequest>,
}

impl ExecutionRun {
    pub fn agents(&self) -> Vec<AgentLabel> {
        self.steps.iter().map(|s| s.agent).collect()
    }

    /// The user-facing text: a single step's rendering as is, several steps
    /// under per-agent headings.
    pub fn rendering(&self) -> String {
        match self.steps.as_slice() {
            [] => String::new(),
            [only] => only.result.rendering.clone(),
            steps => steps
                .iter()
                .map(|s| format!("## {}\n\n{}", s.agent, s.result.rendering))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    fn record(&mut self, agent: AgentLabel, result: pmos_core::agent::AgentResult) {
        self.artifacts.extend(result.artifacts.iter().cloned());
        self.decisions.extend(result.decisions.iter().cloned());
        self.exports.extend(result.exports.iter().cloned());
        self.steps.push(StepRecord { agent, result });
    }
}

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Every step ran. Safe to commit.
    Completed(ExecutionRun),
    /// A step was refused by the workflow gate; later steps never ran.
    Denied { run: ExecutionRun, denial: Denial },
    /// A step failed or timed out; later steps never ran.
    Failed {
        run: ExecutionRun,
        agent: AgentLabel,
        error: AgentError,
    },
    /// A step asked the user for more detail. `run` includes that step;
    /// `pending` are the steps that never ran.
    NeedsClarification {
        run: ExecutionRun,
        agent: AgentLabel,
        questions: Vec<String>,
        pending: Vec<AgentLabel>,
    },
}

impl ExecutionOutcome {
    pub fn run(&self) -> &ExecutionRun {
        match self {
            Self::Completed(run)
            | Self::Denied { run, .. }
            | Self::Failed { run, .. }
            | Self::NeedsClarification { run, .. } => run,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

pub struct SequenceExecutor {
    registry: Arc<AgentRegistry>,
    agent_timeout: Duration,
}

impl SequenceExecutor {
    pub fn new(registry: Arc<AgentRegistry>, agent_timeout: Duration) -> Self {
        Self {
            registry,
            agent_timeout,
        }
    }

    pub async fn run(
        &self,
        session: &Session,
        label: AgentLabel,
        message: &str,
        context: &ContextPayload,
    ) -> ExecutionOutcome {
        self.run_chain(session, &[label], message, context).await
    }

    pub async fn run_chain(
        &self,
        session: &Session,
        labels: &[AgentLabel],
        message: &str,
        context: &ContextPayload,
    ) -> ExecutionOutcome {
        let mut working = session.artifacts().clone();
        let mut prior_steps: Vec<PriorStep> = Vec::new();
        let mut run = ExecutionRun::default();

        for (i, &label) in labels.iter().enumerate() {
            if let Authorization::Deny(denial) = authorize(&working, label) {
                info!(
                    session_id = %session.id(),
                    agent = %label,
                    step = i + 1,
                    missing = %denial.required_artifact,
                    "Chain step denied by workflow gate"
                );
                return ExecutionOutcome::Denied { run, denial };
            }

            let agent = self.registry.resolve(label);
            let request = AgentRequest {
                message: message.to_string(),
                context: context.for_step(working.clone(), prior_steps.clone()),
                artifacts: working.clone(),
            };

            debug!(session_id = %session.id(), agent = %label, step = i + 1, total = labels.len(), "Invoking agent");

            let result = match tokio::time::timeout(self.agent_timeout, agent.invoke(request)).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!(session_id = %session.id(), agent = %label, error = %e, "Agent invocation failed");
                    return ExecutionOutcome::Failed { run, agent: label, error: e };
                }
                Err(_) => {
                    let e = AgentError::Timeout {
                        agent: label.to_string(),
                        timeout_secs: self.agent_timeout.as_secs(),
                    };
                    error!(session_id = %session.id(), agent = %label, error = %e, "Agent invocation timed out");
                    return ExecutionOutcome::Failed { run, agent: label, error: e };
                }
            };

            if result.needs_clarification() {
                let questions = result.clarifying_questions.clone();
                let pending = labels[i + 1..].to_vec();
                info!(
                    session_id = %session.id(),
                    agent = %label,
                    step = i + 1,
                    pending = pending.len(),
                    "Agent asked for clarification, stopping"
                );
                run.record(label, result);
                return ExecutionOutcome::NeedsClarification {
                    run,
                    agent: label,
                    questions,
                    pending,
                };
            }

            working.merge(result.artifacts.iter().cloned());
            prior_steps.push(PriorStep {
                agent: label,
                rendering: result.rendering.clone(),
            });
            run.record(label, result);
        }

        ExecutionOutcome::Completed(run)
    }
}
