//! Context assembler. Builds the bounded [`ContextPayload`] for one turn.
//!
//! The only side effect is the knowledge-base lookup. A failed or slow
//! lookup leaves the payload without snippets and sets
//! `knowledge_degraded`; the turn carries on.

use std::sync::Arc;
use std::time::Duration;

use pmos_config::ContextConfig;
use pmos_core::context::{ContextPayload, TurnDigest, preview};
use pmos_core::knowledge::{KnowledgeBase, KnowledgeQuery, Snippet};
use pmos_core::session::{Session, Turn};
use tracing::{debug, warn};

use crate::context::token;

/// Longest input kept per history entry, in characters.
const DIGEST_INPUT_CHARS: usize = 400;
/// Longest rendering kept per history entry, in characters.
const DIGEST_RENDERING_CHARS: usize = 800;

#[derive(Debug, Clone)]
pub struct ContextLimits {
    /// Turn window used once the full history exceeds the token cap.
    pub max_turns: usize,
    pub history_token_cap: usize,
    pub recent_decisions: usize,
    pub kb_top_k: usize,
    pub kb_timeout: Duration,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for ContextLimits {
    fn from(config: &ContextConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            history_token_cap: config.history_token_cap,
            recent_decisions: config.recent_decisions,
            kb_top_k: config.kb_top_k,
            kb_timeout: Duration::from_secs(config.kb_timeout_secs),
        }
    }
}

pub struct ContextAssembler {
    knowledge: Arc<dyn KnowledgeBase>,
    limits: ContextLimits,
}

impl ContextAssembler {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>, limits: ContextLimits) -> Self {
        Self { knowledge, limits }
    }

    pub async fn assemble(&self, session: &Session, message: &str) -> ContextPayload {
        let (history, history_dropped) = self.window_history(session.turns());
        let (snippets, knowledge_degraded) = self.retrieve(session, message).await;

        debug!(
            session_id = %session.id(),
            history = history.len(),
            history_dropped,
            snippets = snippets.len(),
            knowledge_degraded,
            "Context assembled"
        );

        ContextPayload {
            phase: session.phase(),
            history,
            history_dropped,
            artifacts: session.artifacts().clone(),
            recent_decisions: session.decisions().recent(self.limits.recent_decisions).to_vec(),
            snippets,
            knowledge_degraded,
            prior_steps: Vec::new(),
        }
    }

    /// All turns if they fit the token cap; otherwise the last `max_turns`,
    /// with the oldest dropped until the rest fits.
    fn window_history(&self, turns: &[Turn]) -> (Vec<TurnDigest>, usize) {
        let digests: Vec<TurnDigest> = turns.iter().map(digest).collect();
        let total = digests.len();
        let cap = self.limits.history_token_cap;

        let all_tokens: usize = digests.iter().map(token::estimate_digest_tokens).sum();
        if all_tokens <= cap {
            return (digests, 0);
        }

        let start = total.saturating_sub(self.limits.max_turns);
        let mut window: Vec<TurnDigest> = digests.into_iter().skip(start).collect();
        let mut used: usize = window.iter().map(token::estimate_digest_tokens).sum();
        while used > cap && !window.is_empty() {
            used -= token::estimate_digest_tokens(&window.remove(0));
        }

        let dropped = total - window.len();
        (window, dropped)
    }

    async fn retrieve(&self, session: &Session, message: &str) -> (Vec<Snippet>, bool) {
        if message.trim().is_empty() || self.limits.kb_top_k == 0 {
            return (Vec::new(), false);
        }

        let query = KnowledgeQuery {
            text: message.to_string(),
            top_k: self.limits.kb_top_k,
            phase: session.phase(),
        };

        match tokio::time::timeout(self.limits.kb_timeout, self.knowledge.retrieve(&query)).await {
            Ok(Ok(mut snippets)) => {
                snippets.truncate(self.limits.kb_top_k);
                (snippets, false)
            }
            Ok(Err(e)) => {
                warn!(session_id = %session.id(), knowledge = %self.knowledge.name(), error = %e, "Knowledge retrieval failed");
                (Vec::new(), true)
            }
            Err(_) => {
                warn!(
                    session_id = %session.id(),
                    knowledge = %self.knowledge.name(),
                    timeout_secs = self.limits.kb_timeout.as_secs(),
                    "Knowledge retrieval timed out"
                );
                (Vec::new(), true)
            }
        }
    }
}

fn digest(turn: &Turn) -> TurnDigest {
    TurnDigest {
        input: preview(&turn.input, DIGEST_INPUT_CHARS),
        agents: turn.agents().collect(),
        rendering: preview(&turn.rendering, DIGEST_RENDERING_CHARS),
    }
}
