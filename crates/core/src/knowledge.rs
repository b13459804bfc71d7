//! Knowledge base trait: ranked snippet retrieval.
//!
//! Retrieval is best-effort: callers treat an error as "no snippets" and
//! carry on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::session::Phase;

/// A ranked piece of reference material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// Document or file the snippet came from.
    pub source: String,
    pub text: String,
    /// Relevance score set by the retriever; higher is better.
    #[serde(default)]
    pub score: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Current workflow phase, usable as a ranking hint.
    #[serde(default)]
    pub phase: Phase,
}

fn default_top_k() -> usize {
    3
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `query.top_k` snippets, best first. May be empty.
    async fn retrieve(&self, query: &KnowledgeQuery) -> std::result::Result<Vec<Snippet>, KnowledgeError>;
}
