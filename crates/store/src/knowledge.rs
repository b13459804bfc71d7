//! Knowledge base backends.
//!
//! [`KeywordKnowledgeBase`] reads a JSONL corpus (one `{source, text, tags}`
//! object per line) and ranks entries by query term overlap. Small, local,
//! and good enough for a handful of product docs.

use std::path::Path;

use async_trait::async_trait;
use pmos_core::error::KnowledgeError;
use pmos_core::knowledge::{KnowledgeBase, KnowledgeQuery, Snippet};
use serde::Deserialize;
use tracing::{debug, warn};

/// Bonus added when an entry is tagged with the current workflow phase.
const PHASE_TAG_BONUS: f32 = 0.25;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "was", "our", "out",
    "how", "why", "what", "who", "with", "this", "that", "from", "have", "should", "would",
    "could", "into", "about", "which", "when", "there", "their", "them", "they", "will",
];

#[derive(Debug, Deserialize)]
struct CorpusEntry {
    source: String,
    text: String,
    #[serde(default)]
    tags: Vec<String>,
}

pub struct KeywordKnowledgeBase {
    entries: Vec<CorpusEntry>,
}

impl KeywordKnowledgeBase {
    /// Load a JSONL corpus. A missing file yields an empty knowledge base;
    /// unparseable lines are skipped.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Knowledge corpus not readable, starting empty");
                return Self { entries: Vec::new() };
            }
        };

        let entries: Vec<CorpusEntry> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<CorpusEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted knowledge entry");
                    None
                }
            })
            .collect();

        debug!(path = %path.display(), count = entries.len(), "Knowledge corpus loaded");
        Self { entries }
    }

    /// Build from in-memory snippets. Scores on the inputs are ignored.
    pub fn from_snippets(snippets: impl IntoIterator<Item = Snippet>) -> Self {
        Self {
            entries: snippets
                .into_iter()
                .map(|s| CorpusEntry {
                    source: s.source,
                    text: s.text,
                    tags: s.tags,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn score(entry: &CorpusEntry, terms: &[String], phase_tag: &str) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let text = entry.text.to_lowercase();
        let tags: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();

        let hits = terms
            .iter()
            .filter(|term| text.contains(term.as_str()) || tags.iter().any(|t| t == *term))
            .count();
        if hits == 0 {
            return 0.0;
        }

        let mut score = hits as f32 / terms.len() as f32;
        if tags.iter().any(|t| t == phase_tag) {
            score += PHASE_TAG_BONUS;
        }
        score
    }
}

fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

#[async_trait]
impl KnowledgeBase for KeywordKnowledgeBase {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn retrieve(&self, query: &KnowledgeQuery) -> Result<Vec<Snippet>, KnowledgeError> {
        let terms = query_terms(&query.text);
        let phase_tag = query.phase.as_str();

        let mut ranked: Vec<Snippet> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score = Self::score(entry, &terms, phase_tag);
                (score > 0.0).then(|| Snippet {
                    source: entry.source.clone(),
                    text: entry.text.clone(),
                    score,
                    tags: entry.tags.clone(),
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(query.top_k);
        Ok(ranked)
    }
}

/// Retrieval disabled.
pub struct NoKnowledgeBase;

#[async_trait]
impl KnowledgeBase for NoKnowledgeBase {
    fn name(&self) -> &str {
        "none"
    }

    async fn retrieve(&self, _query: &KnowledgeQuery) -> Result<Vec<Snippet>, KnowledgeError> {
        Ok(Vec::new())
    }
}
