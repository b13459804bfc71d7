//! Export sink trait: turns agent export requests into documents.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Prd,
    UserStories,
    ExecSummary,
    DecisionLog,
    /// PRD and user stories in one document.
    Combined,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prd => "prd",
            Self::UserStories => "user_stories",
            Self::ExecSummary => "exec_summary",
            Self::DecisionLog => "decision_log",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document an agent asked to have exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub kind: ExportKind,
    pub title: String,
    /// Either a markdown string or a structured JSON document.
    pub payload: serde_json::Value,
}

/// Where an exported document ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLink {
    pub kind: ExportKind,
    pub title: String,
    /// File path or URL.
    pub location: String,
}

#[async_trait]
pub trait ExportSink: Send + Sync {
    fn name(&self) -> &str;

    async fn export(&self, request: &ExportRequest) -> std::result::Result<ExportLink, ExportError>;
}
