//! # PM OS Core
//!
//! Domain types, traits, and error definitions for the PM OS orchestration
//! pipeline. This crate has **zero framework dependencies**: it defines the
//! session model and the collaborator seams that every other crate
//! implements against.
//!
//! ## Collaborators
//!
//! Each external collaborator is a trait here, with implementations living
//! in their own crates:
//! - [`Provider`] for LLM completion (`pmos-providers`)
//! - [`AgentCapability`] for the PM agents (`pmos-agents`)
//! - [`KnowledgeBase`] and [`SessionStore`] (`pmos-store`)
//! - [`ExportSink`] (`pmos-export`)

pub mod error;
pub mod message;
pub mod provider;
pub mod agent;
pub mod session;
pub mod context;
pub mod knowledge;
pub mod export;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ExportError, KnowledgeError, ProviderError, Result, StoreError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, Usage};
pub use agent::{AgentCapability, AgentLabel, AgentRequest, AgentResult, ClassificationResult};
pub use session::{
    Artifact, ArtifactKind, ArtifactMap, Decision, DecisionLog, Phase, RedirectPolicy, Session, SessionId,
    StepRecord, Turn, TurnOutcome,
};
pub use context::{ContextPayload, PriorStep, TurnDigest};
pub use knowledge::{KnowledgeBase, KnowledgeQuery, Snippet};
pub use export::{ExportKind, ExportLink, ExportRequest, ExportSink};
pub use store::{SessionStore, SessionSummary};
