//! Error types for the PM OS domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator seam has its own error enum.

use thiserror::Error;

/// The top-level error type for all PM OS operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Knowledge base errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Export errors ---
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failure of a single agent invocation. Always a turn failure.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Completion failed for {agent}: {source}")]
    Completion {
        agent: String,
        #[source]
        source: ProviderError,
    },

    #[error("Agent {agent} timed out after {timeout_secs}s")]
    Timeout { agent: String, timeout_secs: u64 },

    #[error("Agent {agent} returned unusable output: {reason}")]
    InvalidOutput { agent: String, reason: String },

    #[error("Agent unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Knowledge base unavailable: {0}")]
    Unavailable(String),

    #[error("Retrieval failed: {0}")]
    QueryFailed(String),

    #[error("Retrieval timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Error)]
pub enum ExportError {
    #[error("Export sink not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to write {kind} export: {reason}")]
    WriteFailed { kind: String, reason: String },

    #[error("Export rejected: {message} (status: {status_code})")]
    Rejected { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Session {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}
