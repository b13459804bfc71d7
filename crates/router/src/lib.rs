//! Orchestration core for PM OS.
//!
//! One user turn flows through:
//!
//! ```text
//! SessionService::handle
//!   └─ load session (per-session lock held)
//!      └─ Router::handle
//!         ├─ ContextAssembler::assemble   history window, artifacts, decisions, KB
//!         ├─ IntentClassifier::classify   one JSON completion → label + confidence
//!         ├─ threshold                    low confidence → unclear
//!         ├─ workflow::authorize          gate, redirect on denial
//!         ├─ SequenceExecutor::run_chain  staged, all-or-nothing
//!         ├─ workflow::commit             artifacts, decisions, phase
//!         └─ export dispatch              failures become notes
//!   └─ save session
//! ```

pub mod classifier;
pub mod context;
pub mod executor;
pub mod response;
pub mod router;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use classifier::IntentClassifier;
pub use context::{ContextAssembler, ContextLimits};
pub use executor::{ExecutionOutcome, ExecutionRun, SequenceExecutor};
pub use response::{RouteDecision, RouterResponse, TurnError};
pub use router::{Router, RouterSettings, Target, TurnRequest};
pub use service::SessionService;
