//! PM agent capabilities for PM OS.
//!
//! Six LLM-backed agents share one implementation, [`LlmAgent`], and differ
//! only by their [`AgentProfile`]: persona, the artifact they may produce,
//! and the documents they may ask to export. Unclear requests go to the
//! built-in [`ClarifyAgent`].

pub mod clarify;
pub mod llm;
pub mod profile;
pub mod registry;

pub use clarify::ClarifyAgent;
pub use llm::LlmAgent;
pub use profile::AgentProfile;
pub use registry::AgentRegistry;
