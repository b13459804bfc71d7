//! Per-turn context assembly.
//!
//! | Part | Source | Bound |
//! |------|--------|-------|
//! | Phase | session | - |
//! | Artifacts | session | full map |
//! | Recent decisions | decision log | last K |
//! | History | turn history | all under the token cap, else last N trimmed to the cap |
//! | Snippets | knowledge base | top-k, soft timeout |

pub mod assembler;
pub mod token;

pub use assembler::{ContextAssembler, ContextLimits};
