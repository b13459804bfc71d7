//! LLM Provider implementations for PM OS.
//!
//! All providers implement the `pmos_core::Provider` trait.
//! The router builds the primary/fallback chain from configuration.

pub mod anthropic;
pub mod fallback;
mod http;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use fallback::FallbackProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, ProviderRouter};
