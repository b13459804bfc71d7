//! Session stores and knowledge base backends for PM OS.

pub mod in_memory;
pub mod file;
pub mod knowledge;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemorySessionStore;
pub use file::FileSessionStore;
pub use knowledge::{KeywordKnowledgeBase, NoKnowledgeBase};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
