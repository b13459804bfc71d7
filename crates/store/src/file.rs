//! File-based session store: one JSON document per session.
//!
//! Storage location: `~/.pmos/sessions/<id>.json`
//!
//! Each save writes a temporary file next to the target and renames it into
//! place, so a crash mid-write never leaves a half-written session behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pmos_core::error::StoreError;
use pmos_core::session::{Session, SessionId};
use pmos_core::store::{SessionStore, SessionSummary};
use tracing::{debug, warn};

pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(id.as_str())))
    }

    async fn read_session(path: &Path) -> Result<Option<Session>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                id: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

/// Session ids come from users and URLs; keep file names to a safe alphabet.
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Self::read_session(&self.path_for(id)).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to create session directory: {e}")))?;

        let body = serde_json::to_string_pretty(session)
            .map_err(|e| StoreError::Io(format!("Failed to serialize session: {e}")))?;

        let target = self.path_for(session.id());
        let tmp = target.with_extension("json.tmp");

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to replace {}: {e}", target.display())))?;

        debug!(session_id = %session.id(), path = %target.display(), "Session saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_session(&path).await {
                Ok(Some(session)) => summaries.push(SessionSummary::from(&session)),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
