//! File sink: one markdown document per export.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use pmos_core::error::ExportError;
use pmos_core::export::{ExportLink, ExportRequest, ExportSink};
use tracing::debug;

use crate::render::render_markdown;

const MAX_SLUG_CHARS: usize = 48;

pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(request: &ExportRequest) -> String {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S%3f");
        let slug = slugify(&request.title);
        if slug.is_empty() {
            format!("{stamp}-{}.md", request.kind)
        } else {
            format!("{stamp}-{}-{slug}.md", request.kind)
        }
    }
}

#[async_trait]
impl ExportSink for FileExportSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportLink, ExportError> {
        let write_failed = |e: std::io::Error| ExportError::WriteFailed {
            kind: request.kind.to_string(),
            reason: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(write_failed)?;
        let path = self.dir.join(Self::file_name(request));
        tokio::fs::write(&path, render_markdown(request))
            .await
            .map_err(write_failed)?;

        debug!(kind = %request.kind, path = %path.display(), "Wrote export file");
        Ok(ExportLink {
            kind: request.kind,
            title: request.title.clone(),
            location: path.display().to_string(),
        })
    }
}

/// Lowercase ASCII alphanumerics joined by single dashes.
fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
    }
    slug.trim_end_matches('-').to_string()
}
