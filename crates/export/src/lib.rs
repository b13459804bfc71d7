//! Export sinks for PM OS.
//!
//! Agents request documents (PRDs, user stories, executive summaries, the
//! decision log); the router hands each request to one configured sink.
//!
//! - `file`: one markdown file per document under the export directory
//! - `webhook`: POST the document as JSON to a configured URL
//! - `none`: exports are skipped and the router notes it

pub mod file;
pub mod render;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use pmos_config::AppConfig;
use pmos_core::export::ExportSink;
use tracing::info;

pub use file::FileExportSink;
pub use render::render_markdown;
pub use webhook::WebhookExportSink;

/// Build the sink named by `[export].sink`, or `None` for `"none"`.
///
/// The config is assumed validated; a webhook sink without a URL is treated
/// as disabled.
pub fn build_from_config(config: &AppConfig) -> Option<Arc<dyn ExportSink>> {
    let sink: Arc<dyn ExportSink> = match config.export.sink.as_str() {
        "file" => Arc::new(FileExportSink::new(config.export_dir())),
        "webhook" => {
            let url = config.export.webhook_url.as_deref()?;
            Arc::new(WebhookExportSink::new(
                url,
                Duration::from_secs(config.export.timeout_secs),
            ))
        }
        _ => return None,
    };
    info!(sink = %sink.name(), "Export sink ready");
    Some(sink)
}
