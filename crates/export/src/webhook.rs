//! Webhook sink: POST each document as JSON.
//!
//! Body: `{"kind", "title", "payload", "markdown"}`. A JSON response with a
//! `url` field becomes the link location; otherwise the webhook URL is used.

use std::time::Duration;

use async_trait::async_trait;
use pmos_core::error::ExportError;
use pmos_core::export::{ExportLink, ExportRequest, ExportSink};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::render::render_markdown;

pub struct WebhookExportSink {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    url: Option<String>,
}

impl WebhookExportSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ExportSink for WebhookExportSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportLink, ExportError> {
        let body = serde_json::json!({
            "kind": request.kind,
            "title": request.title,
            "payload": request.payload,
            "markdown": render_markdown(request),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %message, "Webhook rejected export");
            return Err(ExportError::Rejected {
                status_code: status.as_u16(),
                message,
            });
        }

        // An empty or non-JSON reply is still a successful delivery
        let location = response
            .json::<WebhookReply>()
            .await
            .ok()
            .and_then(|reply| reply.url)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.url.clone());

        debug!(kind = %request.kind, location = %location, "Delivered export to webhook");
        Ok(ExportLink {
            kind: request.kind,
            title: request.title.clone(),
            location,
        })
    }
}
