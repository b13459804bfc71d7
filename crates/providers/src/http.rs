//! HTTP plumbing shared by the hosted providers.

use pmos_core::error::ProviderError;
use reqwest::{RequestBuilder, Response, header::RETRY_AFTER};
use tracing::warn;

/// Seconds to wait on a 429 that carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Send a request, separating timeouts from other transport failures.
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, ProviderError> {
    request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    })
}

/// Pass a successful response through; turn anything else into a
/// [`ProviderError`], reading the body for the log.
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    warn!(provider, status, body = %body, "Provider returned error");
    Err(status_error(provider, status, retry_after, body))
}

pub(crate) fn status_error(provider: &str, status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        401 | 403 => ProviderError::AuthenticationFailed(format!(
            "{provider} rejected the API key or its permissions (status {status})"
        )),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_honours_retry_after() {
        match status_error("openai", 429, Some(30), String::new()) {
            ProviderError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 30),
            other => panic!("expected RateLimited, got {other:?}"),
        }
        match status_error("openai", 429, None, String::new()) {
            ProviderError::RateLimited { retry_after_secs } => {
                assert_eq!(retry_after_secs, DEFAULT_RETRY_AFTER_SECS)
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn auth_statuses_name_the_provider() {
        for status in [401, 403] {
            match status_error("anthropic", status, None, "nope".into()) {
                ProviderError::AuthenticationFailed(msg) => {
                    assert!(msg.contains("anthropic"));
                    assert!(msg.contains(&status.to_string()));
                }
                other => panic!("expected AuthenticationFailed, got {other:?}"),
            }
        }
    }

    #[test]
    fn other_statuses_keep_the_body() {
        match status_error("groq", 500, None, "upstream exploded".into()) {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }
}
