//! HTTP plumbing shared by the remote adapters.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use switchyard_types::llm::LlmError;

/// Whole-request ceiling on the client; per-attempt timeouts are enforced by
/// the dispatcher and are normally much shorter.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(300);

pub fn build_client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .build()
        .map_err(|e| LlmError::Connection(format!("failed to create HTTP client: {e}")))
}

/// Map a transport-level failure.
pub fn map_send_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            timeout_ms: CLIENT_TIMEOUT.as_millis() as u64,
        }
    } else {
        LlmError::Connection(err.to_string())
    }
}

/// Send a streaming request and fail on a non-success status before any
/// body is consumed.
pub async fn send_streaming(request: reqwest::RequestBuilder) -> Result<reqwest::Response, LlmError> {
    let response = request.send().await.map_err(map_send_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    Err(map_status(status, &headers, body))
}

/// Map a non-success HTTP status to an attempt error.
pub fn map_status(status: StatusCode, headers: &HeaderMap, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: retry_after_ms(headers),
        },
        529 => LlmError::Overloaded(body),
        400 | 404 | 413 | 422 => LlmError::InvalidRequest(format!("HTTP {status}: {body}")),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

/// `Retry-After` in seconds, as milliseconds.
pub fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs >= 0.0)
        .map(|secs| (secs * 1000.0) as u64)
}

/// Raw HTTP/1.1 response with a correct content length.
#[cfg(test)]
pub(crate) fn http_response(status_line: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// One-shot HTTP server answering the first connection with a canned
/// response.
#[cfg(test)]
pub(crate) async fn serve_once(raw_response: impl Into<String>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let raw_response = raw_response.into();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 64 * 1024];
        let mut read = Vec::new();
        // Read until the end of the request headers plus the declared body.
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            read.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&read);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if read.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        socket.write_all(raw_response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{addr}")
}
