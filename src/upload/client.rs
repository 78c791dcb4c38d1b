//! Client for the remote analysis service.
//!
//! The service takes one multipart field named `file` and answers with the
//! JSON payload the dashboard is built from. Its internals are opaque here.

use super::error::UploadError;
use crate::models::AnalysisPayload;
use futures::future::{BoxFuture, FutureExt};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

/// Failures talking to the analysis service.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Analysis service error {0}: {1}")]
    Status(u16, String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<BackendError> for UploadError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(_) | BackendError::Status(..) => UploadError::Connectivity,
            BackendError::Malformed(_) => UploadError::MalformedResponse,
        }
    }
}

/// Something that can turn an uploaded file into an analysis payload.
pub trait AnalysisBackend: Send + Sync {
    /// Where submissions go, for logging and report metadata.
    fn endpoint(&self) -> &str;

    /// Submit one file and wait for the parsed payload.
    fn analyze<'a>(
        &'a self,
        file_name: &'a str,
        contents: Vec<u8>,
    ) -> BoxFuture<'a, Result<AnalysisPayload, BackendError>>;
}

/// Parse and validate a response body.
pub fn parse_payload(body: &str) -> Result<AnalysisPayload, BackendError> {
    let payload: AnalysisPayload =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    payload.validate().map_err(BackendError::Malformed)?;
    Ok(payload)
}

/// Settings for the HTTP client.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub endpoint: String,
    /// Request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl From<&crate::config::ServiceConfig> for ServiceSettings {
    fn from(config: &crate::config::ServiceConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: config.timeout_seconds.map(Duration::from_secs),
        }
    }
}

/// `reqwest`-backed analysis service client.
pub struct HttpAnalysisClient {
    http_client: reqwest::Client,
    settings: ServiceSettings,
}

impl HttpAnalysisClient {
    pub fn new(settings: ServiceSettings) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        info!("Analysis service endpoint: {}", settings.endpoint);

        Ok(Self {
            http_client,
            settings,
        })
    }

    #[cfg(test)]
    fn with_client(settings: ServiceSettings, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            settings,
        }
    }

    async fn submit(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<AnalysisPayload, BackendError> {
        debug!("Submitting {} ({} bytes)", file_name, contents.len());

        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .http_client
            .post(&self.settings.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Transport(format!(
                        "Request timed out after {:.1}s",
                        self.settings
                            .timeout
                            .map(|t| t.as_secs_f64())
                            .unwrap_or_default()
                    ))
                } else if e.is_connect() {
                    BackendError::Transport(format!(
                        "Cannot connect to analysis service at {}",
                        self.settings.endpoint
                    ))
                } else {
                    BackendError::Transport(format!("Failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Analysis service returned {}", status);
            return Err(BackendError::Status(status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to read response: {}", e)))?;

        parse_payload(&body)
    }
}

impl AnalysisBackend for HttpAnalysisClient {
    fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    fn analyze<'a>(
        &'a self,
        file_name: &'a str,
        contents: Vec<u8>,
    ) -> BoxFuture<'a, Result<AnalysisPayload, BackendError>> {
        self.submit(file_name, contents).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const VALID_BODY: &str = r#"{
        "metrics": [{"week": "w1", "override_rate": 0.2, "trust_score": 0.8, "total_cases": 5}],
        "ml_weights": {"sentiment_weight": 0.5, "skepticism_weight": -1.0},
        "rag_explanations": [],
        "top_risks": [],
        "executive_summary": "Stable."
    }"#;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Accept one connection, capture the request, answer with `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/analyze", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);

                if let Some(end) = find(&buf, b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                    if headers.contains("transfer-encoding: chunked") {
                        if buf.ends_with(b"0\r\n\r\n") {
                            break;
                        }
                        continue;
                    }
                    let length = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();

            String::from_utf8_lossy(&buf).into_owned()
        });

        (url, handle)
    }

    fn client_for(url: String) -> HttpAnalysisClient {
        let http_client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpAnalysisClient::with_client(
            ServiceSettings {
                endpoint: url,
                timeout: Some(Duration::from_secs(5)),
            },
            http_client,
        )
    }

    #[tokio::test]
    async fn test_successful_submission_sends_multipart_file() {
        let (url, server) = serve_once("200 OK", VALID_BODY).await;
        let client = client_for(url);

        let payload = client
            .analyze("decisions.csv", b"date,model_decision\n".to_vec())
            .await
            .unwrap();
        assert_eq!(payload.metrics[0].total_cases, 5);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /analyze"));
        assert!(request.contains("multipart/form-data"));
        assert!(request.contains("name=\"file\""));
        assert!(request.contains("filename=\"decisions.csv\""));
        assert!(request.contains("date,model_decision"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (url, _server) = serve_once("400 Bad Request", r#"{"detail":"missing columns"}"#).await;
        let client = client_for(url);

        let err = client.analyze("d.csv", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, BackendError::Status(400, _)));
        assert_eq!(UploadError::from(err), UploadError::Connectivity);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_malformed() {
        let (url, _server) = serve_once("200 OK", "<html>nope</html>").await;
        let client = client_for(url);

        let err = client.analyze("d.csv", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
        assert_eq!(UploadError::from(err), UploadError::MalformedResponse);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/analyze", listener.local_addr().unwrap());
        drop(listener);

        let err = client_for(url)
            .analyze("d.csv", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out_as_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/analyze", listener.local_addr().unwrap());

        // Accept and read, but never answer.
        let _server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut chunk = [0u8; 4096];
            while let Ok(n) = stream.read(&mut chunk).await {
                if n == 0 {
                    break;
                }
            }
        });

        let timeout = Duration::from_millis(200);
        let http_client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .unwrap();
        let client = HttpAnalysisClient::with_client(
            ServiceSettings {
                endpoint: url,
                timeout: Some(timeout),
            },
            http_client,
        );

        let err = client.analyze("d.csv", b"x".to_vec()).await.unwrap_err();
        match &err {
            BackendError::Transport(message) => assert!(message.contains("timed out")),
            other => panic!("expected transport error, got {:?}", other),
        }
        assert_eq!(UploadError::from(err), UploadError::Connectivity);
    }

    #[test]
    fn test_parse_payload_validates_ranges() {
        tokio_test::assert_ok!(parse_payload(VALID_BODY));

        let bad = VALID_BODY.replace("\"trust_score\": 0.8", "\"trust_score\": 80");
        assert!(matches!(parse_payload(&bad), Err(BackendError::Malformed(_))));
    }
}
