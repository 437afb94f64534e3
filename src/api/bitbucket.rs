use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::json;
use tracing::{debug, warn};

use crate::api::{parse_error_body, parse_success_body, RefApi};
use crate::config::{Config, Credentials};
use crate::domain::{RefActionOutcome, RefDetails, RefKind, RepositoryId};
use crate::error::{BmrmError, Result};

/// Bitbucket Cloud REST client for the `refs` endpoints
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: Client,
    base_url: String,
}

impl BitbucketClient {
    /// Create a client for `base_url` (e.g. `https://api.bitbucket.org/2.0`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("bmrm/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| BmrmError::config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.trim_end_matches('/');
        Url::parse(base_url)
            .map_err(|e| BmrmError::config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        Ok(BitbucketClient {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/repositories/{repo}/refs/{branches|tags}`
    pub fn refs_url(&self, kind: RefKind, repository: &RepositoryId) -> String {
        format!(
            "{}/repositories/{}/refs/{}",
            self.base_url,
            repository,
            kind.path_segment()
        )
    }

    /// `{base}/repositories/{repo}/refs/{branches|tags}/{ref_name}`
    ///
    /// Each `/`-separated part of `ref_name` is percent-encoded as a path
    /// segment, so `#`, `?`, `%` and spaces stay part of the name.
    pub fn ref_url(&self, kind: RefKind, repository: &RepositoryId, ref_name: &str) -> Result<Url> {
        let refs_url = self.refs_url(kind, repository);
        let mut url = Url::parse(&refs_url)
            .map_err(|e| BmrmError::config(format!("Invalid ref URL '{}': {}", refs_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| BmrmError::config(format!("API base URL cannot hold a path: {}", refs_url)))?
            .extend(ref_name.split('/'));
        Ok(url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        kind: RefKind,
        repository: &RepositoryId,
    ) -> RefActionOutcome {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%repository, error = %e, "request failed before a response arrived");
                return RefActionOutcome::failure(repository.clone(), describe_transport_error(&e));
            }
        };

        let status = response.status();
        debug!(%repository, %status, url = %response.url(), "received response");

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                warn!(%repository, error = %e, "could not read success response body");
                return RefActionOutcome::success(repository.clone(), RefDetails::default());
            }
            Err(e) => {
                return RefActionOutcome::failure(repository.clone(), describe_transport_error(&e));
            }
        };

        if status.is_success() {
            RefActionOutcome::success(repository.clone(), parse_success_body(kind, &body))
        } else {
            RefActionOutcome::failure(repository.clone(), parse_error_body(status.as_u16(), &body))
        }
    }
}

#[async_trait]
impl RefApi for BitbucketClient {
    async fn create_ref(
        &self,
        kind: RefKind,
        repository: &RepositoryId,
        ref_name: &str,
        source_ref: &str,
        credentials: &Credentials,
    ) -> RefActionOutcome {
        let url = self.refs_url(kind, repository);
        debug!(method = "POST", %url, ref_name, source_ref, "creating {}", kind.noun());

        let request = self
            .http
            .post(&url)
            .basic_auth(&credentials.username, Some(&credentials.app_password))
            .json(&json!({
                "name": ref_name,
                "target": { "hash": source_ref },
            }));

        self.send(request, kind, repository).await
    }

    async fn delete_ref(
        &self,
        kind: RefKind,
        repository: &RepositoryId,
        ref_name: &str,
        credentials: &Credentials,
    ) -> RefActionOutcome {
        let url = match self.ref_url(kind, repository, ref_name) {
            Ok(url) => url,
            Err(e) => return RefActionOutcome::failure(repository.clone(), e.to_string()),
        };
        debug!(method = "DELETE", %url, "deleting {}", kind.noun());

        let request = self
            .http
            .delete(url)
            .basic_auth(&credentials.username, Some(&credentials.app_password));

        self.send(request, kind, repository).await
    }
}

/// Error text including the underlying causes (DNS, TLS, timeout...)
fn describe_transport_error(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn repo(s: &str) -> RepositoryId {
        RepositoryId::parse(s).unwrap()
    }

    fn creds() -> Credentials {
        Credentials::new("user", "pass")
    }

    /// Accept one connection, reply with `status` and `body`, return the raw request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];

            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before the request headers ended");
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&request[..header_end]).to_string();
            let content_length = header_value(&head, "content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = if body.is_empty() {
                format!("HTTP/1.1 {}\r\nconnection: close\r\n\r\n", status)
            } else {
                format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
            };
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8(request).unwrap()
        });

        (base_url, handle)
    }

    fn header_value(request: &str, name: &str) -> Option<String> {
        request.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    fn request_line(request: &str) -> &str {
        request.lines().next().unwrap_or("")
    }

    fn request_body(request: &str) -> &str {
        request.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
    }

    #[test]
    fn test_refs_url() {
        let client =
            BitbucketClient::new("https://api.bitbucket.org/2.0/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://api.bitbucket.org/2.0");
        assert_eq!(
            client.refs_url(RefKind::Branch, &repo("org/a")),
            "https://api.bitbucket.org/2.0/repositories/org/a/refs/branches"
        );
        assert_eq!(
            client.refs_url(RefKind::Tag, &repo("org/b")),
            "https://api.bitbucket.org/2.0/repositories/org/b/refs/tags"
        );
    }

    #[test]
    fn test_from_config_uses_base_url() {
        let config = Config {
            api_base_url: "http://localhost:9999".to_string(),
            ..Config::default()
        };
        let client = BitbucketClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9999");
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_failed_outcome() {
        // Nothing listens on the local discard port.
        let client = BitbucketClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let outcome = client
            .delete_ref(
                RefKind::Branch,
                &repo("org/a"),
                "feature/x",
                &Credentials::new("user", "pass"),
            )
            .await;
        assert!(!outcome.succeeded());
        assert!(!outcome.error_message().unwrap_or("").is_empty());
    }

    #[test]
    fn test_ref_url_encodes_reserved_characters() {
        let client =
            BitbucketClient::new("https://api.bitbucket.org/2.0", Duration::from_secs(5)).unwrap();
        let url = |name: &str| {
            client
                .ref_url(RefKind::Branch, &repo("org/a"), name)
                .unwrap()
                .to_string()
        };
        assert_eq!(
            url("fix#12"),
            "https://api.bitbucket.org/2.0/repositories/org/a/refs/branches/fix%2312"
        );
        assert!(url("release 1?").ends_with("/refs/branches/release%201%3F"));
        assert!(url("50%off").ends_with("/refs/branches/50%25off"));
        assert!(url("feature/x").ends_with("/refs/branches/feature/x"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = BitbucketClient::new("not a url", Duration::from_secs(5)).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_create_ref_sends_post_with_auth_and_body() {
        let (base_url, server) = serve_once(
            "201 Created",
            r#"{"name":"feature/x","target":{"hash":"0a1b2c3d","author":{"raw":"Jane Doe <jane@example.com>"}}}"#,
        )
        .await;
        let client = BitbucketClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let outcome = client
            .create_ref(RefKind::Branch, &repo("org/a"), "feature/x", "main", &creds())
            .await;
        let request = server.await.unwrap();

        assert_eq!(
            request_line(&request),
            "POST /repositories/org/a/refs/branches HTTP/1.1"
        );
        assert_eq!(
            header_value(&request, "authorization").as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
        let body: serde_json::Value = serde_json::from_str(request_body(&request)).unwrap();
        assert_eq!(body, json!({"name": "feature/x", "target": {"hash": "main"}}));

        assert!(outcome.succeeded());
        assert_eq!(outcome.commit_hash(), Some("0a1b2c3d"));
        assert_eq!(outcome.commit_author(), Some("Jane Doe <jane@example.com>"));
    }

    #[tokio::test]
    async fn test_create_ref_error_body_becomes_failure() {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"type":"error","error":{"message":"Branch already exists"}}"#,
        )
        .await;
        let client = BitbucketClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let outcome = client
            .create_ref(RefKind::Branch, &repo("org/a"), "feature/x", "main", &creds())
            .await;
        server.await.unwrap();

        assert!(!outcome.succeeded());
        assert_eq!(outcome.error_message(), Some("Branch already exists"));
    }

    #[tokio::test]
    async fn test_delete_ref_sends_delete_and_accepts_no_content() {
        let (base_url, server) = serve_once("204 No Content", "").await;
        let client = BitbucketClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let outcome = client
            .delete_ref(RefKind::Tag, &repo("org/b"), "v1.0.0", &creds())
            .await;
        let request = server.await.unwrap();

        assert_eq!(
            request_line(&request),
            "DELETE /repositories/org/b/refs/tags/v1.0.0 HTTP/1.1"
        );
        assert_eq!(
            header_value(&request, "authorization").as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn test_delete_ref_keeps_hash_in_branch_name() {
        let (base_url, server) = serve_once("204 No Content", "").await;
        let client = BitbucketClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let outcome = client
            .delete_ref(RefKind::Branch, &repo("org/a"), "fix#12", &creds())
            .await;
        let request = server.await.unwrap();

        assert_eq!(
            request_line(&request),
            "DELETE /repositories/org/a/refs/branches/fix%2312 HTTP/1.1"
        );
        assert!(outcome.succeeded());
    }
}
