//! Bitbucket ref API abstraction layer
//!
//! This module provides a trait-based abstraction over the Bitbucket Cloud
//! ref endpoints, allowing the batch executor to run against the real API or
//! a mock in tests.
//!
//! - [bitbucket::BitbucketClient]: real implementation using `reqwest`
//! - [mock::MockRefApi]: scripted implementation for testing
//!
//! Implementations never return errors: every call yields a
//! [RefActionOutcome], successful or failed.

pub mod bitbucket;
pub mod mock;

pub use bitbucket::BitbucketClient;
pub use mock::MockRefApi;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Credentials;
use crate::domain::{RefActionOutcome, RefActionRequest, RefDetails, RefKind, RepositoryId};

/// Ref operations against one repository
///
/// All implementors must be `Send + Sync` so calls for several repositories
/// can be in flight at once.
#[async_trait]
pub trait RefApi: Send + Sync {
    /// Create a branch or tag named `ref_name` pointing at `source_ref`
    ///
    /// `source_ref` is a branch name or a commit hash.
    async fn create_ref(
        &self,
        kind: RefKind,
        repository: &RepositoryId,
        ref_name: &str,
        source_ref: &str,
        credentials: &Credentials,
    ) -> RefActionOutcome;

    /// Delete the branch or tag named `ref_name`
    async fn delete_ref(
        &self,
        kind: RefKind,
        repository: &RepositoryId,
        ref_name: &str,
        credentials: &Credentials,
    ) -> RefActionOutcome;
}

/// Dispatch a request to the matching [RefApi] call
pub async fn execute_request(
    api: &dyn RefApi,
    request: &RefActionRequest,
    credentials: &Credentials,
) -> RefActionOutcome {
    let kind = request.kind.ref_kind();
    if !request.kind.is_create() {
        return api
            .delete_ref(kind, &request.repository, &request.ref_name, credentials)
            .await;
    }

    match request.source_ref.as_deref() {
        Some(source_ref) => {
            api.create_ref(
                kind,
                &request.repository,
                &request.ref_name,
                source_ref,
                credentials,
            )
            .await
        }
        None => RefActionOutcome::failure(
            request.repository.clone(),
            format!("Missing source ref for {}", request.kind),
        ),
    }
}

#[derive(Debug, Default, Deserialize)]
struct RefBody {
    #[serde(default)]
    target: Option<TargetBody>,
    #[serde(default)]
    links: Option<LinksBody>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetBody {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    author: Option<AuthorBody>,
    #[serde(default)]
    links: Option<LinksBody>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorBody {
    #[serde(default)]
    raw: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksBody {
    #[serde(default)]
    html: Option<HrefBody>,
}

#[derive(Debug, Default, Deserialize)]
struct HrefBody {
    #[serde(default)]
    href: Option<String>,
}

impl LinksBody {
    fn html_href(self) -> Option<String> {
        self.html.and_then(|html| html.href)
    }
}

/// Extract commit details from a 2xx response body
///
/// Missing fields are left empty; an empty or non-JSON body yields empty details.
/// Only tags carry `tag_link` (the outer `links.html.href`).
pub fn parse_success_body(kind: RefKind, body: &str) -> RefDetails {
    let parsed: RefBody = if body.trim().is_empty() {
        RefBody::default()
    } else {
        serde_json::from_str(body).unwrap_or_default()
    };

    let target = parsed.target.unwrap_or_default();
    RefDetails {
        commit_hash: target.hash,
        commit_author: target.author.and_then(|a| a.raw),
        commit_link: target.links.and_then(LinksBody::html_href),
        tag_link: match kind {
            RefKind::Tag => parsed.links.and_then(LinksBody::html_href),
            RefKind::Branch => None,
        },
    }
}

/// Extract a human-readable error message from a non-2xx response
///
/// Priority:
/// 1. `error.message` from the JSON body
/// 2. The raw body (pretty-printed when it is JSON)
/// 3. A generic message naming the status code
pub fn parse_error_body(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("Request failed with status code {}", status);
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => {
            let message = value
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .filter(|m| !m.trim().is_empty());
            match message {
                Some(message) => message.to_string(),
                None => serde_json::to_string_pretty(&value).unwrap_or_else(|_| trimmed.to_string()),
            }
        }
        Err(_) => trimmed.to_string(),
    }
}
