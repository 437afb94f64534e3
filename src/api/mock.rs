use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::RefApi;
use crate::config::Credentials;
use crate::domain::{RefActionOutcome, RefDetails, RefKind, RepositoryId};

/// A call received by [MockRefApi]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: RefKind,
    pub repository: String,
    pub ref_name: String,
    /// `None` for deletes
    pub source_ref: Option<String>,
}

#[derive(Debug, Clone)]
enum Scripted {
    Success(RefDetails),
    Failure(String),
}

/// Mock ref API for testing without network access
///
/// Repositories without a scripted response succeed with empty details.
#[derive(Default)]
pub struct MockRefApi {
    responses: HashMap<String, Scripted>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockRefApi {
    /// Create a mock where every call succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `repository` with a success carrying `details`
    pub fn with_success(mut self, repository: &str, details: RefDetails) -> Self {
        self.responses
            .insert(repository.to_string(), Scripted::Success(details));
        self
    }

    /// Respond to `repository` with a failure carrying `message`
    pub fn with_failure(mut self, repository: &str, message: impl Into<String>) -> Self {
        self.responses
            .insert(repository.to_string(), Scripted::Failure(message.into()));
        self
    }

    /// Delay the response for `repository`
    pub fn with_delay(mut self, repository: &str, delay: Duration) -> Self {
        self.delays.insert(repository.to_string(), delay);
        self
    }

    /// All calls received so far, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    async fn respond(&self, repository: &RepositoryId, call: RecordedCall) -> RefActionOutcome {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        if let Some(delay) = self.delays.get(repository.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        match self.responses.get(repository.as_str()) {
            Some(Scripted::Success(details)) => {
                RefActionOutcome::success(repository.clone(), details.clone())
            }
            Some(Scripted::Failure(message)) => {
                RefActionOutcome::failure(repository.clone(), message.clone())
            }
            None => RefActionOutcome::success(repository.clone(), RefDetails::default()),
        }
    }
}

#[async_trait]
impl RefApi for MockRefApi {
    async fn create_ref(
        &self,
        kind: RefKind,
        repository: &RepositoryId,
        ref_name: &str,
        source_ref: &str,
        _credentials: &Credentials,
    ) -> RefActionOutcome {
        self.respond(
            repository,
            RecordedCall {
                kind,
                repository: repository.to_string(),
                ref_name: ref_name.to_string(),
                source_ref: Some(source_ref.to_string()),
            },
        )
        .await
    }

    async fn delete_ref(
        &self,
        kind: RefKind,
        repository: &RepositoryId,
        ref_name: &str,
        _credentials: &Credentials,
    ) -> RefActionOutcome {
        self.respond(
            repository,
            RecordedCall {
                kind,
                repository: repository.to_string(),
                ref_name: ref_name.to_string(),
                source_ref: None,
            },
        )
        .await
    }
}
