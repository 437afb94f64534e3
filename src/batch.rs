//! Batch executor: applies one ref action to every configured repository.
//!
//! Failures are isolated per repository. Whatever happens inside a single
//! repository's call (an API error, an `Err`, a panic, cancellation) ends up
//! as a failed [`RefActionOutcome`] in that repository's slot, and the report
//! always holds exactly one outcome per repository, in configuration order.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::{stream, FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{execute_request, RefApi};
use crate::config::Credentials;
use crate::domain::{BatchPlan, RefActionOutcome, RefActionRequest};
use crate::error::{BmrmError, Result};

/// Error text for repositories whose call had not finished when the batch was cancelled
pub const CANCELLED_MESSAGE: &str = "Cancelled before completion";

/// Ordered outcomes of one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<RefActionOutcome>,
}

impl From<Vec<RefActionOutcome>> for BatchReport {
    fn from(outcomes: Vec<RefActionOutcome>) -> Self {
        BatchReport { outcomes }
    }
}

impl BatchReport {
    pub fn outcomes(&self) -> &[RefActionOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<RefActionOutcome> {
        self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Repositories left unfinished by cancellation
    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.error_message() == Some(CANCELLED_MESSAGE))
            .count()
    }
}

/// Runs per-repository actions with bounded concurrency
///
/// With a concurrency of 1 (the default) repositories are processed one at a
/// time in list order. Higher values keep up to that many calls in flight;
/// outcomes are still delivered in list order.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    concurrency: usize,
    cancel: CancellationToken,
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(1)
    }
}

impl BatchExecutor {
    /// Create an executor; a concurrency of 0 is treated as 1
    pub fn new(concurrency: usize) -> Self {
        BatchExecutor {
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to stop the batch early
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `action` once per repository in `plan`
    ///
    /// `on_outcome` is called for each outcome as soon as it and every earlier
    /// outcome are available, so output can be printed while the batch runs.
    ///
    /// # Returns
    /// * `Ok(BatchReport)` - One outcome per repository, in plan order
    /// * `Err(BmrmError::EmptyRepositoryList)` - Plan has no repositories
    /// * `Err(BmrmError::MissingCredentials)` - `credentials` is `None`
    /// * `Err(BmrmError::MissingSourceRef)` - Create action without a source ref
    ///
    /// Errors are returned before `action` is ever invoked.
    pub async fn run<'a, F, Fut, S>(
        &self,
        plan: &BatchPlan,
        credentials: Option<&'a Credentials>,
        action: F,
        mut on_outcome: S,
    ) -> Result<BatchReport>
    where
        F: Fn(RefActionRequest, &'a Credentials) -> Fut,
        Fut: Future<Output = anyhow::Result<RefActionOutcome>>,
        S: FnMut(&RefActionOutcome),
    {
        if plan.repositories.is_empty() {
            return Err(BmrmError::EmptyRepositoryList);
        }
        let credentials = credentials.ok_or(BmrmError::MissingCredentials)?;
        plan.action.validate()?;

        info!(
            action = %plan.action.kind,
            ref_name = %plan.action.ref_name,
            repositories = plan.repositories.len(),
            concurrency = self.concurrency,
            "starting batch"
        );

        let action = &action;
        let mut outcomes = Vec::with_capacity(plan.repositories.len());
        let mut results = stream::iter(plan.requests())
            .map(|request| {
                let repository = request.repository.clone();
                // `action` is called inside the guarded future so a panic before
                // its first await is caught too
                let call =
                    AssertUnwindSafe(async move { action(request, credentials).await }).catch_unwind();
                let cancel = self.cancel.clone();
                async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            RefActionOutcome::failure(repository, CANCELLED_MESSAGE)
                        }
                        result = call => match result {
                            Ok(Ok(outcome)) => outcome,
                            Ok(Err(e)) => RefActionOutcome::failure(repository, format!("{:#}", e)),
                            Err(panic) => RefActionOutcome::failure(
                                repository,
                                format!("Unexpected failure: {}", panic_message(panic.as_ref())),
                            ),
                        },
                    }
                }
            })
            .buffered(self.concurrency);

        while let Some(outcome) = results.next().await {
            if !outcome.succeeded() {
                warn!(
                    repository = %outcome.repository(),
                    error = outcome.error_message().unwrap_or_default(),
                    "repository action failed"
                );
            }
            on_outcome(&outcome);
            outcomes.push(outcome);
        }

        let report = BatchReport { outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch finished"
        );
        Ok(report)
    }

    /// Run the plan's action against `api` for every repository
    pub async fn run_with_api<S>(
        &self,
        plan: &BatchPlan,
        credentials: Option<&Credentials>,
        api: &dyn RefApi,
        on_outcome: S,
    ) -> Result<BatchReport>
    where
        S: FnMut(&RefActionOutcome),
    {
        self.run(
            plan,
            credentials,
            |request, credentials| async move {
                Ok::<_, anyhow::Error>(execute_request(api, &request, credentials).await)
            },
            on_outcome,
        )
        .await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
