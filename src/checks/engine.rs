// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Concurrent check engine
//!
//! Every check of a batch runs on its own task and is retried according to
//! its [`RetryOpts`](super::RetryOpts). The batch completes when all checks
//! finish; failures are aggregated into a single [`ChecksFailed`]. Batches of
//! one event run in order and stop at the first failing batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use miette::Diagnostic;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::select::{post_checks, pre_checks, CheckBatch, EventPhase};
use super::{Check, CheckError, CheckType};
use crate::config::PlatformConfig;
use crate::errors::{StagehandError, StagehandResult};
use crate::kube::Providers;
use crate::stages::StageMap;

const MIN_BACKOFF_SECS: u64 = 10;
const MAX_BACKOFF_SECS: u64 = 60;
const MAX_BACKOFF_DOUBLINGS: u32 = 3;

/// Outcome of one check after all of its attempts
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub id: String,
    pub check_type: CheckType,
    pub stage: String,
    pub event: String,
    /// Last error, `None` on success
    pub error: Option<CheckError>,
    /// Attempts actually made
    pub attempts: u32,
    pub duration: Duration,
}

impl CheckResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Progress callbacks
///
/// Called from the check tasks, so implementations must be thread-safe.
pub trait CheckObserver: Send + Sync {
    fn on_start(&self, _check: &dyn Check, _stage: &str, _event: &str) {}

    /// A failed attempt is about to be retried; `attempt` is the failed one
    fn on_retry(&self, _check: &dyn Check, _attempt: u32, _error: &CheckError) {}

    fn on_complete(&self, _result: &CheckResult) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CheckObserver for NoopObserver {}

/// One failed check in an aggregated failure
#[derive(Error, Debug, Clone, Diagnostic)]
#[error("{check_type} check '{id}' ({stage}, event '{event}'): {cause}")]
#[diagnostic(code(stagehand::check_failed))]
pub struct FailedCheck {
    pub id: String,
    pub check_type: CheckType,
    pub stage: String,
    pub event: String,
    pub cause: CheckError,
}

/// All failures of a batch run
#[derive(Error, Debug, Diagnostic)]
#[error("{} of {} checks failed", .failures.len(), .results.len())]
#[diagnostic(
    code(stagehand::checks_failed),
    help("Each failing check is listed below with its last error")
)]
pub struct ChecksFailed {
    /// Every result, passing ones included
    pub results: Vec<CheckResult>,
    #[related]
    pub failures: Vec<FailedCheck>,
}

impl ChecksFailed {
    pub fn new(results: Vec<CheckResult>) -> Self {
        let failures = results
            .iter()
            .filter_map(|r| {
                r.error.as_ref().map(|cause| FailedCheck {
                    id: r.id.clone(),
                    check_type: r.check_type,
                    stage: r.stage.clone(),
                    event: r.event.clone(),
                    cause: cause.clone(),
                })
            })
            .collect();
        Self { results, failures }
    }
}

/// Delay before the retry following attempt `attempt` (1-based)
///
/// A zero wait means retry immediately. Otherwise the wait is raised to at
/// least 10s. The first retry waits exactly that long; later retries double
/// it up to three times, capped at 60s.
pub fn backoff_delay(wait_seconds: u64, attempt: u32) -> Duration {
    if wait_seconds == 0 {
        return Duration::ZERO;
    }
    let base = wait_seconds.max(MIN_BACKOFF_SECS);
    if attempt <= 1 {
        return Duration::from_secs(base);
    }
    let doublings = (attempt - 1).min(MAX_BACKOFF_DOUBLINGS);
    Duration::from_secs(base.saturating_mul(1 << doublings).min(MAX_BACKOFF_SECS))
}

/// Run one batch concurrently and wait for every check
///
/// Results come back in batch order. Fails with [`ChecksFailed`] when any
/// check failed, carrying all results.
pub async fn run_checks(
    config: Arc<PlatformConfig>,
    stage: &str,
    event: &str,
    batch: &[Arc<dyn Check>],
    observer: Arc<dyn CheckObserver>,
    cancel: &CancellationToken,
) -> Result<Vec<CheckResult>, ChecksFailed> {
    let tasks: Vec<_> = batch
        .iter()
        .map(|check| {
            let check = Arc::clone(check);
            let config = Arc::clone(&config);
            let observer = Arc::clone(&observer);
            let cancel = cancel.clone();
            let stage = stage.to_string();
            let event = event.to_string();
            let id = check.id();
            let check_type = check.check_type();

            let handle = tokio::spawn(async move {
                observer.on_start(check.as_ref(), &stage, &event);
                let started = Instant::now();
                let (error, attempts) =
                    run_with_retries(check.as_ref(), &config, observer.as_ref(), &cancel).await;

                let result = CheckResult {
                    id: check.id(),
                    check_type: check.check_type(),
                    stage,
                    event,
                    error,
                    attempts,
                    duration: started.elapsed(),
                };
                observer.on_complete(&result);
                result
            });
            (id, check_type, handle)
        })
        .collect();

    let (meta, handles): (Vec<_>, Vec<_>) = tasks
        .into_iter()
        .map(|(id, check_type, handle)| ((id, check_type), handle))
        .unzip();
    let joined = futures::future::join_all(handles).await;

    let mut results = Vec::with_capacity(joined.len());
    for ((id, check_type), outcome) in meta.into_iter().zip(joined) {
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(check = %id, error = %e, "check task did not complete");
                let result = CheckResult {
                    id,
                    check_type,
                    stage: stage.to_string(),
                    event: event.to_string(),
                    error: Some(CheckError::Aborted(e.to_string())),
                    attempts: 0,
                    duration: Duration::ZERO,
                };
                observer.on_complete(&result);
                result
            }
        };
        results.push(result);
    }

    if results.iter().all(CheckResult::is_success) {
        Ok(results)
    } else {
        Err(ChecksFailed::new(results))
    }
}

async fn run_with_retries(
    check: &dyn Check,
    config: &PlatformConfig,
    observer: &dyn CheckObserver,
    cancel: &CancellationToken,
) -> (Option<CheckError>, u32) {
    let opts = check.retry_opts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracing::debug!(check = %check.id(), kind = %check.check_type(), attempt, "running check");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CheckError::Cancelled),
            outcome = check.run(config) => outcome,
        };

        let error = match outcome {
            Ok(()) => return (None, attempt),
            Err(e) => e,
        };

        if error.is_permanent() || !opts.allows(attempt + 1) {
            tracing::debug!(check = %check.id(), attempt, error = %error, "check failed");
            return (Some(error), attempt);
        }

        let delay = backoff_delay(opts.wait_seconds, attempt);
        tracing::warn!(
            check = %check.id(),
            attempt,
            error = %error,
            "check failed, retrying in {}s",
            delay.as_secs()
        );
        observer.on_retry(check, attempt, &error);

        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return (Some(CheckError::Cancelled), attempt),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Run batches in order, stopping after the first batch with a failure
///
/// The error carries the results of every batch that ran.
pub async fn run_batches(
    config: Arc<PlatformConfig>,
    stage: &str,
    event: &str,
    phase: EventPhase,
    batches: Vec<CheckBatch>,
    observer: Arc<dyn CheckObserver>,
    cancel: &CancellationToken,
) -> StagehandResult<Vec<CheckResult>> {
    let mut results = Vec::new();

    for (index, batch) in batches.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(StagehandError::Cancelled {
                stage: stage.to_string(),
                event: event.to_string(),
                phase: phase.to_string(),
            });
        }

        tracing::debug!(stage, event, %phase, batch = index, checks = batch.len(), "running check batch");
        match run_checks(
            Arc::clone(&config),
            stage,
            event,
            batch,
            Arc::clone(&observer),
            cancel,
        )
        .await
        {
            Ok(batch_results) => results.extend(batch_results),
            Err(failed) => {
                results.extend(failed.results);
                return Err(ChecksFailed::new(results).into());
            }
        }
    }

    Ok(results)
}

/// Runs the checks a stage declares around an event
pub struct CheckRunner {
    config: Arc<PlatformConfig>,
    stages: StageMap,
    providers: Providers,
    observer: Arc<dyn CheckObserver>,
}

impl CheckRunner {
    pub fn new(config: Arc<PlatformConfig>, stages: StageMap, providers: Providers) -> Self {
        Self {
            config,
            stages,
            providers,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set the progress observer
    pub fn with_observer(mut self, observer: Arc<dyn CheckObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn stages(&self) -> &StageMap {
        &self.stages
    }

    /// Run the checks declared to fire before `event`
    pub async fn run_pre_checks(
        &self,
        stage_id: &str,
        event: &str,
        cancel: &CancellationToken,
    ) -> StagehandResult<Vec<CheckResult>> {
        self.run(stage_id, event, EventPhase::Before, cancel).await
    }

    /// Run the checks declared to fire after `event`
    pub async fn run_post_checks(
        &self,
        stage_id: &str,
        event: &str,
        cancel: &CancellationToken,
    ) -> StagehandResult<Vec<CheckResult>> {
        self.run(stage_id, event, EventPhase::After, cancel).await
    }

    async fn run(
        &self,
        stage_id: &str,
        event: &str,
        phase: EventPhase,
        cancel: &CancellationToken,
    ) -> StagehandResult<Vec<CheckResult>> {
        let stage = self
            .stages
            .get(stage_id)
            .ok_or_else(|| StagehandError::StageNotFound {
                stage: stage_id.to_string(),
            })?;

        let batches = match phase {
            EventPhase::Before => pre_checks(stage, event, &self.providers),
            EventPhase::After => post_checks(stage, event, &self.providers),
        };
        if batches.is_empty() {
            tracing::debug!(stage = stage_id, event, %phase, "no checks declared");
            return Ok(Vec::new());
        }

        run_batches(
            Arc::clone(&self.config),
            stage_id,
            event,
            phase,
            batches,
            Arc::clone(&self.observer),
            cancel,
        )
        .await
    }
}
