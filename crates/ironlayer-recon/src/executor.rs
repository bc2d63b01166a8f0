// ironlayer-recon/src/executor.rs
// ============================================================================
// Module: Executor Interface
// Description: Abstract execution backend with bounded polling and retry.
// Purpose: Command the warehouse executor and read back outcomes.
// Dependencies: async-trait, tokio, rand, ironlayer-config
// ============================================================================

//! ## Overview
//! IronLayer never executes SQL itself; it commands an external executor
//! through this interface and reads back outcomes. Polling applies
//! exponential backoff from ten seconds up to two minutes under a hard
//! overall timeout, tolerating a bounded number of consecutive transient
//! errors. The transient-retry helper applies exponential backoff with
//! jitter for one-shot calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use ironlayer_config::ExecutorSettings;
use ironlayer_core::Plan;
use ironlayer_core::PlanStep;
use ironlayer_core::RunRecord;
use ironlayer_core::RunStatus;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Execution backend errors.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Retryable failure (throttling, 5xx, network).
    #[error("transient executor error: {0}")]
    Transient(String),
    /// Non-retryable failure.
    #[error("executor error: {0}")]
    Permanent(String),
    /// The overall polling timeout elapsed.
    #[error("polling timed out after {0} seconds")]
    PollTimeout(u64),
    /// Too many consecutive poll errors.
    #[error("gave up after {0} consecutive poll errors")]
    TooManyErrors(u32),
}

impl ExecutorError {
    /// Returns true when the error is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

// ============================================================================
// SECTION: Executor Trait
// ============================================================================

/// Abstract execution backend.
///
/// Terminal states are Success, Fail, and Cancelled; the state mapping from
/// each backend's own lifecycle is the implementor's responsibility.
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    /// Executes one step to completion and returns its record.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when submission or execution fails.
    async fn execute_step(&self, step: &PlanStep, sql: &str) -> Result<RunRecord, ExecutorError>;

    /// Submits a whole plan as one backend job preserving dependency
    /// edges, returning the backend's run identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when submission fails.
    async fn submit_plan_as_job(&self, plan: &Plan) -> Result<String, ExecutorError>;

    /// Polls the current status of a backend run.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the backend cannot be reached.
    async fn poll_status(&self, external_run_id: &str) -> Result<RunStatus, ExecutorError>;

    /// Cancels a backend run.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when cancellation fails.
    async fn cancel(&self, external_run_id: &str) -> Result<(), ExecutorError>;

    /// Fetches the backend's log output for a run.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when logs cannot be fetched.
    async fn get_logs(&self, external_run_id: &str) -> Result<String, ExecutorError>;

    /// Re-reads the authoritative status of a run for reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the backend cannot be reached.
    async fn verify_run(&self, external_run_id: &str) -> Result<RunStatus, ExecutorError>;
}

// ============================================================================
// SECTION: Polling
// ============================================================================

/// Polls a backend run until it reaches a terminal state.
///
/// Backoff doubles from the configured initial delay up to the cap. The
/// overall timeout is a hard ceiling, and consecutive transient errors
/// beyond the configured cap abort the poll.
///
/// # Errors
///
/// Returns [`ExecutorError::PollTimeout`], [`ExecutorError::TooManyErrors`],
/// or the first permanent backend error.
pub async fn poll_until_terminal<E: PlanExecutor>(
    executor: &E,
    external_run_id: &str,
    settings: &ExecutorSettings,
) -> Result<RunStatus, ExecutorError> {
    let started = tokio::time::Instant::now();
    let timeout = Duration::from_secs(settings.poll_timeout_seconds);
    let mut backoff = Duration::from_secs(settings.poll_initial_backoff_seconds);
    let max_backoff = Duration::from_secs(settings.poll_max_backoff_seconds);
    let mut consecutive_errors = 0u32;

    loop {
        match executor.poll_status(external_run_id).await {
            Ok(status) if status.is_terminal() => return Ok(status),
            Ok(_) => {
                consecutive_errors = 0;
            }
            Err(err) if err.is_transient() => {
                consecutive_errors += 1;
                warn!(
                    external_run_id,
                    consecutive_errors,
                    error = %err,
                    "transient poll error"
                );
                if consecutive_errors >= settings.max_consecutive_errors {
                    return Err(ExecutorError::TooManyErrors(consecutive_errors));
                }
            }
            Err(err) => return Err(err),
        }

        if started.elapsed() + backoff > timeout {
            return Err(ExecutorError::PollTimeout(settings.poll_timeout_seconds));
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

// ============================================================================
// SECTION: Transient Retry
// ============================================================================

/// Retries a transient-failing operation with exponential backoff and
/// jitter.
///
/// Delays double from the configured base up to the cap, with up to one
/// second of random jitter added to each delay to avoid thundering herds.
/// Permanent errors surface immediately.
///
/// # Errors
///
/// Returns the last error once the attempt budget is spent, or the first
/// permanent error.
pub async fn retry_transient<T, F, Fut>(
    settings: &ExecutorSettings,
    mut operation: F,
) -> Result<T, ExecutorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExecutorError>>,
{
    let mut delay = Duration::from_secs(settings.retry_base_seconds);
    let max_delay = Duration::from_secs(settings.retry_max_seconds);
    let mut last_error = None;

    for attempt in 0..settings.retry_max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                warn!(attempt, error = %err, "transient executor error; retrying");
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }

        if attempt + 1 < settings.retry_max_attempts {
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
            tokio::time::sleep(delay + jitter).await;
            delay = (delay * 2).min(max_delay);
        }
    }

    Err(last_error.unwrap_or_else(|| ExecutorError::Permanent("retry budget spent".to_string())))
}
