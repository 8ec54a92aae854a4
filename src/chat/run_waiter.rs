//! Timed, cancellable wait on an assistant run.
//!
//! Status checks are issued at a bounded interval until the run reaches a terminal
//! status, the deadline passes, or the cancellation token fires. The caller gets a
//! tagged [`RunOutcome`] and decides how to report it.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::llm::provider::{AssistantsApi, RunStatus};
use crate::types::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Provider reported a terminal failure status
    Failed(RunStatus),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub deadline: Instant,
}

impl WaitOptions {
    pub fn with_timeout(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            deadline: Instant::now() + timeout,
        }
    }
}

pub async fn wait_for_run<A>(
    api: &A,
    thread_id: &str,
    run_id: &str,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> AppResult<RunOutcome>
where
    A: AssistantsApi + ?Sized,
{
    let mut checks = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        if Instant::now() >= options.deadline {
            warn!(thread_id, run_id, checks, "Run did not finish before the deadline");
            return Ok(RunOutcome::TimedOut);
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
            _ = sleep_until(options.deadline) => {
                warn!(thread_id, run_id, checks, "Run did not finish before the deadline");
                return Ok(RunOutcome::TimedOut);
            }
            run = api.retrieve_run(thread_id, run_id) => run?.status,
        };
        checks += 1;
        debug!(thread_id, run_id, status = %status, checks, "Polled run status");

        if status == RunStatus::Completed {
            return Ok(RunOutcome::Completed);
        }
        if status.is_failure() {
            warn!(thread_id, run_id, status = %status, "Run ended without completing");
            return Ok(RunOutcome::Failed(status));
        }

        let next_check = (Instant::now() + options.poll_interval).min(options.deadline);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
            _ = sleep_until(next_check) => {}
        }
    }
}
