//! Result reporting: turns the terminal state of an attempt into the single
//! outcome record handed back to the caller.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::request::Resource;
use crate::types::AttemptId;

/// Status code reported for an attempt that reached its success state.
pub const STATUS_OK: u16 = 200;

/// Status code reported for every failed attempt.
pub const STATUS_FAILED: u16 = 500;

/// Measures elapsed time since the start of an attempt.
///
/// Backed by the tokio clock so paused-time tests see injected latency.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    /// Every phase or step completed.
    Succeeded,
    /// The attempt stopped at the named phase or step.
    Failed { at: &'static str, reason: String },
}

impl TerminalState {
    pub fn failed(at: &'static str, reason: impl Into<String>) -> Self {
        TerminalState::Failed {
            at,
            reason: reason.into(),
        }
    }
}

/// Final state of one resource manager in a two-phase commit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason")]
pub enum ResourceStatus {
    NotAttempted,
    Prepared,
    PrepareFailed(String),
    PrepareException(String),
    Committed,
    CommitFailed(String),
    CommitException(String),
    Aborted,
    AbortFailed(String),
}

/// Outcome record returned to the caller of a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub attempt_id: AttemptId,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
    pub elapsed_milliseconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_resource_status: Option<BTreeMap<Resource, ResourceStatus>>,
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// Attaches the per-resource report of a two-phase commit attempt.
    pub fn with_resource_status(mut self, statuses: BTreeMap<Resource, ResourceStatus>) -> Self {
        self.per_resource_status = Some(statuses);
        self
    }
}

/// Shapes the outcome record for an attempt. Has no side effects.
pub fn report(attempt_id: AttemptId, terminal: TerminalState, elapsed: Duration) -> TransactionOutcome {
    let elapsed_milliseconds = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match terminal {
        TerminalState::Succeeded => TransactionOutcome {
            attempt_id,
            status_code: STATUS_OK,
            failed_at: None,
            elapsed_milliseconds,
            error: None,
            per_resource_status: None,
        },
        TerminalState::Failed { at, reason } => TransactionOutcome {
            attempt_id,
            status_code: STATUS_FAILED,
            failed_at: Some(at.to_string()),
            elapsed_milliseconds,
            error: Some(reason),
            per_resource_status: None,
        },
    }
}
