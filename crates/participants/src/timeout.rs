//! Per-call deadline for participant calls.

use std::future::Future;
use std::time::Duration;

use crate::error::ParticipantError;

/// Default deadline for a single participant call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by the coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Deadline applied to every prepare, commit, abort, execute and compensate.
    ///
    /// An attempt is bounded by the sum of its call deadlines.
    pub call_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Runs a participant call under a deadline.
///
/// An elapsed deadline is reported as [`ParticipantError::Timeout`], which the
/// coordinators treat like any other transport failure.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, ParticipantError>
where
    F: Future<Output = Result<T, ParticipantError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ParticipantError::Timeout(timeout)),
    }
}
