//! LIFO stack of compensating actions.

use std::future::Future;

use futures_util::future::BoxFuture;
use participants::ParticipantError;

use crate::step::{CompensationResult, CompensationStatus};

/// A deferred undo for one completed forward step.
pub type CompensatingAction =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ParticipantError>> + Send>;

struct Entry {
    step: &'static str,
    action: CompensatingAction,
}

/// Compensating actions registered by completed forward steps.
///
/// Actions are pushed after their step succeeds and run newest first when
/// the saga unwinds. `unwind` consumes the stack, so each action is invoked
/// at most once.
#[derive(Default)]
pub struct CompensationStack {
    entries: Vec<Entry>,
}

impl CompensationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the undo for `step`.
    pub fn push<F, Fut>(&mut self, step: &'static str, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ParticipantError>> + Send + 'static,
    {
        self.entries.push(Entry {
            step,
            action: Box::new(move || Box::pin(action())),
        });
    }

    /// Step names in the order they would be compensated.
    pub fn pending(&self) -> Vec<&'static str> {
        self.entries.iter().rev().map(|e| e.step).collect()
    }

    /// Invokes every action, newest first.
    ///
    /// A failing action is logged and reported but does not stop the unwind.
    pub async fn unwind(mut self) -> Vec<CompensationResult> {
        let mut results = Vec::with_capacity(self.entries.len());

        while let Some(Entry { step, action }) = self.entries.pop() {
            tracing::info!(step, "compensation started");
            let status = match action().await {
                Ok(()) => {
                    tracing::info!(step, "compensation completed");
                    CompensationStatus::Compensated
                }
                Err(err) => {
                    metrics::counter!("saga_compensations_failed_total").increment(1);
                    tracing::error!(
                        step,
                        error = %err,
                        "compensation failed; manual intervention required"
                    );
                    CompensationStatus::Failed(err.to_string())
                }
            };
            results.push(CompensationResult {
                step_name: step.to_string(),
                status,
            });
        }

        results
    }
}

impl std::fmt::Debug for CompensationStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompensationStack")
            .field("pending", &self.pending())
            .finish()
    }
}
