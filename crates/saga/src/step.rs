//! Per-step results recorded while a saga runs.

use serde::Serialize;

/// How a forward step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Completed,
    Failed(String),
}

/// One forward step of a saga and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaStepResult {
    pub step_name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produced_id: Option<String>,
}

impl SagaStepResult {
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// How a compensating action ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CompensationStatus {
    Compensated,
    /// The action failed and the effect it should have undone is still in
    /// place. Needs manual intervention.
    Failed(String),
}

/// Result of invoking one compensating action during an unwind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationResult {
    pub step_name: String,
    pub status: CompensationStatus,
}

impl CompensationResult {
    pub fn is_compensated(&self) -> bool {
        self.status == CompensationStatus::Compensated
    }
}

/// Ordered log of forward steps for one attempt.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    steps: Vec<SagaStepResult>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&mut self, step: &str, produced_id: impl Into<String>) {
        self.steps.push(SagaStepResult {
            step_name: step.to_string(),
            status: StepStatus::Completed,
            produced_id: Some(produced_id.into()),
        });
    }

    pub fn failed(&mut self, step: &str, reason: impl Into<String>) {
        self.steps.push(SagaStepResult {
            step_name: step.to_string(),
            status: StepStatus::Failed(reason.into()),
            produced_id: None,
        });
    }

    pub fn into_steps(self) -> Vec<SagaStepResult> {
        self.steps
    }
}
