//! JSON rendering of record outcomes for the CLI.

use crdhook_core::OperationOutcome;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, ProcessError, Step};
use crate::orchestrator::RecordOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub step: Step,
    pub message: String,
    /// Present for validation failures, one issue per violation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_outcome: Option<OperationOutcome>,
}

impl From<&ProcessError> for ErrorReport {
    fn from(error: &ProcessError) -> Self {
        let operation_outcome = match error {
            ProcessError::Validation(report) => Some(OperationOutcome::from(report)),
            _ => None,
        };
        Self {
            kind: error.kind(),
            step: error.step(),
            message: error.to_string(),
            operation_outcome,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReport {
    /// Position in the input, starting at 1.
    pub record: usize,
    pub status: Status,
    pub references: Vec<String>,
    pub created: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crd_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl RecordReport {
    pub fn new(record: usize, outcome: &RecordOutcome) -> Self {
        let (status, crd_response, error) = match &outcome.result {
            Ok(response) => (Status::Succeeded, Some(response.clone()), None),
            Err(e) => (Status::Failed, None, Some(ErrorReport::from(e))),
        };
        Self {
            record,
            status,
            references: outcome.references.iter().map(ToString::to_string).collect(),
            created: outcome.created.iter().map(ToString::to_string).collect(),
            notes: outcome.notes.clone(),
            crd_response,
            error,
        }
    }
}
