//! Batch processing (each record independent)

use crdhook_core::IntakeRecord;
use serde::Serialize;

use crate::orchestrator::{Orchestrator, RecordOutcome};
use crate::report::RecordReport;

/// Outcomes for a whole batch, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn report(&self) -> BatchReport {
        BatchReport {
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            results: self
                .outcomes
                .iter()
                .enumerate()
                .map(|(i, outcome)| RecordReport::new(i + 1, outcome))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<RecordReport>,
}

/// Process every record in order. A failed record never stops the batch.
pub async fn process_batch(orchestrator: &Orchestrator, records: &[IntakeRecord]) -> BatchOutcome {
    let mut outcomes = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        tracing::info!(index = i + 1, total = records.len(), "Processing record");
        outcomes.push(orchestrator.process(record).await);
    }

    let outcome = BatchOutcome { outcomes };
    tracing::info!(
        total = outcome.total(),
        succeeded = outcome.succeeded(),
        failed = outcome.failed(),
        "Batch finished"
    );
    outcome
}
