//! crdhook - intake records to FHIR order resources and a CRD order-sign hook call.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod intake;
pub mod orchestrator;
pub mod report;

pub use batch::{process_batch, BatchOutcome, BatchReport};
pub use config::RunnerConfig;
pub use error::{ConfigError, ErrorKind, ProcessError, Step};
pub use orchestrator::{CrdEndpoint, Orchestrator, RecordOutcome};
pub use report::{ErrorReport, RecordReport};
