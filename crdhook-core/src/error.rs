use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Malformed {expected} resource: {message}")]
    MalformedResource {
        expected: String,
        message: String,
    },

    #[error("Occurrence window out of range: {0}")]
    OccurrenceOutOfRange(String),

    #[error("Invalid code mapping: {0}")]
    CodeMapping(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
