use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No {resource_type} matched {query}")]
    NotFound {
        resource_type: String,
        query: String,
    },

    #[error("{}", transport_message(.status, .status_text, .diagnostics))]
    Transport {
        status: u16,
        status_text: String,
        diagnostics: Option<String>,
    },

    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

fn transport_message(status: &u16, status_text: &str, diagnostics: &Option<String>) -> String {
    match diagnostics {
        Some(d) => format!("HTTP {} {}: {}", status, status_text, d),
        None => format!("HTTP {} {}", status, status_text),
    }
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
