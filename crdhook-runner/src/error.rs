use crdhook_client::ClientError;
use crdhook_core::{CoreError, ValidationReport};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stages of processing one intake record, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Validate,
    ResolvePatient,
    CreatePatient,
    ResolveProvider,
    ResolveLocation,
    CreateEncounter,
    CreateCondition,
    ResolveCoverage,
    CreateServiceRequest,
    AssemblePrefetch,
    InvokeCrdHook,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Validate => "VALIDATE",
            Step::ResolvePatient => "RESOLVE_PATIENT",
            Step::CreatePatient => "CREATE_PATIENT",
            Step::ResolveProvider => "RESOLVE_PROVIDER",
            Step::ResolveLocation => "RESOLVE_LOCATION",
            Step::CreateEncounter => "CREATE_ENCOUNTER",
            Step::CreateCondition => "CREATE_CONDITION",
            Step::ResolveCoverage => "RESOLVE_COVERAGE",
            Step::CreateServiceRequest => "CREATE_SERVICE_REQUEST",
            Step::AssemblePrefetch => "ASSEMBLE_PREFETCH",
            Step::InvokeCrdHook => "INVOKE_CRD_HOOK",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Transport,
}

/// Why one record stopped short of the CRD response.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationReport),

    #[error("{step} failed: {source}")]
    Client {
        step: Step,
        #[source]
        source: ClientError,
    },

    /// The order's occurrence window cannot be computed from the configured policy.
    #[error("{}", .0)]
    Occurrence(#[source] CoreError),

    /// The server answered with something that is not the expected resource.
    #[error("{step} failed: {source}")]
    UnexpectedResponse {
        step: Step,
        #[source]
        source: CoreError,
    },
}

impl ProcessError {
    pub fn at(step: Step) -> impl FnOnce(ClientError) -> ProcessError {
        move |source| ProcessError::Client { step, source }
    }

    pub fn step(&self) -> Step {
        match self {
            ProcessError::Validation(_) | ProcessError::Occurrence(_) => Step::Validate,
            ProcessError::Client { step, .. } | ProcessError::UnexpectedResponse { step, .. } => {
                *step
            }
        }
    }

    /// Connection failures and malformed responses count as transport errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::Validation(_) | ProcessError::Occurrence(_) => ErrorKind::Validation,
            ProcessError::Client { source, .. } if source.is_not_found() => ErrorKind::NotFound,
            ProcessError::Client { .. } | ProcessError::UnexpectedResponse { .. } => {
                ErrorKind::Transport
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
