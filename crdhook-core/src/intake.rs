//! Intake records as they arrive from a form or a spreadsheet row, and the
//! validated shape the orchestrator works with.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reference::ResourceType;

/// One row of intake data. Field names follow the spreadsheet column
/// vocabulary; every field is optional until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntakeRecord {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
    pub subscriber_id: Option<String>,
    pub provider_npi: Option<String>,
    pub organization_name: Option<String>,
    pub practitioner_first_name: Option<String>,
    pub practitioner_last_name: Option<String>,
    pub diagnosis_code: Option<String>,
    pub cpt_code: Option<String>,
    pub service_location: Option<String>,
}

/// Trimmed value of an optional field; blank strings count as absent.
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Organization,
    Practitioner,
}

impl ProviderKind {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ProviderKind::Organization => ResourceType::Organization,
            ProviderKind::Practitioner => ResourceType::Practitioner,
        }
    }
}

/// Who performs the order. Exactly one variant per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderIdentity {
    Organization { name: String },
    Practitioner { first: String, last: String },
}

impl ProviderIdentity {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderIdentity::Organization { .. } => ProviderKind::Organization,
            ProviderIdentity::Practitioner { .. } => ProviderKind::Practitioner,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            ProviderIdentity::Organization { name } => name.clone(),
            ProviderIdentity::Practitioner { first, last } => format!("{} {}", first, last),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub npi: String,
    pub identity: ProviderIdentity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientDetails {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub subscriber_id: Option<String>,
}

impl PatientDetails {
    /// First, middle and last name, skipping the ones not supplied.
    pub fn name_parts(&self) -> Vec<&str> {
        [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect()
    }
}

/// A record that passed validation; produced only by
/// [`crate::validation::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    pub patient: PatientDetails,
    pub provider: Provider,
    pub diagnosis_code: String,
    pub procedure_code: String,
    pub service_location: Option<String>,
}
