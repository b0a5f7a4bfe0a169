use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::intake::{
    present, IntakeRecord, PatientDetails, Provider, ProviderIdentity, ValidatedRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    Missing,
    Conflict,
    Format,
}

/// One problem found in an intake record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(field: &'static str, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field,
            kind,
            message: message.into(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.kind == ViolationKind::Missing
    }
}

/// Every violation found in a record, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.violations.iter().map(|v| v.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationReport {}

/// Check an intake record and turn it into a [`ValidatedRecord`].
///
/// All problems are collected; nothing here touches the network.
pub fn validate(record: &IntakeRecord) -> Result<ValidatedRecord, ValidationReport> {
    let npi = required("providerNpi", &record.provider_npi);
    let diagnosis = required("diagnosisCode", &record.diagnosis_code);
    let procedure = required("cptCode", &record.cpt_code);
    let identity = provider_identity(record);
    let date_of_birth = date_of_birth(record);

    match (npi, diagnosis, procedure, identity, date_of_birth) {
        (Ok(npi), Ok(diagnosis), Ok(procedure), Ok(identity), Ok(date_of_birth)) => {
            let owned = |field: &Option<String>| present(field).map(str::to_string);
            Ok(ValidatedRecord {
                patient: PatientDetails {
                    first_name: owned(&record.first_name),
                    middle_name: owned(&record.middle_name),
                    last_name: owned(&record.last_name),
                    date_of_birth,
                    subscriber_id: owned(&record.subscriber_id),
                },
                provider: Provider {
                    npi: npi.to_string(),
                    identity,
                },
                diagnosis_code: diagnosis.to_string(),
                procedure_code: procedure.to_string(),
                service_location: owned(&record.service_location),
            })
        }
        // At least one check failed, so the report is never empty.
        (npi, diagnosis, procedure, identity, date_of_birth) => {
            let violations = [
                npi.err(),
                diagnosis.err(),
                procedure.err(),
                identity.err(),
                date_of_birth.err(),
            ]
            .into_iter()
            .flatten()
            .collect();
            Err(ValidationReport::from_violations(violations))
        }
    }
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, Violation> {
    present(value).ok_or_else(|| {
        Violation::new(field, ViolationKind::Missing, format!("{} is required", field))
    })
}

fn date_of_birth(record: &IntakeRecord) -> Result<Option<NaiveDate>, Violation> {
    let Some(raw) = present(&record.date_of_birth) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some).map_err(|_| {
        Violation::new(
            "dateOfBirth",
            ViolationKind::Format,
            format!("dateOfBirth '{}' is not a YYYY-MM-DD date", raw),
        )
    })
}

/// Exactly one of an organization name or a full practitioner name.
fn provider_identity(record: &IntakeRecord) -> Result<ProviderIdentity, Violation> {
    let organization = present(&record.organization_name);
    let first = present(&record.practitioner_first_name);
    let last = present(&record.practitioner_last_name);

    match (organization, first, last) {
        (Some(name), None, None) => Ok(ProviderIdentity::Organization {
            name: name.to_string(),
        }),
        (None, Some(first), Some(last)) => Ok(ProviderIdentity::Practitioner {
            first: first.to_string(),
            last: last.to_string(),
        }),
        (None, None, None) => Err(Violation::new(
            "organizationName",
            ViolationKind::Missing,
            "provide either an organization name or a practitioner first and last name",
        )),
        (Some(_), _, _) => Err(Violation::new(
            "organizationName",
            ViolationKind::Conflict,
            "provide an organization name or a practitioner name, not both",
        )),
        (None, Some(_), None) => Err(Violation::new(
            "practitionerLastName",
            ViolationKind::Missing,
            "practitionerLastName is required with practitionerFirstName",
        )),
        (None, None, Some(_)) => Err(Violation::new(
            "practitionerFirstName",
            ViolationKind::Missing,
            "practitionerFirstName is required with practitionerLastName",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organization_record() -> IntakeRecord {
        IntakeRecord {
            first_name: Some("John".to_string()),
            last_name: Some("Doe".to_string()),
            date_of_birth: Some("1990-01-01".to_string()),
            subscriber_id: Some("SUB12345".to_string()),
            provider_npi: Some("1234567890".to_string()),
            organization_name: Some("City Medical Center".to_string()),
            diagnosis_code: Some("J45.909".to_string()),
            cpt_code: Some("99213".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_organization_record() {
        let validated = validate(&organization_record()).unwrap();
        assert_eq!(validated.provider.npi, "1234567890");
        assert_eq!(
            validated.provider.identity,
            ProviderIdentity::Organization { name: "City Medical Center".to_string() }
        );
        assert_eq!(
            validated.patient.date_of_birth,
            NaiveDate::from_ymd_opt(1990, 1, 1)
        );
        assert_eq!(validated.diagnosis_code, "J45.909");
        assert_eq!(validated.procedure_code, "99213");
    }

    #[test]
    fn test_valid_practitioner_record() {
        let record = IntakeRecord {
            organization_name: None,
            practitioner_first_name: Some("Gregory".to_string()),
            practitioner_last_name: Some("House".to_string()),
            ..organization_record()
        };
        let validated = validate(&record).unwrap();
        assert_eq!(
            validated.provider.identity,
            ProviderIdentity::Practitioner {
                first: "Gregory".to_string(),
                last: "House".to_string()
            }
        );
    }

    #[test]
    fn test_missing_npi() {
        let record = IntakeRecord {
            provider_npi: None,
            ..organization_record()
        };
        let report = validate(&record).unwrap_err();
        assert!(report.has_field("providerNpi"));
        assert!(report.violations()[0].is_missing());
    }

    #[test]
    fn test_blank_codes_are_missing() {
        let record = IntakeRecord {
            diagnosis_code: Some("  ".to_string()),
            cpt_code: Some(String::new()),
            ..organization_record()
        };
        let report = validate(&record).unwrap_err();
        assert_eq!(report.violations().len(), 2);
        assert!(report.has_field("diagnosisCode"));
        assert!(report.has_field("cptCode"));
    }

    #[test]
    fn test_both_provider_identities_rejected() {
        let record = IntakeRecord {
            practitioner_first_name: Some("Gregory".to_string()),
            practitioner_last_name: Some("House".to_string()),
            ..organization_record()
        };
        let report = validate(&record).unwrap_err();
        assert_eq!(report.violations()[0].kind, ViolationKind::Conflict);
    }

    #[test]
    fn test_no_provider_identity_rejected() {
        let record = IntakeRecord {
            organization_name: None,
            ..organization_record()
        };
        let report = validate(&record).unwrap_err();
        assert!(report.has_field("organizationName"));
    }

    #[test]
    fn test_partial_practitioner_name_rejected() {
        let record = IntakeRecord {
            organization_name: None,
            practitioner_first_name: Some("Gregory".to_string()),
            ..organization_record()
        };
        let report = validate(&record).unwrap_err();
        assert!(report.has_field("practitionerLastName"));
    }

    #[test]
    fn test_violations_are_collected_not_short_circuited() {
        let record = IntakeRecord {
            date_of_birth: Some("01/02/1990".to_string()),
            ..Default::default()
        };
        let report = validate(&record).unwrap_err();
        // providerNpi, diagnosisCode, cptCode, provider identity, dateOfBirth
        assert_eq!(report.violations().len(), 5);
        assert!(report.has_field("dateOfBirth"));
        assert!(report.to_string().contains("providerNpi is required"));
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let record = IntakeRecord {
            first_name: None,
            last_name: None,
            date_of_birth: None,
            subscriber_id: None,
            ..organization_record()
        };
        let validated = validate(&record).unwrap();
        assert!(validated.patient.name_parts().is_empty());
        assert!(validated.patient.subscriber_id.is_none());
    }

    #[test]
    fn test_single_failure_always_yields_a_message() {
        let failing = [
            IntakeRecord { provider_npi: None, ..organization_record() },
            IntakeRecord { cpt_code: Some(" ".to_string()), ..organization_record() },
            IntakeRecord { organization_name: None, ..organization_record() },
            IntakeRecord { date_of_birth: Some("1990-13-40".to_string()), ..organization_record() },
        ];
        for record in &failing {
            let report = validate(record).unwrap_err();
            assert_eq!(report.violations().len(), 1, "record {:?}", record);
            assert!(!report.to_string().is_empty());
        }
    }

    #[test]
    fn test_violations_follow_field_order() {
        let record = IntakeRecord {
            cpt_code: None,
            date_of_birth: Some("yesterday".to_string()),
            practitioner_first_name: Some("Gregory".to_string()),
            ..organization_record()
        };
        let fields: Vec<&str> = validate(&record)
            .unwrap_err()
            .violations()
            .iter()
            .map(|v| v.field)
            .collect();
        assert_eq!(fields, ["cptCode", "organizationName", "dateOfBirth"]);
    }
}
