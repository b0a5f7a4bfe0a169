use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::ValidationReport;

/// FHIR OperationOutcome, as returned by servers on failed interactions and
/// as used to report rejected intake records.
/// See: https://www.hl7.org/fhir/operationoutcome.html
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcomeIssue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IssueDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// Issue type codes (http://hl7.org/fhir/issue-type). Servers may send any of
/// them, so the whole value set is accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Invalid,
    Structure,
    Required,
    Value,
    Invariant,
    Security,
    Login,
    Unknown,
    Expired,
    Forbidden,
    Suppressed,
    Processing,
    NotSupported,
    Duplicate,
    MultipleMatches,
    NotFound,
    Deleted,
    TooLong,
    CodeInvalid,
    Extension,
    TooCostly,
    BusinessRule,
    Conflict,
    Transient,
    LockError,
    NoStore,
    Exception,
    Timeout,
    Incomplete,
    Throttled,
    Informational,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl OperationOutcome {
    fn with_issues(issue: Vec<OperationOutcomeIssue>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            id: None,
            issue,
        }
    }

    /// Interpret a response body as an OperationOutcome.
    ///
    /// Returns `None` for anything that is not an OperationOutcome, including
    /// bodies whose issues use codes outside the FHIR value set.
    pub fn from_value(body: &Value) -> Option<Self> {
        if body.get("resourceType").and_then(|v| v.as_str()) != Some("OperationOutcome") {
            return None;
        }
        serde_json::from_value(body.clone()).ok()
    }

    /// Join the diagnostics (or detail text) of every issue into one line.
    pub fn summary(&self) -> Option<String> {
        let messages: Vec<&str> = self
            .issue
            .iter()
            .filter_map(|i| {
                i.diagnostics
                    .as_deref()
                    .or_else(|| i.details.as_ref().and_then(|d| d.text.as_deref()))
            })
            .collect();

        if messages.is_empty() {
            None
        } else {
            Some(messages.join("; "))
        }
    }

    pub fn has_errors(&self) -> bool {
        self.issue
            .iter()
            .any(|i| matches!(i.severity, IssueSeverity::Error | IssueSeverity::Fatal))
    }
}

impl From<&ValidationReport> for OperationOutcome {
    fn from(report: &ValidationReport) -> Self {
        let issues = report
            .violations()
            .iter()
            .map(|v| OperationOutcomeIssue {
                severity: IssueSeverity::Error,
                code: if v.is_missing() {
                    IssueType::Required
                } else {
                    IssueType::Invariant
                },
                diagnostics: Some(v.message.clone()),
                details: None,
                expression: Some(vec![v.field.to_string()]),
            })
            .collect();
        Self::with_issues(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Violation, ViolationKind};
    use serde_json::json;

    #[test]
    fn test_parse_server_outcome() {
        let body = json!({
            "resourceType": "OperationOutcome",
            "issue": [
                {"severity": "error", "code": "not-found", "diagnostics": "Patient/123 is gone"},
                {"severity": "warning", "code": "processing", "details": {"text": "slow index"}}
            ]
        });

        let outcome = OperationOutcome::from_value(&body).unwrap();
        assert_eq!(outcome.issue.len(), 2);
        assert_eq!(outcome.issue[0].code, IssueType::NotFound);
        assert!(outcome.has_errors());
        assert_eq!(
            outcome.summary().as_deref(),
            Some("Patient/123 is gone; slow index")
        );
    }

    #[test]
    fn test_non_outcome_body_is_ignored() {
        assert!(OperationOutcome::from_value(&json!({"resourceType": "Patient"})).is_none());
        assert!(OperationOutcome::from_value(&json!("Bad Gateway")).is_none());
    }

    #[test]
    fn test_outcome_without_messages_has_no_summary() {
        let body = json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "information", "code": "informational"}]
        });
        let outcome = OperationOutcome::from_value(&body).unwrap();
        assert!(outcome.summary().is_none());
        assert!(!outcome.has_errors());
    }

    #[test]
    fn test_from_validation_report() {
        let report = ValidationReport::from_violations(vec![
            Violation::new("providerNpi", ViolationKind::Missing, "providerNpi is required"),
            Violation::new(
                "organizationName",
                ViolationKind::Conflict,
                "provide an organization name or a practitioner name, not both",
            ),
        ]);

        let outcome = OperationOutcome::from(&report);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["resourceType"], "OperationOutcome");
        assert_eq!(json["issue"][0]["code"], "required");
        assert_eq!(json["issue"][0]["expression"][0], "providerNpi");
        assert_eq!(json["issue"][1]["code"], "invariant");
    }
}
