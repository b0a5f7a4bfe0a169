//! Request bodies for the FHIR server and the CRD service.
//!
//! Every function here is pure: references and generated values come in as
//! arguments, JSON comes out.

use chrono::{NaiveDate, SecondsFormat};
use serde::Serialize;
use serde_json::{json, Value};

use crate::clock::OccurrencePeriod;
use crate::codes::systems;
use crate::intake::ProviderKind;
use crate::reference::{ResourceReference, ResourceType};

pub const ORDER_SIGN_HOOK: &str = "order-sign";
/// `fhirAuthorization.subject` when the ordering user is not a person.
pub const CLIENT_SUBJECT: &str = "crdhook";
pub const COVERAGE_INFORMATION_URL: &str =
    "http://hl7.org/fhir/us/davinci-crd/StructureDefinition/ext-coverage-information";

/// Family and given names split out of a full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HumanName {
    #[serde(rename = "use")]
    pub name_use: &'static str,
    pub family: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
}

/// Last whitespace-delimited token is the family name, the rest are given
/// names. `None` when there are no tokens at all.
pub fn split_name(full_name: &str) -> Option<HumanName> {
    let mut tokens: Vec<String> = full_name.split_whitespace().map(str::to_string).collect();
    let family = tokens.pop()?;
    Some(HumanName {
        name_use: "official",
        family,
        given: tokens,
    })
}

pub fn build_patient(
    name_parts: &[&str],
    subscriber_id: Option<&str>,
    date_of_birth: Option<NaiveDate>,
) -> Value {
    let mut patient = json!({ "resourceType": "Patient" });

    if let Some(name) = split_name(&name_parts.join(" ")) {
        patient["name"] = json!([name]);
    }
    if let Some(id) = subscriber_id {
        patient["identifier"] = json!([{ "value": id }]);
    }
    if let Some(dob) = date_of_birth {
        patient["birthDate"] = json!(dob.format("%Y-%m-%d").to_string());
    }

    patient
}

/// The organization or practitioner that performs the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReference {
    pub kind: ProviderKind,
    pub id: String,
    pub display: Option<String>,
}

impl ProviderReference {
    pub fn reference(&self) -> ResourceReference {
        ResourceReference::new(self.kind.resource_type(), self.id.clone())
    }

    fn to_reference_json(&self) -> Value {
        let mut value = self.reference().to_reference_json();
        if let Some(display) = &self.display {
            value["display"] = json!(display);
        }
        value
    }
}

pub fn build_encounter(
    patient: &ResourceReference,
    location: Option<&ResourceReference>,
    provider: &ProviderReference,
) -> Value {
    let mut encounter = json!({
        "resourceType": "Encounter",
        "status": "planned",
        "class": {
            "system": systems::ACT_CODE,
            "code": "AMB",
            "display": "ambulatory"
        },
        "subject": patient.to_reference_json(),
        "participant": [{
            "type": [{
                "coding": [{
                    "system": systems::PARTICIPATION_TYPE,
                    "code": "ADM",
                    "display": "admitter"
                }]
            }]
        }],
        "serviceProvider": provider.to_reference_json()
    });

    if let Some(location) = location {
        encounter["location"] = json!([{ "location": location.to_reference_json() }]);
    }

    encounter
}

pub fn build_condition(
    patient: &ResourceReference,
    encounter: &ResourceReference,
    diagnosis_code: &str,
    diagnosis_display: Option<&str>,
) -> Value {
    let display = diagnosis_display.unwrap_or(diagnosis_code);
    json!({
        "resourceType": "Condition",
        "clinicalStatus": {
            "coding": [{ "system": systems::CONDITION_CLINICAL, "code": "active" }]
        },
        "verificationStatus": {
            "coding": [{ "system": systems::CONDITION_VER_STATUS, "code": "confirmed" }]
        },
        "category": [{
            "coding": [{
                "system": systems::CONDITION_CATEGORY,
                "code": "encounter-diagnosis",
                "display": "Encounter Diagnosis"
            }]
        }],
        "code": {
            "coding": [{
                "system": systems::ICD10_CM,
                "code": diagnosis_code,
                "display": display
            }],
            "text": display
        },
        "subject": patient.to_reference_json(),
        "encounter": encounter.to_reference_json()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStatus {
    Covered,
    NotCovered,
    Conditional,
}

impl CoverageStatus {
    pub fn code(&self) -> &'static str {
        match self {
            CoverageStatus::Covered => "covered",
            CoverageStatus::NotCovered => "not-covered",
            CoverageStatus::Conditional => "conditional",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorAuthNeeded {
    NoAuth,
    AuthNeeded,
    Satisfied,
    Conditional,
}

impl PriorAuthNeeded {
    pub fn code(&self) -> &'static str {
        match self {
            PriorAuthNeeded::NoAuth => "no-auth",
            PriorAuthNeeded::AuthNeeded => "auth-needed",
            PriorAuthNeeded::Satisfied => "satisfied",
            PriorAuthNeeded::Conditional => "conditional",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentationNeeded {
    NoDoc,
    Clinical,
    Admin,
    Both,
    Conditional,
}

impl DocumentationNeeded {
    pub fn code(&self) -> &'static str {
        match self {
            DocumentationNeeded::NoDoc => "no-doc",
            DocumentationNeeded::Clinical => "clinical",
            DocumentationNeeded::Admin => "admin",
            DocumentationNeeded::Both => "both",
            DocumentationNeeded::Conditional => "conditional",
        }
    }
}

/// Values of the coverage-information extension on a drafted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageInformation {
    pub covered: CoverageStatus,
    pub pa_needed: PriorAuthNeeded,
    pub doc_needed: DocumentationNeeded,
    pub assertion_id: String,
}

impl CoverageInformation {
    /// Nothing is known before the CRD service answers.
    pub fn undetermined(assertion_id: impl Into<String>) -> Self {
        Self {
            covered: CoverageStatus::Conditional,
            pa_needed: PriorAuthNeeded::Conditional,
            doc_needed: DocumentationNeeded::Conditional,
            assertion_id: assertion_id.into(),
        }
    }
}

/// Everything a ServiceRequest body is made from.
#[derive(Debug, Clone)]
pub struct ServiceRequestDraft<'a> {
    pub patient: &'a ResourceReference,
    pub encounter: &'a ResourceReference,
    pub condition: &'a ResourceReference,
    pub coverage: &'a ResourceReference,
    pub performer: &'a ProviderReference,
    pub procedure_code: &'a str,
    pub procedure_display: Option<&'a str>,
    pub occurrence: OccurrencePeriod,
    pub coverage_information: &'a CoverageInformation,
}

fn fhir_instant(value: chrono::DateTime<chrono::Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn build_service_request(draft: &ServiceRequestDraft<'_>) -> Value {
    let mut cpt_coding = json!({
        "system": systems::CPT,
        "code": draft.procedure_code
    });
    if let Some(display) = draft.procedure_display {
        cpt_coding["display"] = json!(display);
    }

    let info = draft.coverage_information;
    let coverage_extension = json!({
        "url": COVERAGE_INFORMATION_URL,
        "extension": [
            { "url": "coverage", "valueReference": draft.coverage.to_reference_json() },
            { "url": "covered", "valueCode": info.covered.code() },
            { "url": "pa-needed", "valueCode": info.pa_needed.code() },
            { "url": "doc-needed", "valueCode": info.doc_needed.code() },
            { "url": "billingCode", "valueCoding": cpt_coding.clone() },
            { "url": "coverage-assertion-id", "valueString": info.assertion_id }
        ]
    });

    json!({
        "resourceType": "ServiceRequest",
        "status": "draft",
        "intent": "order",
        "extension": [coverage_extension],
        "code": { "coding": [cpt_coding] },
        "subject": draft.patient.to_reference_json(),
        "encounter": draft.encounter.to_reference_json(),
        "occurrencePeriod": {
            "start": fhir_instant(draft.occurrence.start),
            "end": fhir_instant(draft.occurrence.end)
        },
        "authoredOn": fhir_instant(draft.occurrence.start),
        "requester": draft.performer.to_reference_json(),
        "performer": [draft.performer.to_reference_json()],
        "reasonReference": [draft.condition.to_reference_json()],
        "insurance": [draft.coverage.to_reference_json()]
    })
}

/// A `collection` Bundle holding the given resources.
pub fn collection_bundle(resources: impl IntoIterator<Item = Value>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .map(|resource| json!({ "resource": resource }))
        .collect();
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": entries
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FhirAuthorization {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u32,
    pub scope: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSignContext {
    /// Only Practitioner and Patient users; an ordering Organization has no user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub patient_id: String,
    pub encounter_id: String,
    pub draft_orders: Value,
}

/// Resources sent along so the CRD service need not query them back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefetch {
    pub patient: Value,
    pub coverage_bundle: Value,
    pub performer_bundle: Value,
}

/// The `order-sign` CDS Hooks request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdHookPayload {
    pub hook: String,
    pub hook_instance: String,
    pub fhir_server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_authorization: Option<FhirAuthorization>,
    pub context: OrderSignContext,
    pub prefetch: Prefetch,
}

#[derive(Debug, Clone)]
pub struct CrdHookRequest<'a> {
    pub hook_instance: String,
    pub fhir_server: &'a str,
    pub access_token: Option<&'a str>,
    pub user: &'a ResourceReference,
    pub patient: &'a ResourceReference,
    pub encounter: &'a ResourceReference,
    pub service_request: Value,
    pub prefetch: Prefetch,
}

pub fn build_crd_hook(request: CrdHookRequest<'_>) -> CrdHookPayload {
    let user_id = matches!(
        request.user.resource_type,
        ResourceType::Practitioner | ResourceType::Patient
    )
    .then(|| request.user.to_string());
    let fhir_authorization = request.access_token.map(|token| FhirAuthorization {
        access_token: token.to_string(),
        token_type: "Bearer".to_string(),
        expires_in: 300,
        scope: "patient/*.read user/*.read".to_string(),
        subject: user_id.clone().unwrap_or_else(|| CLIENT_SUBJECT.to_string()),
    });

    CrdHookPayload {
        hook: ORDER_SIGN_HOOK.to_string(),
        hook_instance: request.hook_instance,
        fhir_server: request.fhir_server.trim_end_matches('/').to_string(),
        fhir_authorization,
        context: OrderSignContext {
            user_id,
            patient_id: request.patient.id.clone(),
            encounter_id: request.encounter.id.clone(),
            draft_orders: collection_bundle([request.service_request]),
        },
        prefetch: request.prefetch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn patient_ref() -> ResourceReference {
        ResourceReference::new(ResourceType::Patient, "pat-1")
    }

    fn encounter_ref() -> ResourceReference {
        ResourceReference::new(ResourceType::Encounter, "enc-1")
    }

    fn organization() -> ProviderReference {
        ProviderReference {
            kind: ProviderKind::Organization,
            id: "org-1".to_string(),
            display: Some("City Medical Center".to_string()),
        }
    }

    #[test]
    fn test_split_name_last_token_is_family() {
        for (input, family, given) in [
            ("John Doe", "Doe", vec!["John"]),
            ("Jane M Smith", "Smith", vec!["Jane", "M"]),
            ("Cher", "Cher", vec![]),
            ("  Anna   Maria  Lopez ", "Lopez", vec!["Anna", "Maria"]),
        ] {
            let name = split_name(input).unwrap();
            assert_eq!(name.family, family, "input {:?}", input);
            assert_eq!(name.given, given, "input {:?}", input);
        }
        assert!(split_name("   ").is_none());
    }

    #[test]
    fn test_build_patient() {
        let patient = build_patient(
            &["Jane", "M", "Smith"],
            Some("SUB67890"),
            NaiveDate::from_ymd_opt(1985, 5, 15),
        );

        assert_eq!(patient["resourceType"], "Patient");
        assert_eq!(patient["name"][0]["use"], "official");
        assert_eq!(patient["name"][0]["family"], "Smith");
        assert_eq!(patient["name"][0]["given"], json!(["Jane", "M"]));
        assert_eq!(patient["identifier"][0]["value"], "SUB67890");
        assert_eq!(patient["birthDate"], "1985-05-15");
    }

    #[test]
    fn test_build_patient_single_token_and_no_birth_date() {
        let patient = build_patient(&["Madonna"], None, None);
        assert_eq!(patient["name"][0]["family"], "Madonna");
        assert!(patient["name"][0].get("given").is_none());
        assert!(patient.get("birthDate").is_none());
        assert!(patient.get("identifier").is_none());
    }

    #[test]
    fn test_build_patient_without_name() {
        let patient = build_patient(&[], Some("SUB1"), None);
        assert!(patient.get("name").is_none());
    }

    #[test]
    fn test_build_encounter_organization_provider() {
        let location = ResourceReference::new(ResourceType::Location, "loc-1");
        let encounter = build_encounter(&patient_ref(), Some(&location), &organization());

        assert_eq!(encounter["status"], "planned");
        assert_eq!(encounter["class"]["code"], "AMB");
        assert_eq!(encounter["subject"]["reference"], "Patient/pat-1");
        assert_eq!(encounter["location"][0]["location"]["reference"], "Location/loc-1");
        assert_eq!(encounter["participant"][0]["type"][0]["coding"][0]["code"], "ADM");
        assert_eq!(encounter["serviceProvider"]["reference"], "Organization/org-1");
    }

    #[test]
    fn test_build_encounter_practitioner_provider_without_location() {
        let provider = ProviderReference {
            kind: ProviderKind::Practitioner,
            id: "prac-7".to_string(),
            display: None,
        };
        let encounter = build_encounter(&patient_ref(), None, &provider);
        assert_eq!(encounter["serviceProvider"]["reference"], "Practitioner/prac-7");
        assert!(encounter.get("location").is_none());
    }

    #[test]
    fn test_build_condition() {
        let condition = build_condition(
            &patient_ref(),
            &encounter_ref(),
            "J45.909",
            Some("Asthma, unspecified"),
        );

        assert_eq!(condition["clinicalStatus"]["coding"][0]["code"], "active");
        assert_eq!(condition["verificationStatus"]["coding"][0]["code"], "confirmed");
        assert_eq!(condition["code"]["coding"][0]["system"], systems::ICD10_CM);
        assert_eq!(condition["code"]["coding"][0]["code"], "J45.909");
        assert_eq!(condition["code"]["coding"][0]["display"], "Asthma, unspecified");
        assert_eq!(condition["encounter"]["reference"], "Encounter/enc-1");
    }

    #[test]
    fn test_build_condition_display_falls_back_to_code() {
        let condition = build_condition(&patient_ref(), &encounter_ref(), "E11.9", None);
        assert_eq!(condition["code"]["coding"][0]["display"], "E11.9");
        assert_eq!(condition["code"]["text"], "E11.9");
    }

    #[test]
    fn test_build_service_request() {
        let condition = ResourceReference::new(ResourceType::Condition, "cond-1");
        let coverage = ResourceReference::new(ResourceType::Coverage, "cov-1");
        let performer = organization();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let info = CoverageInformation::undetermined("assert-1");

        let draft = ServiceRequestDraft {
            patient: &patient_ref(),
            encounter: &encounter_ref(),
            condition: &condition,
            coverage: &coverage,
            performer: &performer,
            procedure_code: "99213",
            procedure_display: None,
            occurrence: OccurrencePeriod {
                start,
                end: start + chrono::Duration::days(3),
            },
            coverage_information: &info,
        };
        let request = build_service_request(&draft);

        assert_eq!(request["status"], "draft");
        assert_eq!(request["intent"], "order");
        assert_eq!(request["code"]["coding"][0]["system"], systems::CPT);
        assert_eq!(request["code"]["coding"][0]["code"], "99213");
        assert_eq!(request["occurrencePeriod"]["start"], "2024-06-01T08:00:00Z");
        assert_eq!(request["occurrencePeriod"]["end"], "2024-06-04T08:00:00Z");
        assert_eq!(request["reasonReference"][0]["reference"], "Condition/cond-1");
        assert_eq!(request["insurance"][0]["reference"], "Coverage/cov-1");
        assert_eq!(request["performer"][0]["reference"], "Organization/org-1");
        assert_eq!(request["performer"][0]["display"], "City Medical Center");

        let extension = &request["extension"][0];
        assert_eq!(extension["url"], COVERAGE_INFORMATION_URL);
        let sub = |url: &str| {
            extension["extension"]
                .as_array()
                .unwrap()
                .iter()
                .find(|e| e["url"] == url)
                .cloned()
                .unwrap()
        };
        assert_eq!(sub("coverage")["valueReference"]["reference"], "Coverage/cov-1");
        assert_eq!(sub("covered")["valueCode"], "conditional");
        assert_eq!(sub("pa-needed")["valueCode"], "conditional");
        assert_eq!(sub("doc-needed")["valueCode"], "conditional");
        assert_eq!(sub("billingCode")["valueCoding"]["code"], "99213");
        assert_eq!(sub("coverage-assertion-id")["valueString"], "assert-1");
    }

    #[test]
    fn test_build_crd_hook() {
        let user = ResourceReference::new(ResourceType::Practitioner, "prac-7");
        let service_request = json!({"resourceType": "ServiceRequest", "id": "sr-1"});
        let prefetch = Prefetch {
            patient: json!({"resourceType": "Patient", "id": "pat-1"}),
            coverage_bundle: collection_bundle([json!({"resourceType": "Coverage", "id": "cov-1"})]),
            performer_bundle: json!({"resourceType": "Bundle", "type": "searchset", "entry": []}),
        };

        let payload = build_crd_hook(CrdHookRequest {
            hook_instance: "hook-1".to_string(),
            fhir_server: "https://fhir.example.org/r4/",
            access_token: Some("fhir-token"),
            user: &user,
            patient: &patient_ref(),
            encounter: &encounter_ref(),
            service_request,
            prefetch,
        });
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["hook"], "order-sign");
        assert_eq!(json["hookInstance"], "hook-1");
        assert_eq!(json["fhirServer"], "https://fhir.example.org/r4");
        assert_eq!(json["fhirAuthorization"]["access_token"], "fhir-token");
        assert_eq!(json["fhirAuthorization"]["token_type"], "Bearer");
        assert_eq!(json["context"]["userId"], "Practitioner/prac-7");
        assert_eq!(json["fhirAuthorization"]["subject"], "Practitioner/prac-7");
        assert_eq!(json["context"]["patientId"], "pat-1");
        assert_eq!(json["context"]["encounterId"], "enc-1");
        assert_eq!(json["context"]["draftOrders"]["type"], "collection");
        assert_eq!(
            json["context"]["draftOrders"]["entry"][0]["resource"]["id"],
            "sr-1"
        );
        assert_eq!(json["prefetch"]["patient"]["id"], "pat-1");
        assert_eq!(
            json["prefetch"]["coverageBundle"]["entry"][0]["resource"]["resourceType"],
            "Coverage"
        );
        assert_eq!(json["prefetch"]["performerBundle"]["type"], "searchset");
    }

    #[test]
    fn test_build_crd_hook_without_token_omits_authorization() {
        let user = ResourceReference::new(ResourceType::Organization, "org-1");
        let payload = build_crd_hook(CrdHookRequest {
            hook_instance: "hook-2".to_string(),
            fhir_server: "https://fhir.example.org",
            access_token: None,
            user: &user,
            patient: &patient_ref(),
            encounter: &encounter_ref(),
            service_request: json!({}),
            prefetch: Prefetch {
                patient: json!({}),
                coverage_bundle: collection_bundle(Vec::new()),
                performer_bundle: json!({}),
            },
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("fhirAuthorization").is_none());
    }

    #[test]
    fn test_build_crd_hook_organization_user_has_no_user_id() {
        let user = ResourceReference::new(ResourceType::Organization, "org-1");
        let payload = build_crd_hook(CrdHookRequest {
            hook_instance: "hook-3".to_string(),
            fhir_server: "https://fhir.example.org",
            access_token: Some("fhir-token"),
            user: &user,
            patient: &patient_ref(),
            encounter: &encounter_ref(),
            service_request: json!({}),
            prefetch: Prefetch {
                patient: json!({}),
                coverage_bundle: collection_bundle(Vec::new()),
                performer_bundle: json!({}),
            },
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["context"].get("userId").is_none());
        assert_eq!(json["context"]["patientId"], "pat-1");
        assert_eq!(json["fhirAuthorization"]["subject"], CLIENT_SUBJECT);
    }
}
