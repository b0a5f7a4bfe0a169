//! The per-record chain: patient, provider, location, encounter, condition,
//! coverage, service request, prefetch, CRD hook.
//!
//! Each step feeds the next, so the chain runs strictly in order and stops at
//! the first failure. Resources already created stay on the server; the
//! outcome lists them as notes.

use crdhook_client::{ClientError, FhirClient};
use crdhook_core::builder::{self, CrdHookRequest, Prefetch, ServiceRequestDraft};
use crdhook_core::{
    validate, Clock, CodeMappings, CodeSystemKind, CoverageInformation, IdGenerator,
    IntakeRecord, OccurrencePeriod, OccurrencePolicy, ProviderIdentity, ProviderReference,
    RandomDayOffset, ResourceReference, ResourceType, SystemClock, UuidGenerator,
    ValidatedRecord,
};
use serde_json::Value;
use std::sync::Arc;

use crate::config::RunnerConfig;
use crate::error::{ProcessError, Step};

/// Where and how to reach the CRD service.
#[derive(Debug, Clone)]
pub struct CrdEndpoint {
    pub url: String,
    pub access_token: Option<String>,
}

/// Result of processing one record.
#[derive(Debug)]
pub struct RecordOutcome {
    /// Every reference resolved or created, in step order.
    pub references: Vec<ResourceReference>,
    /// The subset of `references` this run created on the server.
    pub created: Vec<ResourceReference>,
    pub notes: Vec<String>,
    /// The CRD service's response body, or the step that stopped the chain.
    pub result: Result<Value, ProcessError>,
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ProcessError> {
        self.result.as_ref().err()
    }

    pub fn crd_response(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }
}

#[derive(Default)]
struct Progress {
    references: Vec<ResourceReference>,
    created: Vec<ResourceReference>,
}

impl Progress {
    fn resolved(&mut self, reference: &ResourceReference) {
        self.references.push(reference.clone());
    }

    fn created(&mut self, reference: &ResourceReference) {
        self.references.push(reference.clone());
        self.created.push(reference.clone());
    }
}

pub struct Orchestrator {
    client: FhirClient,
    crd: CrdEndpoint,
    code_mappings: CodeMappings,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    occurrence: Arc<dyn OccurrencePolicy>,
}

impl Orchestrator {
    pub fn new(client: FhirClient, crd: CrdEndpoint) -> Self {
        Self {
            client,
            crd,
            code_mappings: CodeMappings::new(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            occurrence: Arc::new(RandomDayOffset::default()),
        }
    }

    /// Build the client and CRD endpoint from a configuration snapshot.
    pub fn from_config(config: &RunnerConfig) -> Result<Self, ClientError> {
        let client = FhirClient::new(config.fhir_client_settings())?;
        let crd = CrdEndpoint {
            url: config.crd.endpoint.trim().to_string(),
            access_token: config.crd_access_token(),
        };
        Ok(Self::new(client, crd).with_occurrence_policy(config.occurrence_policy()))
    }

    pub fn with_code_mappings(mut self, code_mappings: CodeMappings) -> Self {
        self.code_mappings = code_mappings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_occurrence_policy(mut self, occurrence: Arc<dyn OccurrencePolicy>) -> Self {
        self.occurrence = occurrence;
        self
    }

    /// Run the whole chain for one record. Never panics on server errors;
    /// every failure ends up in [`RecordOutcome::result`].
    pub async fn process(&self, record: &IntakeRecord) -> RecordOutcome {
        let mut progress = Progress::default();
        let result = self.run(record, &mut progress).await;

        let mut notes = Vec::new();
        match &result {
            Ok(_) => {
                tracing::info!(created = progress.created.len(), "Record processed");
            }
            Err(e) => {
                tracing::warn!(step = %e.step(), error = %e, "Record failed");
                notes.extend(progress.created.iter().map(|r| {
                    format!("{} was created before the failure and left in place", r)
                }));
            }
        }

        RecordOutcome {
            references: progress.references,
            created: progress.created,
            notes,
            result,
        }
    }

    async fn run(&self, record: &IntakeRecord, progress: &mut Progress) -> Result<Value, ProcessError> {
        let record = validate(record)?;
        // Computed before any server call so a bad policy creates nothing.
        let occurrence = OccurrencePeriod::starting_now(self.clock.as_ref(), self.occurrence.as_ref())
            .map_err(ProcessError::Occurrence)?;

        let patient = self.resolve_patient(&record, progress).await?;
        let provider = self.resolve_provider(&record).await?;
        progress.resolved(&provider.reference());

        let location = match &record.service_location {
            Some(name) => {
                let location = self
                    .find(Step::ResolveLocation, ResourceType::Location, &[("name", name.as_str())])
                    .await?;
                progress.resolved(&location);
                Some(location)
            }
            None => None,
        };

        let encounter_body = builder::build_encounter(&patient, location.as_ref(), &provider);
        let encounter = self
            .create(Step::CreateEncounter, ResourceType::Encounter, &encounter_body)
            .await?;
        progress.created(&encounter);

        let diagnosis_display = self
            .code_mappings
            .describe(CodeSystemKind::Icd10, &record.diagnosis_code);
        let condition_body = builder::build_condition(
            &patient,
            &encounter,
            &record.diagnosis_code,
            diagnosis_display,
        );
        let condition = self
            .create(Step::CreateCondition, ResourceType::Condition, &condition_body)
            .await?;
        progress.created(&condition);

        let coverage_resource = self
            .client
            .search_one(ResourceType::Coverage, &[("patient", patient.id.as_str())])
            .await
            .map_err(ProcessError::at(Step::ResolveCoverage))?;
        let coverage = reference_of(Step::ResolveCoverage, ResourceType::Coverage, &coverage_resource)?;
        progress.resolved(&coverage);

        let coverage_information = CoverageInformation::undetermined(self.ids.next_id());
        let draft = ServiceRequestDraft {
            patient: &patient,
            encounter: &encounter,
            condition: &condition,
            coverage: &coverage,
            performer: &provider,
            procedure_code: &record.procedure_code,
            procedure_display: self
                .code_mappings
                .describe(CodeSystemKind::Cpt, &record.procedure_code),
            occurrence,
            coverage_information: &coverage_information,
        };
        let service_request_resource = self
            .client
            .create(ResourceType::ServiceRequest, &builder::build_service_request(&draft))
            .await
            .map_err(ProcessError::at(Step::CreateServiceRequest))?;
        let service_request = reference_of(
            Step::CreateServiceRequest,
            ResourceType::ServiceRequest,
            &service_request_resource,
        )?;
        progress.created(&service_request);

        let prefetch = self
            .assemble_prefetch(&patient, &service_request, coverage_resource)
            .await?;

        let payload = builder::build_crd_hook(CrdHookRequest {
            hook_instance: self.ids.next_id(),
            fhir_server: self.client.base_url(),
            access_token: self.client.access_token(),
            user: &provider.reference(),
            patient: &patient,
            encounter: &encounter,
            service_request: service_request_resource,
            prefetch,
        });
        tracing::debug!(hook_instance = %payload.hook_instance, "Invoking CRD hook");

        self.client
            .post_to_crd(&payload, &self.crd.url, self.crd.access_token.as_deref())
            .await
            .map_err(ProcessError::at(Step::InvokeCrdHook))
    }

    /// Existing patient by subscriber id, or a new one.
    async fn resolve_patient(
        &self,
        record: &ValidatedRecord,
        progress: &mut Progress,
    ) -> Result<ResourceReference, ProcessError> {
        if let Some(subscriber_id) = &record.patient.subscriber_id {
            match self
                .client
                .search_one(ResourceType::Patient, &[("identifier", subscriber_id.as_str())])
                .await
            {
                Ok(existing) => {
                    let patient = reference_of(Step::ResolvePatient, ResourceType::Patient, &existing)?;
                    tracing::debug!(patient = %patient, "Found existing patient");
                    progress.resolved(&patient);
                    return Ok(patient);
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(subscriber_id = %subscriber_id, "No patient with subscriber id, creating");
                }
                Err(e) => return Err(ProcessError::at(Step::ResolvePatient)(e)),
            }
        }

        let body = builder::build_patient(
            &record.patient.name_parts(),
            record.patient.subscriber_id.as_deref(),
            record.patient.date_of_birth,
        );
        let patient = self
            .create(Step::CreatePatient, ResourceType::Patient, &body)
            .await?;
        progress.created(&patient);
        Ok(patient)
    }

    async fn resolve_provider(&self, record: &ValidatedRecord) -> Result<ProviderReference, ProcessError> {
        let identity = &record.provider.identity;
        let (resource_type, params) = match identity {
            ProviderIdentity::Organization { name } => (ResourceType::Organization, [("name", name.as_str())]),
            ProviderIdentity::Practitioner { .. } => (
                ResourceType::Practitioner,
                [("identifier", record.provider.npi.as_str())],
            ),
        };

        let provider = self.find(Step::ResolveProvider, resource_type, &params).await?;
        Ok(ProviderReference {
            kind: identity.kind(),
            id: provider.id,
            display: Some(identity.display_name()),
        })
    }

    /// Full Patient plus the performer bundle (the ServiceRequest with its
    /// performer and the performer's role, organization and practitioner).
    async fn assemble_prefetch(
        &self,
        patient: &ResourceReference,
        service_request: &ResourceReference,
        coverage: Value,
    ) -> Result<Prefetch, ProcessError> {
        let at = || ProcessError::at(Step::AssemblePrefetch);

        let patient = self
            .client
            .read(ResourceType::Patient, &patient.id)
            .await
            .map_err(at())?;

        let performer_bundle = self
            .client
            .search(
                ResourceType::ServiceRequest,
                &[
                    ("_id", service_request.id.as_str()),
                    ("_include", "ServiceRequest:performer"),
                    ("_include:iterate", "PractitionerRole:organization"),
                    ("_include:iterate", "PractitionerRole:practitioner"),
                ],
            )
            .await
            .map_err(at())?;

        Ok(Prefetch {
            patient,
            coverage_bundle: builder::collection_bundle([coverage]),
            performer_bundle,
        })
    }

    async fn find(
        &self,
        step: Step,
        resource_type: ResourceType,
        params: &[(&str, &str)],
    ) -> Result<ResourceReference, ProcessError> {
        let resource = self
            .client
            .search_one(resource_type, params)
            .await
            .map_err(ProcessError::at(step))?;
        reference_of(step, resource_type, &resource)
    }

    async fn create(
        &self,
        step: Step,
        resource_type: ResourceType,
        body: &Value,
    ) -> Result<ResourceReference, ProcessError> {
        let created = self
            .client
            .create(resource_type, body)
            .await
            .map_err(ProcessError::at(step))?;
        let reference = reference_of(step, resource_type, &created)?;
        tracing::debug!(step = %step, reference = %reference, "Created resource");
        Ok(reference)
    }
}

fn reference_of(step: Step, resource_type: ResourceType, resource: &Value) -> Result<ResourceReference, ProcessError> {
    ResourceReference::from_resource(resource_type, resource)
        .map_err(|source| ProcessError::UnexpectedResponse { step, source })
}
