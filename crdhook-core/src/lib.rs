pub mod builder;
pub mod clock;
pub mod codes;
pub mod error;
pub mod intake;
pub mod operation_outcome;
pub mod reference;
pub mod validation;

pub use builder::{
    CoverageInformation, CrdHookPayload, CrdHookRequest, Prefetch, ProviderReference,
    ServiceRequestDraft,
};
pub use clock::{
    Clock, FixedClock, FixedDayOffset, IdGenerator, OccurrencePeriod, OccurrencePolicy,
    RandomDayOffset, SequentialIds, SystemClock, UuidGenerator,
};
pub use codes::{CodeMappings, CodeSystemKind};
pub use error::{CoreError, Result};
pub use intake::{
    IntakeRecord, PatientDetails, Provider, ProviderIdentity, ProviderKind, ValidatedRecord,
};
pub use operation_outcome::{IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};
pub use reference::{ResourceReference, ResourceType};
pub use validation::{validate, ValidationReport, Violation, ViolationKind};
