//! HTTP transport for the FHIR server and the CRD service.

pub mod crd;
pub mod error;
pub mod fhir;

pub use error::{ClientError, Result};
pub use fhir::{ClientSettings, FhirClient, FHIR_JSON};
