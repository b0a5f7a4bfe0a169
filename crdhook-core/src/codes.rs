//! Code systems and the optional code → description tables used to enrich
//! display text.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{CoreError, Result};

pub mod systems {
    pub const ICD10_CM: &str = "http://hl7.org/fhir/sid/icd-10-cm";
    pub const CPT: &str = "http://www.ama-assn.org/go/cpt";
    pub const ACT_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";
    pub const PARTICIPATION_TYPE: &str =
        "http://terminology.hl7.org/CodeSystem/v3-ParticipationType";
    pub const CONDITION_CLINICAL: &str =
        "http://terminology.hl7.org/CodeSystem/condition-clinical";
    pub const CONDITION_VER_STATUS: &str =
        "http://terminology.hl7.org/CodeSystem/condition-ver-status";
    pub const CONDITION_CATEGORY: &str =
        "http://terminology.hl7.org/CodeSystem/condition-category";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeSystemKind {
    Icd10,
    Cpt,
}

impl CodeSystemKind {
    pub fn system(&self) -> &'static str {
        match self {
            CodeSystemKind::Icd10 => systems::ICD10_CM,
            CodeSystemKind::Cpt => systems::CPT,
        }
    }
}

impl FromStr for CodeSystemKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "ICD10" | "ICD10CM" => Ok(CodeSystemKind::Icd10),
            "CPT" => Ok(CodeSystemKind::Cpt),
            other => Err(CoreError::CodeMapping(format!(
                "unknown code type '{}', expected ICD10 or CPT",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    code: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Descriptions for diagnosis and procedure codes.
#[derive(Debug, Clone, Default)]
pub struct CodeMappings {
    entries: HashMap<(CodeSystemKind, String), String>,
}

impl CodeMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: CodeSystemKind, code: &str, description: &str) {
        self.entries
            .insert((kind, code.trim().to_string()), description.trim().to_string());
    }

    /// Load a `code,description[,type]` table. Rows without a `type` column
    /// (or with an empty one) are filed under `default_kind`; rows with an
    /// empty code or description are skipped.
    pub fn load_csv<R: Read>(&mut self, reader: R, default_kind: CodeSystemKind) -> Result<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut loaded = 0;
        for row in csv_reader.deserialize::<MappingRow>() {
            let row = row?;
            if row.code.is_empty() || row.description.is_empty() {
                continue;
            }
            let kind = match row.kind.as_deref().filter(|k| !k.trim().is_empty()) {
                Some(k) => k.parse()?,
                None => default_kind,
            };
            self.insert(kind, &row.code, &row.description);
            loaded += 1;
        }

        tracing::debug!(loaded, ?default_kind, "Loaded code mappings");
        Ok(loaded)
    }

    pub fn load_csv_file(&mut self, path: impl AsRef<Path>, default_kind: CodeSystemKind) -> Result<usize> {
        let file = std::fs::File::open(path)?;
        self.load_csv(file, default_kind)
    }

    pub fn describe(&self, kind: CodeSystemKind, code: &str) -> Option<&str> {
        self.entries
            .get(&(kind, code.trim().to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
