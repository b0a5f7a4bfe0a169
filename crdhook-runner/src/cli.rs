use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crdhook")]
#[command(about = "Create FHIR order resources from intake records and invoke a CRD order-sign hook")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML config file (defaults to ./crdhook.yaml when present)
    #[arg(short, long, global = true, env = "CRDHOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// ICD-10 code descriptions (CSV: code,description[,type])
    #[arg(long, global = true)]
    pub icd10_map: Option<PathBuf>,

    /// CPT code descriptions (CSV: code,description[,type])
    #[arg(long, global = true)]
    pub cpt_map: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process one record from a JSON file
    Submit {
        /// Intake record as a JSON object with the CSV column names as keys
        record: PathBuf,
    },
    /// Process every row of an intake CSV, in order
    Batch {
        records: PathBuf,
    },
    /// Validate every row of an intake CSV without contacting any server
    Validate {
        records: PathBuf,
    },
    /// Print an intake CSV template with example rows
    Template,
}
