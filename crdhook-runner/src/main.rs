//! crdhook entry point

use clap::Parser;
use crdhook_core::{validate, CodeMappings, CodeSystemKind};
use crdhook_runner::cli::{Cli, Commands};
use crdhook_runner::config::DEFAULT_CONFIG_FILE;
use crdhook_runner::report::RecordReport;
use crdhook_runner::{intake, process_batch, Orchestrator, RunnerConfig};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| Path::new(DEFAULT_CONFIG_FILE).exists().then(|| DEFAULT_CONFIG_FILE.into()));
    let config = RunnerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}", e);
        std::process::exit(1);
    });

    // Logs go to stderr so stdout stays a clean JSON report
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level)),
        )
        .init();

    let ok = tokio::select! {
        ok = run(cli, config) => ok,
        _ = shutdown_signal() => false,
    };

    if !ok {
        std::process::exit(1);
    }
}

/// Returns false when any record failed or setup went wrong.
async fn run(cli: Cli, config: RunnerConfig) -> bool {
    match &cli.command {
        Commands::Template => {
            if let Err(e) = intake::write_template(std::io::stdout().lock()) {
                tracing::error!("Failed to write template: {}", e);
                return false;
            }
            true
        }
        Commands::Validate { records } => {
            let Some(records) = read_batch(records) else {
                return false;
            };
            let results: Vec<_> = records
                .iter()
                .enumerate()
                .map(|(i, record)| match validate(record) {
                    Ok(_) => json!({ "record": i + 1, "valid": true }),
                    Err(report) => json!({
                        "record": i + 1,
                        "valid": false,
                        "violations": report.violations().iter().map(|v| v.message.clone()).collect::<Vec<_>>()
                    }),
                })
                .collect();
            let all_valid = results.iter().all(|r| r["valid"] == true);
            print_json(&results);
            all_valid
        }
        Commands::Submit { record } => {
            let record = match intake::read_record_json(record) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!("Failed to read {}: {}", record.display(), e);
                    return false;
                }
            };
            let Some(orchestrator) = build_orchestrator(&cli, &config) else {
                return false;
            };
            let outcome = orchestrator.process(&record).await;
            print_json(&RecordReport::new(1, &outcome));
            outcome.is_success()
        }
        Commands::Batch { records } => {
            let Some(records) = read_batch(records) else {
                return false;
            };
            let Some(orchestrator) = build_orchestrator(&cli, &config) else {
                return false;
            };
            let outcome = process_batch(&orchestrator, &records).await;
            print_json(&outcome.report());
            outcome.failed() == 0
        }
    }
}

fn read_batch(path: &Path) -> Option<Vec<crdhook_core::IntakeRecord>> {
    match intake::read_records_file(path) {
        Ok(records) => {
            tracing::info!("Read {} record(s) from {}", records.len(), path.display());
            Some(records)
        }
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

fn build_orchestrator(cli: &Cli, config: &RunnerConfig) -> Option<Orchestrator> {
    if let Err(e) = config.check() {
        tracing::error!("{}", e);
        return None;
    }

    let mut mappings = CodeMappings::new();
    for (path, kind) in [
        (&cli.icd10_map, CodeSystemKind::Icd10),
        (&cli.cpt_map, CodeSystemKind::Cpt),
    ] {
        let Some(path) = path else { continue };
        match mappings.load_csv_file(path, kind) {
            Ok(count) => tracing::info!("Loaded {} code description(s) from {}", count, path.display()),
            Err(e) => {
                tracing::error!("Failed to load code mappings from {}: {}", path.display(), e);
                return None;
            }
        }
    }

    tracing::info!(fhir = %config.fhir.endpoint, crd = %config.crd.endpoint, "Endpoints");

    match Orchestrator::from_config(config) {
        Ok(orchestrator) => Some(orchestrator.with_code_mappings(mappings)),
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            None
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!("Failed to render report: {}", e),
    }
}

/// Ctrl+C or SIGTERM. The in-flight record is dropped when this fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Received Ctrl+C, aborting run"),
        _ = terminate => tracing::warn!("Received SIGTERM, aborting run"),
    }
}
