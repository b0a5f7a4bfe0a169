use crdhook_client::ClientSettings;
use crdhook_core::{FixedDayOffset, OccurrencePolicy, RandomDayOffset};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "crdhook.yaml";

/// Accepted range for every occurrence offset, in days.
pub const OCCURRENCE_DAYS: std::ops::RangeInclusive<u32> = 1..=3650;

/// Runner configuration loaded from YAML, then overridden from the environment.
///
/// Read once per run and handed to the orchestrator by value; nothing mutates
/// it afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub fhir: EndpointSettings,
    pub crd: EndpointSettings,
    pub http: HttpSettings,
    pub log: LogSettings,
    pub occurrence: OccurrenceSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub endpoint: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

/// End of the ServiceRequest occurrence window. A fixed offset wins over the
/// random range when both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OccurrenceSettings {
    pub fixed_offset_days: Option<u32>,
    pub min_days: u32,
    pub max_days: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for OccurrenceSettings {
    fn default() -> Self {
        Self {
            fixed_offset_days: None,
            min_days: 1,
            max_days: 5,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RunnerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override settings from `CRDHOOK_*` variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("CRDHOOK_FHIR_ENDPOINT") {
            self.fhir.endpoint = endpoint;
        }
        if let Some(token) = lookup("CRDHOOK_FHIR_ACCESS_TOKEN") {
            self.fhir.access_token = Some(token);
        }
        if let Some(endpoint) = lookup("CRDHOOK_CRD_ENDPOINT") {
            self.crd.endpoint = endpoint;
        }
        if let Some(token) = lookup("CRDHOOK_CRD_ACCESS_TOKEN") {
            self.crd.access_token = Some(token);
        }
        if let Some(timeout) = lookup("CRDHOOK_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse()
        {
            self.http.timeout_secs = secs;
        }
    }

    /// Both endpoints must be absolute http(s) URLs.
    pub fn check(&self) -> Result<(), ConfigError> {
        for (name, settings) in [("fhir", &self.fhir), ("crd", &self.crd)] {
            let endpoint = settings.endpoint.trim();
            if endpoint.is_empty() {
                return Err(ConfigError::Invalid(format!("{}.endpoint is not set", name)));
            }
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "{}.endpoint must be an http(s) URL, got '{}'",
                    name, endpoint
                )));
            }
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("http.timeout_secs must be positive".to_string()));
        }
        self.occurrence.check()
    }

    pub fn fhir_client_settings(&self) -> ClientSettings {
        ClientSettings::new(self.fhir.endpoint.trim())
            .with_access_token(self.fhir.access_token.clone())
            .with_timeout(Duration::from_secs(self.http.timeout_secs))
    }

    pub fn crd_access_token(&self) -> Option<String> {
        self.crd
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn occurrence_policy(&self) -> Arc<dyn OccurrencePolicy> {
        match self.occurrence.fixed_offset_days {
            Some(days) => Arc::new(FixedDayOffset(days)),
            None => Arc::new(RandomDayOffset {
                min_days: self.occurrence.min_days,
                max_days: self.occurrence.max_days,
            }),
        }
    }
}

impl OccurrenceSettings {
    fn check(&self) -> Result<(), ConfigError> {
        let mut bounded = vec![("min_days", self.min_days), ("max_days", self.max_days)];
        if let Some(days) = self.fixed_offset_days {
            bounded.push(("fixed_offset_days", days));
        }
        for (name, days) in bounded {
            if !OCCURRENCE_DAYS.contains(&days) {
                return Err(ConfigError::Invalid(format!(
                    "occurrence.{} must be within {}..={} days, got {}",
                    name,
                    OCCURRENCE_DAYS.start(),
                    OCCURRENCE_DAYS.end(),
                    days
                )));
            }
        }
        if self.min_days > self.max_days {
            return Err(ConfigError::Invalid(format!(
                "occurrence.min_days ({}) must not exceed occurrence.max_days ({})",
                self.min_days, self.max_days
            )));
        }
        Ok(())
    }
}
