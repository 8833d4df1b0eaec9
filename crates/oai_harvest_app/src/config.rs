//! Run configuration, read from a RON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use engine_logging::LogDestination;
use log::LevelFilter;
use oai_harvest_core::{HarvestRequest, OaiDate, RetryPolicy, Verb};
use oai_harvest_engine::{ExportOptions, FetchSettings, RunSettings};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG: &str = "harvest.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogTarget {
    #[default]
    Terminal,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogTarget,
    pub file: PathBuf,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogTarget::Terminal,
            file: PathBuf::from("harvest.log"),
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    pub fn destination(&self) -> LogDestination {
        match self.destination {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.file.clone()),
            LogTarget::Both => LogDestination::Both(self.file.clone()),
        }
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.level)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_oai_bytes: u64,
    pub max_pdf_bytes: u64,
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let oai = FetchSettings::for_oai();
        let pdf = FetchSettings::for_pdf();
        Self {
            connect_timeout_secs: oai.connect_timeout.as_secs(),
            request_timeout_secs: pdf.request_timeout.as_secs(),
            redirect_limit: oai.redirect_limit,
            max_oai_bytes: oai.max_bytes,
            max_pdf_bytes: pdf.max_bytes,
            user_agent: None,
        }
    }
}

impl FetchConfig {
    fn apply(&self, base: FetchSettings, max_bytes: u64) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            redirect_limit: self.redirect_limit,
            max_bytes,
            user_agent: self.user_agent.clone().unwrap_or(base.user_agent.clone()),
            ..base
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    pub max_token_restarts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_secs: policy.max_delay.as_secs(),
            max_token_restarts: policy.max_token_restarts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub endpoint: String,
    pub verb: Verb,
    pub metadata_prefix: String,
    pub set: Option<String>,
    pub from: Option<OaiDate>,
    pub until: Option<OaiDate>,
    /// Required for `GetRecord`.
    pub identifier: Option<String>,
    pub output_dir: PathBuf,
    pub write_fulltext: bool,
    pub workers: usize,
    /// Stop after this many records were sent to extraction.
    pub max_records: Option<usize>,
    /// Pause between records, in milliseconds.
    pub item_delay_ms: u64,
    pub pdf_url_template: Option<String>,
    pub pdf_password: Option<String>,
    pub log: LogConfig,
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            verb: Verb::ListRecords,
            metadata_prefix: "oai_dc".to_string(),
            set: None,
            from: None,
            until: None,
            identifier: None,
            output_dir: PathBuf::from("output"),
            write_fulltext: true,
            workers: 1,
            max_records: None,
            item_delay_ms: 0,
            pdf_url_template: None,
            pdf_password: None,
            log: LogConfig::default(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl HarvestConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(content).map_err(|err| ConfigError::Parse {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|err| ConfigError::Invalid(format!("endpoint {:?}: {err}", self.endpoint)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "endpoint must be http(s), got {}",
                endpoint.scheme()
            )));
        }
        if self.metadata_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("metadata_prefix is empty".to_string()));
        }
        if self.verb == Verb::GetRecord && self.identifier.is_none() {
            return Err(ConfigError::Invalid("GetRecord needs an identifier".to_string()));
        }
        if let (Some(from), Some(until)) = (self.from, self.until) {
            let same_granularity = matches!(
                (from, until),
                (OaiDate::Day(_), OaiDate::Day(_)) | (OaiDate::Seconds(_), OaiDate::Seconds(_))
            );
            if !same_granularity {
                return Err(ConfigError::Invalid(
                    "from and until must use the same granularity".to_string(),
                ));
            }
            if from > until {
                return Err(ConfigError::Invalid(format!("from {from} is after until {until}")));
            }
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.max_records == Some(0) {
            return Err(ConfigError::Invalid("max_records must be at least 1".to_string()));
        }
        self.log.level_filter()?;
        Ok(())
    }

    pub fn request(&self) -> HarvestRequest {
        HarvestRequest {
            verb: self.verb,
            metadata_prefix: self.metadata_prefix.clone(),
            set: self.set.clone(),
            from: self.from,
            until: self.until,
            identifier: self.identifier.clone(),
            resumption_token: None,
        }
    }

    pub fn oai_fetch(&self) -> FetchSettings {
        self.fetch.apply(FetchSettings::for_oai(), self.fetch.max_oai_bytes)
    }

    pub fn pdf_fetch(&self) -> FetchSettings {
        self.fetch.apply(FetchSettings::for_pdf(), self.fetch.max_pdf_bytes)
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            retry: RetryPolicy {
                max_retries: self.retry.max_retries,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_secs(self.retry.max_delay_secs),
                max_token_restarts: self.retry.max_token_restarts,
            },
            workers: self.workers,
            pdf_url_template: self.pdf_url_template.clone(),
            max_records: self.max_records,
            item_delay: Duration::from_millis(self.item_delay_ms),
            ..RunSettings::new(self.endpoint.clone())
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            write_fulltext: self.write_fulltext,
            ..ExportOptions::default()
        }
    }
}
