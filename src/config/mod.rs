//! Service configuration: TOML file or environment.
//!
//! Lookup order:
//! 1) $BRIEF_CONFIG_PATH (must exist)
//! 2) config/brief.toml
//! 3) environment variables only

pub mod ai;
pub mod email;

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use ai::GenerationConfig;
pub use email::EmailConfig;

pub const ENV_CONFIG_PATH: &str = "BRIEF_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/brief.toml";

/// Largest real-world UTC offset, in minutes.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

fn default_title() -> String {
    crate::render::DEFAULT_TITLE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Offset used for masthead/subject dates.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            utc_offset_minutes: 0,
        }
    }
}

impl ReportConfig {
    pub fn offset(&self) -> FixedOffset {
        let secs = self.utc_offset_minutes.clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES) * 60;
        FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    /// Seconds between automatic scan-and-deliver runs.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BriefConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
    /// Shared secret for the recurring trigger. "ENV" means: read from CRON_SECRET.
    #[serde(default)]
    pub cron_secret: Option<String>,
    #[serde(default)]
    pub metrics_enabled: bool,
}

impl BriefConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: BriefConfig = toml::from_str(s).context("parsing brief config")?;
        cfg.finalize()
    }

    pub fn from_env() -> Result<Self> {
        let report = ReportConfig {
            title: env::var("REPORT_TITLE").unwrap_or_else(|_| default_title()),
            utc_offset_minutes: env::var("REPORT_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        };
        let schedule = env::var("SCHEDULE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|interval_secs| ScheduleConfig { interval_secs });
        let cfg = BriefConfig {
            generation: GenerationConfig::from_env(),
            email: EmailConfig::from_env(),
            report,
            schedule,
            cron_secret: env::var("CRON_SECRET").ok(),
            metrics_enabled: env::var("METRICS_ENABLED")
                .map(|v| ai::parse_bool(&v))
                .unwrap_or(false),
        };
        cfg.finalize()
    }

    /// File if one is found (see module docs), environment otherwise.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        Self::from_env()
    }

    fn finalize(mut self) -> Result<Self> {
        self.generation = self.generation.finalize()?;
        self.email = self.email.finalize()?;
        self.cron_secret = match self.cron_secret.take() {
            Some(s) if s.trim().eq_ignore_ascii_case("env") => env::var("CRON_SECRET").ok(),
            other => other,
        }
        .filter(|s| !s.trim().is_empty());
        self.report.utc_offset_minutes = self
            .report
            .utc_offset_minutes
            .clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES);
        if self.report.title.trim().is_empty() {
            self.report.title = default_title();
        }
        self.schedule = self.schedule.filter(|s| s.interval_secs >= 60);

        // Safe diagnostics only: presence and lengths, never values.
        info!(
            target: "config",
            provider = %self.generation.provider,
            model = %self.generation.model,
            key_len = self.generation.api_key.len(),
            transport = %self.email.transport,
            recipient_set = self.email.recipient.is_some(),
            cron_secret_set = self.cron_secret.is_some(),
            "brief config loaded"
        );
        Ok(self)
    }
}
