//! Service configuration
//!
//! Everything comes from the environment: credentials and base URLs for the
//! two external collaborators, plus the policy constants (follow-up delay,
//! scheduler interval, trigger keyword, follow-up label) that the original
//! deployment hard-coded.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Runtime configuration for the follow-up service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Messaging gateway base URL
    pub wassenger_api_url: String,
    /// Messaging gateway bearer token
    pub wassenger_api_key: String,
    /// Completion service base URL
    pub openai_api_url: String,
    /// Completion service bearer token
    pub openai_api_key: String,
    /// Model identifier passed to the completion service
    pub openai_model: String,
    /// SQLite database path
    pub database_path: String,
    /// Webhook server port
    pub bind_port: u16,
    /// Delay between a trigger and the initial outbound message
    pub followup_delay: Duration,
    /// Scheduler wake interval
    pub scheduler_interval: Duration,
    /// Operator keyword that schedules a follow-up (matched case-insensitively)
    pub trigger_keyword: String,
    /// Contact label that schedules a follow-up
    pub followup_label: String,
    /// Timeout applied to every gateway and completion-service request
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wassenger_api_url: "https://api.wassenger.com/v1".to_string(),
            wassenger_api_key: String::new(),
            openai_api_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o".to_string(),
            database_path: "followcare.db".to_string(),
            bind_port: 5000,
            followup_delay: Duration::from_secs(86_400),
            scheduler_interval: Duration::from_secs(60),
            trigger_keyword: "START FOLLOWUP".to_string(),
            followup_label: "Follow-up".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment. The two API keys are
    /// required; everything else falls back to the defaults above.
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();

        Ok(Self {
            wassenger_api_url: var_or("WASSENGER_API_URL", &defaults.wassenger_api_url),
            wassenger_api_key: required("WASSENGER_API_KEY")?,
            openai_api_url: var_or("OPENAI_API_URL", &defaults.openai_api_url),
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_model: var_or("OPENAI_MODEL", &defaults.openai_model),
            database_path: var_or("DATABASE_PATH", &defaults.database_path),
            bind_port: parsed_var("BIND_PORT", defaults.bind_port)?,
            followup_delay: Duration::from_secs(parsed_var(
                "FOLLOWUP_DELAY_SECS",
                defaults.followup_delay.as_secs(),
            )?),
            scheduler_interval: Duration::from_secs(parsed_var(
                "SCHEDULER_INTERVAL_SECS",
                defaults.scheduler_interval.as_secs(),
            )?),
            trigger_keyword: var_or("TRIGGER_KEYWORD", &defaults.trigger_keyword),
            followup_label: var_or("FOLLOWUP_LABEL", &defaults.followup_label),
            request_timeout: Duration::from_secs(parsed_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("missing required environment variable {key}"))
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}
