use chrono::TimeDelta;
use clap::Parser;
use std::time::Duration;

use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "cna-report-gateway")]
#[command(about = "Rate-limited incident report generation for CNA documentation")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 5000)]
    pub port: u16,

    // OpenAI-compatible API base url
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    pub model: String,

    // Completion request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub request_timeout: u64,

    // Report generations allowed per window, per client IP
    #[arg(long, default_value_t = DEFAULT_MAX_REQUESTS)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECS as u64)]
    pub rate_window: u64,

    // Key clients by the first X-Forwarded-For entry (only behind a trusted proxy)
    #[arg(long, default_value_t = false)]
    pub trust_forwarded_for: bool,

    // Bearer token for the admin endpoints; admin is disabled when unset
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    // Generation worker tasks
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    // Pending generation jobs before requests are turned away
    #[arg(long, default_value_t = 100)]
    pub queue_capacity: usize,

    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--rate-limit must be at least 1")]
    ZeroRateLimit,

    #[error("--rate-window must be at least 1 second")]
    ZeroRateWindow,

    #[error("--rate-window of {0} seconds is out of range")]
    RateWindowOutOfRange(u64),

    #[error("--workers must be at least 1")]
    ZeroWorkers,

    #[error("--queue-capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("--request-timeout must be at least 1 second")]
    ZeroRequestTimeout,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

// Validated runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub openai: OpenAiSettings,
    pub rate_limit: u32,
    pub rate_window: TimeDelta,
    pub trust_forwarded_for: bool,
    pub admin_token: Option<String>,
    pub workers: usize,
    pub queue_capacity: usize,
    pub verbose: bool,
}

impl Args {
    pub fn validate(self) -> Result<Settings, ConfigError> {
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.rate_window == 0 {
            return Err(ConfigError::ZeroRateWindow);
        }
        let rate_window = i64::try_from(self.rate_window)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or(ConfigError::RateWindowOutOfRange(self.rate_window))?;
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        // a zero timeout would fail every completion call
        if self.request_timeout == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }

        Ok(Settings {
            port: self.port,
            openai: OpenAiSettings {
                base_url: self.openai_base_url,
                api_key: self.openai_api_key,
                model: self.model,
                timeout: Duration::from_secs(self.request_timeout),
            },
            rate_limit: self.rate_limit,
            rate_window,
            trust_forwarded_for: self.trust_forwarded_for,
            // an empty token would let "Bearer " through
            admin_token: self.admin_token.filter(|t| !t.trim().is_empty()),
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            verbose: self.verbose,
        })
    }
}
