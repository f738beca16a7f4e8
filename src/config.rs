use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Completion API provider
    #[arg(long, env = "PROVIDER", value_enum, default_value = "deepseek")]
    pub provider: Provider,

    /// Completion endpoint URL, overriding the provider default
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Model identifier, overriding the provider default
    #[arg(long, env = "MODEL")]
    pub model: Option<String>,

    /// Seconds to wait for the completion API before giving up
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Append-only log of successful classifications
    #[arg(long, env = "CLASSIFICATION_LOG", default_value = "classifications.log")]
    pub classification_log: PathBuf,

    /// Append-only log of classification failures
    #[arg(long, env = "ERROR_LOG", default_value = "errors.log")]
    pub error_log: PathBuf,

    /// Requests allowed per client address per minute (0 disables)
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value = "10")]
    pub rate_limit_per_minute: u32,

    /// Requests allowed per client address per hour (0 disables)
    #[arg(long, env = "RATE_LIMIT_PER_HOUR", default_value = "50")]
    pub rate_limit_per_hour: u32,

    /// Requests allowed per client address per day (0 disables)
    #[arg(long, env = "RATE_LIMIT_PER_DAY", default_value = "200")]
    pub rate_limit_per_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Deepseek,
    Openrouter,
}

impl Provider {
    fn default_url(self) -> &'static str {
        match self {
            Provider::Deepseek => "https://api.deepseek.com/v1/chat/completions",
            Provider::Openrouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Provider::Deepseek => "deepseek-chat",
            Provider::Openrouter => "deepseek/deepseek-chat:free",
        }
    }

    fn title(self) -> Option<&'static str> {
        match self {
            Provider::Deepseek => None,
            Provider::Openrouter => Some("DDC Generator"),
        }
    }
}

/// Where classification requests are sent.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub model: String,
    /// Sent as `X-Title` for providers that attribute traffic by app name.
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
}

impl From<&Config> for RateLimitConfig {
    fn from(config: &Config) -> Self {
        Self {
            per_minute: config.rate_limit_per_minute,
            per_hour: config.rate_limit_per_hour,
            per_day: config.rate_limit_per_day,
        }
    }
}

impl Config {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            url: self
                .api_url
                .clone()
                .unwrap_or_else(|| self.provider.default_url().to_string()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.provider.default_model().to_string()),
            title: self.provider.title().map(str::to_string),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
