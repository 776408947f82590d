use crate::error::{ClientError, ClientResult};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub upload: UploadConfig,
    pub download: DownloadConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Sent as HTTP basic credentials when the service is password protected.
    pub auth_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub interval: Duration,
    pub max_polls: u32,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size_mb: u64,
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub min_free_space_mb: u64,
    pub download_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl PollingConfig {
    /// Rejects values the poll loop cannot run with.
    pub fn validate(&self) -> ClientResult<()> {
        if self.interval.is_zero() {
            return Err(ClientError::Config("Poll interval must be greater than zero".to_string()));
        }
        if self.max_polls == 0 {
            return Err(ClientError::Config("Maximum poll count must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_polls: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let parse_env_var = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_env_number = |key: &str, default: u64| -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let parse_env_u32 = |key: &str, default: u32| -> u32 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let parse_env_duration = |key: &str, default_secs: u64| -> Duration {
            Duration::from_secs(parse_env_number(key, default_secs))
        };

        let polling_defaults = PollingConfig::default();

        Config {
            api: ApiConfig {
                base_url: parse_env_var("PDFSTATION_API_URL", "http://localhost:8081"),
                request_timeout: parse_env_duration("PDFSTATION_REQUEST_TIMEOUT", 120),
                connect_timeout: parse_env_duration("PDFSTATION_CONNECT_TIMEOUT", 10),
                auth_password: std::env::var("PDFSTATION_AUTH_PASSWORD")
                    .ok()
                    .filter(|s| !s.is_empty()),
            },
            polling: PollingConfig {
                interval: Duration::from_millis(parse_env_number(
                    "PDFSTATION_POLL_INTERVAL_MS",
                    polling_defaults.interval.as_millis() as u64,
                )),
                max_polls: parse_env_u32("PDFSTATION_MAX_POLLS", polling_defaults.max_polls),
            },
            upload: UploadConfig {
                max_file_size_mb: parse_env_number("PDFSTATION_MAX_FILE_SIZE_MB", 20),
            },
            download: DownloadConfig {
                output_dir: PathBuf::from(parse_env_var("PDFSTATION_OUTPUT_DIR", ".")),
                min_free_space_mb: parse_env_number("PDFSTATION_MIN_FREE_SPACE_MB", 64),
                download_timeout: parse_env_duration("PDFSTATION_DOWNLOAD_TIMEOUT", 600),
            },
            logging: LoggingConfig {
                filter: parse_env_var("RUST_LOG", "pdfstation=info,pdfstation_client=warn"),
                format: match parse_env_var("PDFSTATION_LOG_FORMAT", "pretty").to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                },
            },
        }
    }
}

impl Config {
    pub fn validate(&self) -> ClientResult<()> {
        self.polling.validate()
    }
}

pub fn load_config() -> Config {
    Config::default()
}
