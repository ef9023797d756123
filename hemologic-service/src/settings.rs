use hemo_flow::client::DEFAULT_REQUEST_TIMEOUT;
use hemo_flow::reveal::DEFAULT_REVEAL_INTERVAL;
use std::path::PathBuf;
use std::time::Duration;

/// Scanned lab reports can be large PDFs.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Process-level settings read from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub port: u16,
    /// JSON file backing the endpoint configuration; in-memory when unset.
    pub config_path: Option<PathBuf>,
    pub reveal_interval: Duration,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            config_path: None,
            reveal_interval: DEFAULT_REVEAL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            log_format: LogFormat::Json,
        }
    }
}

impl ServiceSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        Self {
            port: lookup("PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(defaults.port),
            config_path: lookup("HEMOLOGIC_CONFIG_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            reveal_interval: millis("HEMOLOGIC_REVEAL_INTERVAL_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.reveal_interval),
            request_timeout: millis("HEMOLOGIC_REQUEST_TIMEOUT_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.request_timeout),
            max_upload_bytes: lookup("HEMOLOGIC_MAX_UPLOAD_BYTES")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|bytes| *bytes > 0)
                .unwrap_or(defaults.max_upload_bytes),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("pretty") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
        }
    }
}
