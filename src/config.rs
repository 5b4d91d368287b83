use crate::decision;
use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080/proxy";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutputType {
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTarget {
    #[serde(rename = "type")]
    pub output_type: LogOutputType,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub level: Option<LogLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub format: Option<LogFormat>,
    #[serde(default)]
    pub targets: Option<Vec<LogTarget>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Some(LogLevel::Info),
            format: Some(LogFormat::Text),
            targets: Some(vec![LogTarget {
                output_type: LogOutputType::Stdout,
                path: None,
                level: None,
            }]),
        }
    }
}

/// The `outbound_gateway` section of the configuration file.
///
/// Every field is optional so that a partial section still deserializes;
/// [`GatewaySettings::from_config`] fills the gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundGatewayConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "forwardProxyHeader")]
    pub forward_proxy_header: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, alias = "outboundGateway")]
    pub outbound_gateway: Option<OutboundGatewayConfig>,
    // Default for requests without their own timeout; 0 means "use 600000"
    #[serde(default, alias = "requestTimeout", alias = "requestTimeoutMs")]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> Result<(), GatewayError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Rejects a gateway URL that cannot be dialed. A disabled gateway is
    /// never validated.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let Some(gateway) = self.outbound_gateway.as_ref() else {
            return Ok(());
        };
        if !decision::is_enabled(Some(gateway)) {
            return Ok(());
        }

        let raw = gateway
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_GATEWAY_URL);
        let url = Url::parse(raw)?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(GatewayError::Config(format!(
                    "Gateway URL must use http or https, got '{}'",
                    other
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(GatewayError::Config(format!("Gateway URL has no host: {}", raw)));
        }

        Ok(())
    }
}

/// Configuration with every default resolved, handed to the forwarder at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub enabled: bool,
    pub url: String,
    pub forward_proxy_header: bool,
    pub default_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_GATEWAY_URL.to_string(),
            forward_proxy_header: true,
            default_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        config.validate()?;

        let gateway = config.outbound_gateway.as_ref();
        let url = gateway
            .and_then(|g| g.url.as_deref())
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_GATEWAY_URL)
            .to_string();

        Ok(Self {
            enabled: decision::is_enabled(gateway),
            url,
            forward_proxy_header: gateway
                .and_then(|g| g.forward_proxy_header)
                .unwrap_or(true),
            default_timeout: Duration::from_millis(
                config
                    .request_timeout_ms
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
        })
    }

    /// Settings for an enabled gateway at `url`, everything else default.
    pub fn enabled(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_forward_proxy_header(mut self, forward: bool) -> Self {
        self.forward_proxy_header = forward;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}
