use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{SessionSettings, DEFAULT_NOTES_PLACEHOLDER};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub booking: BookingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub encoding: PayloadEncoding,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub require_size: bool,
    pub notes_placeholder: String,
    pub catalog_path: Option<PathBuf>,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Body encoding used when posting a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    Form,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub gateway_endpoint: Option<String>,
    pub gateway_api_key: Option<String>,
    pub gateway_timeout_secs: Option<u64>,
    pub gateway_encoding: Option<PayloadEncoding>,
    pub catalog_path: Option<PathBuf>,
    pub require_size: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                endpoint: None,
                api_key: None,
                timeout_secs: 30,
                encoding: PayloadEncoding::Form,
            },
            booking: BookingConfig {
                require_size: true,
                notes_placeholder: DEFAULT_NOTES_PLACEHOLDER.to_string(),
                catalog_path: None,
                currency: "USD".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for PayloadEncoding {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "form" => Ok(Self::Form),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported gateway encoding `{other}` (expected form|json)"
            ))),
        }
    }
}

impl PayloadEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl From<&BookingConfig> for SessionSettings {
    fn from(booking: &BookingConfig) -> Self {
        Self {
            require_size: booking.require_size,
            notes_placeholder: booking.notes_placeholder.clone(),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("shutterbook.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::from(&self.booking)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(gateway) = patch.gateway {
            if let Some(endpoint) = gateway.endpoint {
                self.gateway.endpoint = Some(endpoint);
            }
            if let Some(gateway_api_key_value) = gateway.api_key {
                self.gateway.api_key = Some(secret_value(gateway_api_key_value));
            }
            if let Some(timeout_secs) = gateway.timeout_secs {
                self.gateway.timeout_secs = timeout_secs;
            }
            if let Some(encoding) = gateway.encoding {
                self.gateway.encoding = encoding;
            }
        }

        if let Some(booking) = patch.booking {
            if let Some(require_size) = booking.require_size {
                self.booking.require_size = require_size;
            }
            if let Some(notes_placeholder) = booking.notes_placeholder {
                self.booking.notes_placeholder = notes_placeholder;
            }
            if let Some(catalog_path) = booking.catalog_path {
                self.booking.catalog_path = Some(catalog_path);
            }
            if let Some(currency) = booking.currency {
                self.booking.currency = currency;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHUTTERBOOK_GATEWAY_ENDPOINT") {
            self.gateway.endpoint = Some(value);
        }
        if let Some(value) = read_env("SHUTTERBOOK_GATEWAY_API_KEY") {
            self.gateway.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SHUTTERBOOK_GATEWAY_TIMEOUT_SECS") {
            self.gateway.timeout_secs = parse_u64("SHUTTERBOOK_GATEWAY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHUTTERBOOK_GATEWAY_ENCODING") {
            self.gateway.encoding = value.parse()?;
        }

        if let Some(value) = read_env("SHUTTERBOOK_BOOKING_REQUIRE_SIZE") {
            self.booking.require_size = parse_bool("SHUTTERBOOK_BOOKING_REQUIRE_SIZE", &value)?;
        }
        if let Some(value) = read_env("SHUTTERBOOK_BOOKING_NOTES_PLACEHOLDER") {
            self.booking.notes_placeholder = value;
        }
        if let Some(value) = read_env("SHUTTERBOOK_BOOKING_CATALOG_PATH") {
            self.booking.catalog_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("SHUTTERBOOK_BOOKING_CURRENCY") {
            self.booking.currency = value;
        }

        let log_level =
            read_env("SHUTTERBOOK_LOGGING_LEVEL").or_else(|| read_env("SHUTTERBOOK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHUTTERBOOK_LOGGING_FORMAT").or_else(|| read_env("SHUTTERBOOK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(endpoint) = overrides.gateway_endpoint {
            self.gateway.endpoint = Some(endpoint);
        }
        if let Some(api_key) = overrides.gateway_api_key {
            self.gateway.api_key = Some(secret_value(api_key));
        }
        if let Some(timeout_secs) = overrides.gateway_timeout_secs {
            self.gateway.timeout_secs = timeout_secs;
        }
        if let Some(encoding) = overrides.gateway_encoding {
            self.gateway.encoding = encoding;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.booking.catalog_path = Some(catalog_path);
        }
        if let Some(require_size) = overrides.require_size {
            self.booking.require_size = require_size;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gateway(&self.gateway)?;
        validate_booking(&self.booking)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shutterbook.toml"), PathBuf::from("config/shutterbook.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &gateway.endpoint {
        let endpoint = endpoint.trim();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "gateway.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }

    if let Some(api_key) = &gateway.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "gateway.api_key must not be blank when set".to_string(),
            ));
        }
    }

    if gateway.timeout_secs == 0 || gateway.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "gateway.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if booking.notes_placeholder.trim().is_empty() {
        return Err(ConfigError::Validation(
            "booking.notes_placeholder must not be blank".to_string(),
        ));
    }

    let currency = booking.currency.as_str();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "booking.currency must be a 3-letter uppercase code, got `{currency}`"
        )));
    }

    if let Some(path) = &booking.catalog_path {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "booking.catalog_path `{}` does not exist",
                path.display()
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    gateway: Option<GatewayPatch>,
    booking: Option<BookingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    encoding: Option<PayloadEncoding>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    require_size: Option<bool>,
    notes_placeholder: Option<String>,
    catalog_path: Option<PathBuf>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
