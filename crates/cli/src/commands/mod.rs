pub mod book;
pub mod catalog;
pub mod config;
pub mod quote;

use serde::Serialize;
use serde_json::{json, Value};
use shutterbook_core::config::{AppConfig, ConfigError};
use shutterbook_core::errors::ApplicationError;
use shutterbook_core::pricing::catalog::CatalogError;
use shutterbook_core::pricing::PriceBook;
use shutterbook_core::ServiceId;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, Value::Null)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with_data(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Exit-code-2 outcome for a configuration that failed to load or validate.
pub(crate) fn config_failure(command: &str, error: ConfigError) -> CommandResult {
    let message = format!("configuration issue: {error}");
    let interface = ApplicationError::Configuration(error.to_string())
        .into_interface(format!("cli-{command}"));
    CommandResult::failure_with_data(
        command,
        "config_validation",
        message,
        2,
        Some(json!({ "user_message": interface.user_message(), "detail": interface.to_string() })),
    )
}

/// Configured catalog file when set, otherwise the embedded one.
pub(crate) fn load_price_book(config: &AppConfig) -> Result<PriceBook, CatalogError> {
    let book = match &config.booking.catalog_path {
        Some(path) => PriceBook::load(path)?,
        None => PriceBook::builtin()?,
    };
    Ok(book.with_currency(config.booking.currency.clone()))
}

/// Parses `id[=qty]`. The key may be a service id or its display name.
pub(crate) fn parse_service_spec(
    book: &PriceBook,
    spec: &str,
) -> Result<(ServiceId, u32), String> {
    let (key, quantity) = match spec.rsplit_once('=') {
        Some((key, raw_quantity)) => {
            let quantity = raw_quantity
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid quantity in `{spec}`"))?;
            (key, quantity)
        }
        None => (spec, 1),
    };

    let service = book
        .catalog()
        .resolve(key.trim())
        .ok_or_else(|| format!("unknown service `{}`", key.trim()))?;
    Ok((service.id.clone(), quantity))
}
