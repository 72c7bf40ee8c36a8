//! HTTP delivery of booking payloads.
//!
//! Posts either flat form fields (what a spreadsheet web-app endpoint reads
//! from `e.parameter`) or the camelCase JSON payload. A single attempt per
//! call, bounded by the configured client timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use shutterbook_core::config::{GatewayConfig, PayloadEncoding};
use shutterbook_core::gateway::{
    GatewayError, SubmissionAck, SubmissionGateway, SubmissionPayload,
};
use shutterbook_core::pricing::format_money;
use tracing::{info, warn};
use uuid::Uuid;

pub struct HttpSubmissionGateway {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    encoding: PayloadEncoding,
    timeout_secs: u64,
}

impl HttpSubmissionGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        encoding: PayloadEncoding,
        timeout_secs: u64,
    ) -> Result<Self, GatewayError> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint).map_err(|error| {
            GatewayError::Transport(format!("invalid endpoint `{endpoint}`: {error}"))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        Ok(Self { client, endpoint, api_key, encoding, timeout_secs })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let endpoint = config.endpoint.clone().ok_or(GatewayError::NotConfigured)?;
        Self::new(endpoint, config.api_key.clone(), config.encoding, config.timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout { after_secs: self.timeout_secs }
        } else {
            GatewayError::Transport(error.to_string())
        }
    }
}

/// Flat field list for `application/x-www-form-urlencoded` delivery.
pub fn form_fields(payload: &SubmissionPayload) -> Vec<(&'static str, String)> {
    vec![
        ("timestamp", payload.submitted_at.to_rfc3339()),
        ("propertySize", payload.property_size.clone()),
        ("services", payload.services_summary.clone()),
        ("subtotal", format_money(payload.subtotal)),
        ("discountPercent", payload.discount_percent.normalize().to_string()),
        ("totalAmount", format_money(payload.total)),
        ("address", payload.address.single_line()),
        ("notes", payload.notes.clone()),
        ("preferredDate", payload.preferred_date.format("%B %-d, %Y").to_string()),
        ("propertyStatus", payload.occupancy_status.clone()),
    ]
}

/// Picks a booking reference out of the response body, if it carries one.
fn reference_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["reference", "row", "id"].iter().find_map(|key| match value.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

#[async_trait]
impl SubmissionGateway for HttpSubmissionGateway {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionAck, GatewayError> {
        let mut request = self.client.post(&self.endpoint);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }
        request = match self.encoding {
            PayloadEncoding::Form => request.form(&form_fields(payload)),
            PayloadEncoding::Json => request.json(payload),
        };

        info!(
            event_name = "gateway.request_sent",
            endpoint = %self.endpoint,
            encoding = self.encoding.as_str(),
            total = %payload.total,
            "posting booking"
        );

        let response = request.send().await.map_err(|error| self.map_send_error(error))?;
        let status = response.status();
        let body = response.text().await.map_err(|error| self.map_send_error(error))?;

        if !status.is_success() {
            warn!(
                event_name = "gateway.request_rejected",
                endpoint = %self.endpoint,
                status = %status,
                "booking endpoint rejected submission"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let reference = reference_from_body(&body).unwrap_or_else(|| format!("http-{}", Uuid::new_v4()));
        info!(
            event_name = "gateway.request_accepted",
            endpoint = %self.endpoint,
            reference = %reference,
            "booking endpoint accepted submission"
        );
        Ok(SubmissionAck::new(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::{reference_from_body, HttpSubmissionGateway};
    use shutterbook_core::config::{GatewayConfig, PayloadEncoding};
    use shutterbook_core::gateway::GatewayError;

    #[test]
    fn reference_prefers_explicit_field_then_row_number() {
        assert_eq!(reference_from_body(r#"{"reference":"BK-9"}"#), Some("BK-9".to_owned()));
        assert_eq!(reference_from_body(r#"{"result":"success","row":42}"#), Some("42".to_owned()));
        assert_eq!(reference_from_body("ok"), None);
        assert_eq!(reference_from_body(r#"{"reference":"  "}"#), None);
    }

    #[test]
    fn missing_endpoint_is_not_configured() {
        let config = GatewayConfig {
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
            encoding: PayloadEncoding::Form,
        };
        assert!(matches!(
            HttpSubmissionGateway::from_config(&config),
            Err(GatewayError::NotConfigured)
        ));
    }

    #[test]
    fn malformed_endpoint_is_rejected_up_front() {
        let result = HttpSubmissionGateway::new("not a url", None, PayloadEncoding::Json, 5);
        assert!(matches!(result, Err(GatewayError::Transport(ref message)) if message.contains("not a url")));
    }
}
