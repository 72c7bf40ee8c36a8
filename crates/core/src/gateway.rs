//! Contract for the external booking sink.
//!
//! The session calls [`SubmissionGateway::submit`] at most once per validated
//! submit and never retries; a failure is handed back to the user.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::order::Address;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadLine {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub submitted_at: DateTime<Utc>,
    pub property_size: String,
    pub services: Vec<PayloadLine>,
    pub services_summary: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub address: Address,
    pub preferred_date: NaiveDate,
    pub occupancy_status: String,
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub reference: String,
    pub accepted_at: DateTime<Utc>,
}

impl SubmissionAck {
    pub fn new(reference: impl Into<String>) -> Self {
        Self { reference: reference.into(), accepted_at: Utc::now() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("booking endpoint rejected the submission with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("booking endpoint did not answer within {after_secs}s")]
    Timeout { after_secs: u64 },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("payload encoding failed: {0}")]
    Encoding(String),
    #[error("no booking endpoint is configured")]
    NotConfigured,
}

#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionAck, GatewayError>;
}

/// Records payloads in memory. Can be primed to fail, for tests and dry runs.
#[derive(Clone, Default)]
pub struct InMemorySubmissionGateway {
    submissions: Arc<Mutex<Vec<SubmissionPayload>>>,
    failure: Arc<Mutex<Option<GatewayError>>>,
}

impl InMemorySubmissionGateway {
    pub fn failing(error: GatewayError) -> Self {
        let gateway = Self::default();
        gateway.fail_with(Some(error));
        gateway
    }

    /// Every later submit returns `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<GatewayError>) {
        match self.failure.lock() {
            Ok(mut failure) => *failure = error,
            Err(poisoned) => *poisoned.into_inner() = error,
        }
    }

    pub fn submissions(&self) -> Vec<SubmissionPayload> {
        match self.submissions.lock() {
            Ok(submissions) => submissions.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn configured_failure(&self) -> Option<GatewayError> {
        match self.failure.lock() {
            Ok(failure) => failure.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SubmissionGateway for InMemorySubmissionGateway {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionAck, GatewayError> {
        if let Some(error) = self.configured_failure() {
            return Err(error);
        }
        match self.submissions.lock() {
            Ok(mut submissions) => submissions.push(payload.clone()),
            Err(poisoned) => poisoned.into_inner().push(payload.clone()),
        }
        Ok(SubmissionAck::new(format!("mem-{}", Uuid::new_v4())))
    }
}
