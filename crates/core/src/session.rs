//! The order session: one user's in-progress booking.
//!
//! Every mutation goes through a named intent method. The [`FlowEngine`]
//! decides whether an intent is allowed in the current state and which
//! follow-up actions run; a rejected transition leaves the session untouched
//! and is reported as [`IntentOutcome::Ignored`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use crate::domain::order::{AddressField, FormField, OrderFormData};
use crate::domain::property::PropertySizeBucket;
use crate::domain::selection::Selection;
use crate::domain::service::ServiceId;
use crate::errors::DomainError;
use crate::flows::{
    BookingFlow, FlowAction, FlowContext, FlowEngine, FlowEvent, FlowState, TransitionOutcome,
};
use crate::gateway::{GatewayError, PayloadLine, SubmissionAck, SubmissionGateway, SubmissionPayload};
use crate::pricing::{format_money, PriceBook, PricingResult};

pub const SUBMISSION_FAILURE_NOTICE: &str =
    "There was an error submitting your booking. Please try again.";
pub const DEFAULT_NOTES_PLACEHOLDER: &str = "No additional notes";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub require_size: bool,
    pub notes_placeholder: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { require_size: true, notes_placeholder: DEFAULT_NOTES_PLACEHOLDER.to_owned() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredReason {
    SubmissionInFlight,
    SessionCompleted,
    ServiceNotSelected,
    NoSubmissionInFlight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentOutcome {
    Applied,
    Ignored(IgnoredReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Synchronous intents a renderer can forward as data. Submission is async
/// and goes through [`OrderSession::submit`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingIntent {
    SelectSize { size: PropertySizeBucket },
    ToggleService {
        service_id: ServiceId,
        #[serde(default = "default_quantity")]
        quantity: u32,
    },
    SetQuantity { service_id: ServiceId, quantity: u32 },
    ChangeAddressField { field: AddressField, value: String },
    ChangeFormField { field: FormField },
    Reset,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub reference: String,
    pub accepted_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub property_size: String,
    pub services_summary: String,
    pub total: Decimal,
}

impl SubmissionReceipt {
    fn new(ack: SubmissionAck, payload: &SubmissionPayload) -> Self {
        Self {
            reference: ack.reference,
            accepted_at: ack.accepted_at,
            submitted_at: payload.submitted_at,
            property_size: payload.property_size.clone(),
            services_summary: payload.services_summary.clone(),
            total: payload.total,
        }
    }
}

pub enum BeginSubmission {
    Ready(SubmissionPayload),
    Invalid(Vec<String>),
    Ignored(IgnoredReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(SubmissionReceipt),
    Invalid(Vec<String>),
    Failed { notice: String, error: GatewayError },
    Ignored(IgnoredReason),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLine {
    pub service_id: ServiceId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

/// Owned, read-only view of a session for renderers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SubmissionStatus,
    pub property_size: Option<PropertySizeBucket>,
    pub property_size_label: Option<String>,
    pub lines: Vec<SnapshotLine>,
    pub pricing: PricingResult,
    pub form: OrderFormData,
    pub validation_errors: Vec<String>,
    pub notice: Option<String>,
    pub receipt: Option<SubmissionReceipt>,
}

pub struct OrderSession {
    id: String,
    book: Arc<PriceBook>,
    settings: SessionSettings,
    engine: FlowEngine<BookingFlow>,
    audit_sink: Arc<dyn AuditSink>,
    audit: AuditContext,
    state: FlowState,
    bucket: Option<PropertySizeBucket>,
    selection: Selection,
    form: OrderFormData,
    pricing: PricingResult,
    validation_errors: Vec<String>,
    notice: Option<String>,
    in_flight: Option<SubmissionPayload>,
    staged_receipt: Option<SubmissionReceipt>,
    receipt: Option<SubmissionReceipt>,
}

impl OrderSession {
    pub fn new(book: Arc<PriceBook>, settings: SessionSettings) -> Self {
        let id = Uuid::new_v4().to_string();
        let engine = FlowEngine::default();
        let selection = Selection::default();
        let pricing = book.price(&selection);
        Self {
            audit: AuditContext::new(id.clone(), id.clone(), "booking-session"),
            id,
            state: engine.initial_state(),
            book,
            settings,
            engine,
            audit_sink: Arc::new(TracingAuditSink),
            bucket: None,
            selection,
            form: OrderFormData::default(),
            pricing,
            validation_errors: Vec::new(),
            notice: None,
            in_flight: None,
            staged_receipt: None,
            receipt: None,
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.audit.correlation_id = correlation_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.id
    }

    pub fn flow_state(&self) -> FlowState {
        self.state
    }

    pub fn status(&self) -> SubmissionStatus {
        match self.state {
            FlowState::Submitting => SubmissionStatus::Submitting,
            FlowState::Succeeded => SubmissionStatus::Succeeded,
            FlowState::Editing if self.notice.is_some() => SubmissionStatus::Failed,
            FlowState::Idle | FlowState::Editing => SubmissionStatus::Idle,
        }
    }

    pub fn size(&self) -> Option<PropertySizeBucket> {
        self.bucket
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn form(&self) -> &OrderFormData {
        &self.form
    }

    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn select_size(&mut self, bucket: PropertySizeBucket) -> IntentOutcome {
        let outcome = match self.advance(FlowEvent::SelectionEdited, &FlowContext::default()) {
            Ok(outcome) => outcome,
            Err(reason) => return IntentOutcome::Ignored(reason),
        };

        self.bucket = Some(bucket);
        let book = Arc::clone(&self.book);
        self.selection.reprice(|service_id| match book.catalog().find(service_id) {
            Some(service) => book.unit_price(Some(bucket), service),
            None => Decimal::ZERO,
        });
        self.run_actions(&outcome, &FlowContext::default());

        info!(
            event_name = "booking.size_selected",
            session_id = %self.id,
            correlation_id = %self.audit.correlation_id,
            size = %bucket,
            services = self.selection.len(),
            "property size selected"
        );
        IntentOutcome::Applied
    }

    /// Removes the service when selected (whatever `quantity` says), otherwise
    /// adds it at the price for the current size with `quantity` clamped to
    /// `1..=MAX_QUANTITY`.
    pub fn toggle_service(
        &mut self,
        service_id: &ServiceId,
        quantity: u32,
    ) -> Result<IntentOutcome, DomainError> {
        if let Some(reason) = self.blocked_reason() {
            return Ok(IntentOutcome::Ignored(reason));
        }
        let service = self
            .book
            .catalog()
            .find(service_id)
            .cloned()
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown service `{service_id}`")))?;
        let outcome = match self.advance(FlowEvent::SelectionEdited, &FlowContext::default()) {
            Ok(outcome) => outcome,
            Err(reason) => return Ok(IntentOutcome::Ignored(reason)),
        };

        if self.selection.remove(service_id).is_none() {
            let unit_price = self.book.unit_price(self.bucket, &service);
            self.selection.insert(service.id, service.name, unit_price, quantity);
        }
        self.run_actions(&outcome, &FlowContext::default());
        Ok(IntentOutcome::Applied)
    }

    pub fn set_quantity(&mut self, service_id: &ServiceId, quantity: u32) -> IntentOutcome {
        if let Some(reason) = self.blocked_reason() {
            return IntentOutcome::Ignored(reason);
        }
        if !self.selection.contains(service_id) {
            debug!(
                event_name = "booking.intent_ignored",
                session_id = %self.id,
                service_id = %service_id,
                "quantity change for a service that is not selected"
            );
            return IntentOutcome::Ignored(IgnoredReason::ServiceNotSelected);
        }
        let outcome = match self.advance(FlowEvent::SelectionEdited, &FlowContext::default()) {
            Ok(outcome) => outcome,
            Err(reason) => return IntentOutcome::Ignored(reason),
        };

        self.selection.set_quantity(service_id, quantity);
        self.run_actions(&outcome, &FlowContext::default());
        IntentOutcome::Applied
    }

    pub fn change_address_field(
        &mut self,
        field: AddressField,
        value: impl Into<String>,
    ) -> IntentOutcome {
        let outcome = match self.advance(FlowEvent::FormEdited, &FlowContext::default()) {
            Ok(outcome) => outcome,
            Err(reason) => return IntentOutcome::Ignored(reason),
        };
        self.form.set_address_field(field, value);
        self.run_actions(&outcome, &FlowContext::default());
        IntentOutcome::Applied
    }

    pub fn change_form_field(&mut self, field: FormField) -> IntentOutcome {
        let outcome = match self.advance(FlowEvent::FormEdited, &FlowContext::default()) {
            Ok(outcome) => outcome,
            Err(reason) => return IntentOutcome::Ignored(reason),
        };
        self.form.set_field(field);
        self.run_actions(&outcome, &FlowContext::default());
        IntentOutcome::Applied
    }

    pub fn dispatch(&mut self, intent: BookingIntent) -> Result<IntentOutcome, DomainError> {
        match intent {
            BookingIntent::SelectSize { size } => Ok(self.select_size(size)),
            BookingIntent::ToggleService { service_id, quantity } => {
                self.toggle_service(&service_id, quantity)
            }
            BookingIntent::SetQuantity { service_id, quantity } => {
                Ok(self.set_quantity(&service_id, quantity))
            }
            BookingIntent::ChangeAddressField { field, value } => {
                Ok(self.change_address_field(field, value))
            }
            BookingIntent::ChangeFormField { field } => Ok(self.change_form_field(field)),
            BookingIntent::Reset => {
                self.reset();
                Ok(IntentOutcome::Applied)
            }
        }
    }

    /// Pre-discount subtotal.
    pub fn compute_total(&self) -> Decimal {
        self.selection.subtotal()
    }

    pub fn price(&self) -> &PricingResult {
        &self.pricing
    }

    /// Every problem that blocks submission, in display order. Pure.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.settings.require_size && self.bucket.is_none() {
            errors.push("Please select a property size".to_owned());
        }
        if self.selection.is_empty() {
            errors.push("Please select at least one service".to_owned());
        }

        let address = &self.form.address;
        let required = [
            (&address.street, "Please enter the street address"),
            (&address.city, "Please enter the city"),
            (&address.state, "Please enter the state"),
            (&address.zip_code, "Please enter the postal code"),
        ];
        for (value, message) in required {
            if value.trim().is_empty() {
                errors.push(message.to_owned());
            }
        }

        if self.form.preferred_date.is_none() {
            errors.push("Please select a preferred date".to_owned());
        }
        errors
    }

    /// Validates and, when clean, moves to `Submitting` and hands back the
    /// payload to send. Pair with [`OrderSession::complete_submission`].
    pub fn begin_submission(&mut self) -> BeginSubmission {
        let prepared = self.prepare_payload();
        let context = FlowContext {
            validation_errors: prepared.as_ref().err().cloned().unwrap_or_default(),
        };
        let outcome = match self.advance(FlowEvent::SubmitRequested, &context) {
            Ok(outcome) => outcome,
            Err(reason) => return BeginSubmission::Ignored(reason),
        };
        self.run_actions(&outcome, &context);

        match (outcome.to, prepared) {
            (FlowState::Submitting, Ok(payload)) => {
                info!(
                    event_name = "booking.submission_started",
                    session_id = %self.id,
                    correlation_id = %self.audit.correlation_id,
                    total = %payload.total,
                    services = payload.services.len(),
                    "submitting booking"
                );
                self.emit_submission(
                    "submission.started",
                    AuditOutcome::Success,
                    "total",
                    payload.total.to_string(),
                );
                self.in_flight = Some(payload.clone());
                BeginSubmission::Ready(payload)
            }
            _ => {
                debug!(
                    event_name = "booking.validation_failed",
                    session_id = %self.id,
                    errors = self.validation_errors.len(),
                    "submission blocked by validation"
                );
                BeginSubmission::Invalid(self.validation_errors.clone())
            }
        }
    }

    pub fn complete_submission(
        &mut self,
        result: Result<SubmissionAck, GatewayError>,
    ) -> SubmitOutcome {
        let event = if result.is_ok() {
            FlowEvent::SubmissionSucceeded
        } else {
            FlowEvent::SubmissionFailed
        };
        let outcome = match self.advance(event, &FlowContext::default()) {
            Ok(outcome) => outcome,
            Err(reason) => return SubmitOutcome::Ignored(reason),
        };
        let payload = self.in_flight.take();

        match result {
            Ok(ack) => {
                info!(
                    event_name = "booking.submission_succeeded",
                    session_id = %self.id,
                    correlation_id = %self.audit.correlation_id,
                    reference = %ack.reference,
                    "booking accepted"
                );
                self.emit_submission(
                    "submission.succeeded",
                    AuditOutcome::Success,
                    "reference",
                    ack.reference.clone(),
                );
                self.staged_receipt =
                    payload.as_ref().map(|payload| SubmissionReceipt::new(ack, payload));
                self.run_actions(&outcome, &FlowContext::default());
                match &self.receipt {
                    Some(receipt) => SubmitOutcome::Submitted(receipt.clone()),
                    None => SubmitOutcome::Ignored(IgnoredReason::NoSubmissionInFlight),
                }
            }
            Err(error) => {
                warn!(
                    event_name = "booking.submission_failed",
                    session_id = %self.id,
                    correlation_id = %self.audit.correlation_id,
                    error = %error,
                    "booking submission failed"
                );
                self.emit_submission(
                    "submission.failed",
                    AuditOutcome::Failed,
                    "error",
                    error.to_string(),
                );
                self.run_actions(&outcome, &FlowContext::default());
                SubmitOutcome::Failed { notice: SUBMISSION_FAILURE_NOTICE.to_owned(), error }
            }
        }
    }

    /// Validate, send once, and settle. Never retries.
    pub async fn submit<G>(&mut self, gateway: &G) -> SubmitOutcome
    where
        G: SubmissionGateway + ?Sized,
    {
        let payload = match self.begin_submission() {
            BeginSubmission::Ready(payload) => payload,
            BeginSubmission::Invalid(errors) => return SubmitOutcome::Invalid(errors),
            BeginSubmission::Ignored(reason) => return SubmitOutcome::Ignored(reason),
        };
        let result = gateway.submit(&payload).await;
        self.complete_submission(result)
    }

    /// Back to a blank `Idle` session from any state.
    pub fn reset(&mut self) {
        if let Ok(outcome) = self.advance(FlowEvent::ResetRequested, &FlowContext::default()) {
            self.run_actions(&outcome, &FlowContext::default());
        }
        self.notice = None;
        self.in_flight = None;
        self.staged_receipt = None;
        self.receipt = None;
        info!(event_name = "booking.reset", session_id = %self.id, "session reset");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            status: self.status(),
            property_size: self.bucket,
            property_size_label: self.bucket.map(|bucket| bucket.label().to_owned()),
            lines: self
                .selection
                .iter()
                .map(|entry| SnapshotLine {
                    service_id: entry.service_id.clone(),
                    name: entry.name.clone(),
                    unit_price: entry.unit_price,
                    quantity: entry.quantity(),
                    line_total: entry.line_total(),
                })
                .collect(),
            pricing: self.pricing.clone(),
            form: self.form.clone(),
            validation_errors: self.validation_errors.clone(),
            notice: self.notice.clone(),
            receipt: self.receipt.clone(),
        }
    }

    fn blocked_reason(&self) -> Option<IgnoredReason> {
        match self.state {
            FlowState::Submitting => Some(IgnoredReason::SubmissionInFlight),
            FlowState::Succeeded => Some(IgnoredReason::SessionCompleted),
            FlowState::Idle | FlowState::Editing => None,
        }
    }

    fn advance(
        &mut self,
        event: FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, IgnoredReason> {
        match self.engine.apply_with_audit(
            &self.state,
            &event,
            context,
            self.audit_sink.as_ref(),
            &self.audit,
        ) {
            Ok(outcome) => {
                self.state = outcome.to;
                Ok(outcome)
            }
            Err(error) => {
                let reason =
                    self.blocked_reason().unwrap_or(IgnoredReason::NoSubmissionInFlight);
                debug!(
                    event_name = "booking.intent_ignored",
                    session_id = %self.id,
                    reason = ?reason,
                    error = %error,
                    "intent ignored"
                );
                Err(reason)
            }
        }
    }

    fn run_actions(&mut self, outcome: &TransitionOutcome, context: &FlowContext) {
        for action in &outcome.actions {
            match action {
                FlowAction::ClearValidationErrors => self.validation_errors.clear(),
                FlowAction::RecomputeTotals => self.pricing = self.book.price(&self.selection),
                FlowAction::SurfaceValidationErrors => {
                    self.validation_errors = context.validation_errors.clone();
                }
                FlowAction::SendToGateway => {
                    self.validation_errors.clear();
                    self.notice = None;
                }
                FlowAction::RetainReceipt => self.receipt = self.staged_receipt.take(),
                FlowAction::ClearOrder => {
                    self.bucket = None;
                    self.selection.clear();
                    self.form = OrderFormData::default();
                    self.pricing = self.book.price(&self.selection);
                }
                FlowAction::SurfaceFailureNotice => {
                    self.notice = Some(SUBMISSION_FAILURE_NOTICE.to_owned());
                }
            }
        }
    }

    fn prepare_payload(&self) -> Result<SubmissionPayload, Vec<String>> {
        let errors = self.validate();
        match self.form.preferred_date {
            Some(date) if errors.is_empty() => Ok(self.payload_for(date)),
            _ => Err(errors),
        }
    }

    fn payload_for(&self, preferred_date: NaiveDate) -> SubmissionPayload {
        let services: Vec<PayloadLine> = self
            .selection
            .iter()
            .map(|entry| PayloadLine {
                name: entry.name.clone(),
                unit_price: entry.unit_price,
                quantity: entry.quantity(),
                line_total: entry.line_total(),
            })
            .collect();
        let services_summary = services
            .iter()
            .map(|line| {
                format!("{} (${} x {})", line.name, format_money(line.unit_price), line.quantity)
            })
            .collect::<Vec<_>>()
            .join(", ");

        SubmissionPayload {
            submitted_at: Utc::now(),
            property_size: self
                .bucket
                .map_or_else(|| "unspecified".to_owned(), |bucket| bucket.as_str().to_owned()),
            services,
            services_summary,
            subtotal: self.pricing.subtotal,
            discount_percent: self.pricing.discount_percent,
            total: self.pricing.total,
            address: self.form.address.clone(),
            preferred_date,
            occupancy_status: self.form.occupancy_status.as_str().to_owned(),
            notes: self.form.notes_or(&self.settings.notes_placeholder).to_owned(),
        }
    }

    fn emit_submission(&self, event_type: &str, outcome: AuditOutcome, key: &str, value: String) {
        self.audit_sink.emit(
            AuditEvent::new(&self.audit, event_type, AuditCategory::Submission, outcome)
                .with_metadata(key, value),
        );
    }
}
