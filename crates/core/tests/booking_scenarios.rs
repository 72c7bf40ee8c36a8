use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shutterbook_core::session::BeginSubmission;
use shutterbook_core::{
    AddressField, FormField, GatewayError, IgnoredReason, InMemoryAuditSink,
    InMemorySubmissionGateway, IntentOutcome, OccupancyStatus, OrderSession, PriceBook,
    PropertySizeBucket, ServiceId, SessionSettings, SubmissionStatus, SubmitOutcome,
};

const TWO_TIER_CATALOG: &str = r#"
[[services]]
id = "hdr_photos"
name = "HDR Photos"
default_price = "150"

[[services]]
id = "drone"
name = "Drone"
default_price = "100"

[[discount_tiers]]
threshold = "200"
percentage = "2"

[[discount_tiers]]
threshold = "500"
percentage = "5"

[pricing."<1000"]
hdr_photos = "125"
drone = "100"

[pricing."1000-2000"]
hdr_photos = "150"
drone = "100"

[pricing."2000-3000"]
hdr_photos = "175"
drone = "125"

[pricing."3000-4000"]
hdr_photos = "200"
drone = "125"

[pricing."4000-5000"]
hdr_photos = "225"
drone = "150"
"#;

const BUNDLE_ONLY_CATALOG: &str = r#"
[[services]]
id = "hdr_photos"
name = "HDR Photos"
default_price = "100"

[[services]]
id = "drone"
name = "Drone"
default_price = "50"

[[discount_tiers]]
threshold = "1000"
percentage = "5"

[[bundles]]
name = "Aerial Showcase"
services = ["hdr_photos", "drone"]
percentage = "10"
description = "Ground and aerial coverage"

[pricing."<1000"]
hdr_photos = "100"
drone = "50"

[pricing."1000-2000"]
hdr_photos = "100"
drone = "50"

[pricing."2000-3000"]
hdr_photos = "100"
drone = "50"

[pricing."3000-4000"]
hdr_photos = "100"
drone = "50"

[pricing."4000-5000"]
hdr_photos = "100"
drone = "50"
"#;

fn session_with(catalog: &str) -> OrderSession {
    let book = PriceBook::from_toml_str(catalog).expect("test catalog validates");
    OrderSession::new(Arc::new(book), SessionSettings::default())
}

fn builtin_session() -> OrderSession {
    OrderSession::new(Arc::new(PriceBook::builtin().expect("catalog")), SessionSettings::default())
}

fn id(value: &str) -> ServiceId {
    ServiceId::new(value)
}

fn fill_form(session: &mut OrderSession) {
    session.change_address_field(AddressField::Street, "48 Ocean Ave");
    session.change_address_field(AddressField::City, "Kennebunkport");
    session.change_address_field(AddressField::State, "ME");
    session.change_address_field(AddressField::ZipCode, "04046");
    session.change_form_field(FormField::PreferredDate(NaiveDate::from_ymd_opt(2026, 11, 2)));
    session.change_form_field(FormField::OccupancyStatus(OccupancyStatus::TenantOccupied));
}

#[test]
fn lowest_tier_applies_to_mid_size_hdr_and_drone() {
    let mut session = session_with(TWO_TIER_CATALOG);
    session.select_size(PropertySizeBucket::From1000To2000);
    session.toggle_service(&id("hdr_photos"), 1).expect("known service");
    session.toggle_service(&id("drone"), 1).expect("known service");

    let pricing = session.price();
    assert_eq!(session.compute_total(), Decimal::new(250, 0));
    assert_eq!(pricing.volume_tier.as_ref().map(|tier| tier.percentage), Some(Decimal::new(2, 0)));
    assert_eq!(pricing.total, Decimal::new(24500, 2));
    assert_eq!(pricing.next_tier.as_ref().map(|next| next.gap), Some(Decimal::new(250, 0)));
}

#[test]
fn bundle_alone_takes_ten_percent_below_every_tier() {
    let mut session = session_with(BUNDLE_ONLY_CATALOG);
    session.select_size(PropertySizeBucket::Under1000);
    session.toggle_service(&id("hdr_photos"), 1).expect("known service");
    session.toggle_service(&id("drone"), 1).expect("known service");

    let pricing = session.price();
    assert_eq!(pricing.subtotal, Decimal::new(150, 0));
    assert_eq!(pricing.volume_tier, None);
    assert_eq!(pricing.total, pricing.subtotal * Decimal::new(90, 2));
    assert_eq!(pricing.total, Decimal::new(135, 0));
}

#[test]
fn empty_session_cannot_submit() {
    let mut session = builtin_session();
    let BeginSubmission::Invalid(errors) = session.begin_submission() else {
        panic!("empty session must fail validation");
    };

    assert!(errors.len() >= 4);
    assert_eq!(session.status(), SubmissionStatus::Idle);
    assert!(session.selection().is_empty());
}

#[test]
fn second_submit_while_in_flight_is_a_no_op() {
    let mut session = builtin_session();
    session.select_size(PropertySizeBucket::From2000To3000);
    session.toggle_service(&id("floor_plan"), 1).expect("known service");
    fill_form(&mut session);

    assert!(matches!(session.begin_submission(), BeginSubmission::Ready(_)));
    let selection = session.selection().clone();

    assert!(matches!(
        session.begin_submission(),
        BeginSubmission::Ignored(IgnoredReason::SubmissionInFlight)
    ));
    assert_eq!(
        session.toggle_service(&id("drone"), 1).expect("known service"),
        IntentOutcome::Ignored(IgnoredReason::SubmissionInFlight)
    );
    assert_eq!(session.status(), SubmissionStatus::Submitting);
    assert_eq!(session.selection(), &selection);
}

#[tokio::test]
async fn gateway_failure_keeps_order_and_surfaces_notice() {
    let gateway = InMemorySubmissionGateway::failing(GatewayError::Rejected {
        status: 500,
        message: "script error".to_owned(),
    });
    let mut session = builtin_session();
    session.select_size(PropertySizeBucket::From1000To2000);
    session.toggle_service(&id("hdr_photos"), 1).expect("known service");
    session.toggle_service(&id("virtual_staging"), 3).expect("known service");
    fill_form(&mut session);
    let selection = session.selection().clone();
    let form = session.form().clone();

    let outcome = session.submit(&gateway).await;

    let SubmitOutcome::Failed { notice, .. } = outcome else {
        panic!("rejected submission must fail");
    };
    assert_eq!(notice, "There was an error submitting your booking. Please try again.");
    assert_eq!(session.status(), SubmissionStatus::Failed);
    assert_eq!(session.selection(), &selection);
    assert_eq!(session.form(), &form);
    assert!(gateway.submissions().is_empty());

    gateway.fail_with(None);
    let retry = session.submit(&gateway).await;
    assert!(matches!(retry, SubmitOutcome::Submitted(_)));
    assert_eq!(session.notice(), None);
    assert_eq!(gateway.submissions().len(), 1);
}

#[tokio::test]
async fn successful_booking_sends_full_payload_and_clears_order() {
    let gateway = InMemorySubmissionGateway::default();
    let sink = InMemoryAuditSink::default();
    let mut session = builtin_session()
        .with_audit_sink(Arc::new(sink.clone()))
        .with_correlation_id("req-booking-1");
    session.select_size(PropertySizeBucket::From1000To2000);
    session.toggle_service(&id("hdr_photos"), 1).expect("known service");
    session.toggle_service(&id("drone"), 1).expect("known service");
    fill_form(&mut session);
    session.change_form_field(FormField::Notes("Gate code 2201".to_owned()));

    let SubmitOutcome::Submitted(receipt) = session.submit(&gateway).await else {
        panic!("valid booking should be accepted");
    };

    let sent = gateway.submissions();
    assert_eq!(sent.len(), 1);
    let payload = &sent[0];
    assert_eq!(payload.property_size, "1000-2000");
    assert_eq!(payload.services_summary, "HDR Photos ($150.00 x 1), Drone ($100.00 x 1)");
    assert_eq!(payload.subtotal, Decimal::new(250, 0));
    assert_eq!(payload.discount_percent, Decimal::new(10, 0));
    assert_eq!(payload.total, Decimal::new(225, 0));
    assert_eq!(payload.occupancy_status, "Tenant Occupied");
    assert_eq!(payload.notes, "Gate code 2201");
    assert_eq!(payload.address.single_line(), "48 Ocean Ave, Kennebunkport, ME, 04046");

    assert_eq!(receipt.total, Decimal::new(225, 0));
    assert_eq!(session.status(), SubmissionStatus::Succeeded);
    assert!(session.selection().is_empty());
    assert_eq!(session.form().address.street, "");

    let events = sink.events();
    assert!(events.iter().all(|event| event.correlation_id == "req-booking-1"));
    assert!(events.iter().any(|event| event.event_type == "submission.succeeded"));
}

#[test]
fn snapshot_serializes_for_renderers() {
    let mut session = builtin_session();
    session.select_size(PropertySizeBucket::From3000To4000);
    session.toggle_service(&id("video_walkthrough"), 3).expect("known service");
    session.toggle_service(&id("twilight_photos"), 1).expect("known service");

    let value = serde_json::to_value(session.snapshot()).expect("snapshot serializes");
    assert_eq!(value["status"], "idle");
    assert_eq!(value["propertySize"], "3000-4000");
    assert_eq!(value["lines"][0]["quantity"], 3);
    assert_eq!(value["pricing"]["subtotal"], "1100.00");
    assert_eq!(value["pricing"]["volumeTier"]["percentage"], "5");
    assert!(value["pricing"]["nextTier"].is_object());
}
