use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use shutterbook_core::config::PayloadEncoding;
use shutterbook_core::domain::order::Address;
use shutterbook_core::gateway::{GatewayError, PayloadLine, SubmissionGateway, SubmissionPayload};
use shutterbook_gateway::{form_fields, HttpSubmissionGateway};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn payload() -> SubmissionPayload {
    SubmissionPayload {
        submitted_at: Utc.with_ymd_and_hms(2026, 10, 18, 14, 30, 0).single().expect("timestamp"),
        property_size: "1000-2000".to_owned(),
        services: vec![
            PayloadLine {
                name: "HDR Photos".to_owned(),
                unit_price: Decimal::new(150, 0),
                quantity: 1,
                line_total: Decimal::new(150, 0),
            },
            PayloadLine {
                name: "Drone".to_owned(),
                unit_price: Decimal::new(100, 0),
                quantity: 1,
                line_total: Decimal::new(100, 0),
            },
        ],
        services_summary: "HDR Photos ($150.00 x 1), Drone ($100.00 x 1)".to_owned(),
        subtotal: Decimal::new(250, 0),
        discount_percent: Decimal::new(1000, 2),
        total: Decimal::new(225, 0),
        address: Address {
            street: "48 Ocean Ave".to_owned(),
            street2: Some("Unit 2".to_owned()),
            city: "Kennebunkport".to_owned(),
            state: "ME".to_owned(),
            zip_code: "04046".to_owned(),
        },
        preferred_date: NaiveDate::from_ymd_opt(2026, 11, 2).expect("date"),
        occupancy_status: "Vacant".to_owned(),
        notes: "No additional notes".to_owned(),
    }
}

/// Serves one canned HTTP response and hands back the raw request text.
async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buffer = [0_u8; 4096];
        loop {
            let read = socket.read(&mut buffer).await.expect("read");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..read]);
            if request_complete(&request) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{address}/exec"), handle)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    body.len() >= length
}

#[test]
fn form_fields_match_spreadsheet_columns() {
    let fields = form_fields(&payload());
    let get = |key: &str| {
        fields.iter().find(|(name, _)| *name == key).map(|(_, value)| value.as_str()).expect(key)
    };

    assert_eq!(get("propertySize"), "1000-2000");
    assert_eq!(get("services"), "HDR Photos ($150.00 x 1), Drone ($100.00 x 1)");
    assert_eq!(get("subtotal"), "250.00");
    assert_eq!(get("discountPercent"), "10");
    assert_eq!(get("totalAmount"), "225.00");
    assert_eq!(get("address"), "48 Ocean Ave, Unit 2, Kennebunkport, ME, 04046");
    assert_eq!(get("preferredDate"), "November 2, 2026");
    assert_eq!(get("propertyStatus"), "Vacant");
    assert!(get("timestamp").starts_with("2026-10-18T14:30:00"));
}

#[tokio::test]
async fn form_post_is_accepted_with_row_reference() {
    let (endpoint, server) = one_shot_server("200 OK", r#"{"result":"success","row":17}"#).await;
    let gateway = HttpSubmissionGateway::new(
        endpoint,
        Some(SecretString::from("sheet-key".to_owned())),
        PayloadEncoding::Form,
        5,
    )
    .expect("gateway");

    let ack = gateway.submit(&payload()).await.expect("accepted");
    let request = server.await.expect("server task");

    assert_eq!(ack.reference, "17");
    assert!(request.starts_with("POST /exec"));
    assert!(request.to_ascii_lowercase().contains("content-type: application/x-www-form-urlencoded"));
    assert!(request.contains("authorization: Bearer sheet-key") || request.contains("Authorization: Bearer sheet-key"));
    assert!(request.contains("totalAmount=225.00"));
}

#[tokio::test]
async fn json_post_carries_camel_case_payload() {
    let (endpoint, server) = one_shot_server("200 OK", r#"{"reference":"BK-301"}"#).await;
    let gateway =
        HttpSubmissionGateway::new(endpoint, None, PayloadEncoding::Json, 5).expect("gateway");

    let ack = gateway.submit(&payload()).await.expect("accepted");
    let request = server.await.expect("server task");

    assert_eq!(ack.reference, "BK-301");
    assert!(request.contains("\"propertySize\":\"1000-2000\""));
    assert!(request.contains("\"preferredDate\":\"2026-11-02\""));
    assert!(!request.to_ascii_lowercase().contains("authorization:"));
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let (endpoint, server) = one_shot_server("500 Internal Server Error", r#"{"error":"quota"}"#).await;
    let gateway =
        HttpSubmissionGateway::new(endpoint, None, PayloadEncoding::Form, 5).expect("gateway");

    let error = gateway.submit(&payload()).await.expect_err("server error");
    server.await.expect("server task");

    assert_eq!(
        error,
        GatewayError::Rejected { status: 500, message: r#"{"error":"quota"}"#.to_owned() }
    );
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    drop(listener);

    let gateway =
        HttpSubmissionGateway::new(format!("http://{address}/exec"), None, PayloadEncoding::Form, 2)
            .expect("gateway");
    let error = gateway.submit(&payload()).await.expect_err("nothing listening");

    assert!(matches!(error, GatewayError::Transport(_) | GatewayError::Timeout { .. }));
}
