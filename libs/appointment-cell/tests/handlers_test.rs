use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

fn test_app(supabase_uri: &str) -> Router {
    appointment_routes(TestConfig::default().with_supabase(supabase_uri).to_arc())
}

fn token() -> String {
    JwtTestUtils::create_test_token(&TestUser::audiologist("fono@audicare.test"), TEST_JWT_SECRET, Some(1))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token()))
        .header("content-type", "application/json")
        .body(match body {
            Some(b) => Body::from(b.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn tomorrow_at_ten() -> String {
    let date = (Utc::now() + Duration::days(1)).date_naive();
    date.and_hms_opt(10, 0, 0)
        .unwrap()
        .and_utc()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[tokio::test]
async fn test_create_appointment_without_conflicts() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();
    let starts_at = tomorrow_at_ten();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "scheduled", "duration_minutes": 45 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&appointment_id, &patient_id, &starts_at)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/",
        Some(json!({
            "patient_id": patient_id,
            "professional_id": professional_id,
            "appointment_type": "hearing_test",
            "starts_at": starts_at,
            "duration_minutes": 45
        })),
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], appointment_id);
    assert_eq!(body["status"], "scheduled");
}

#[tokio::test]
async fn test_create_appointment_reports_conflicting_ids() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let existing_id = Uuid::new_v4().to_string();
    let starts_at = tomorrow_at_ten();

    let mut existing = MockSupabaseResponses::appointment_response(&existing_id, &Uuid::new_v4().to_string(), &starts_at);
    existing["professional_id"] = json!(professional_id);
    existing["duration_minutes"] = json!(60);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/",
        Some(json!({
            "patient_id": Uuid::new_v4(),
            "professional_id": professional_id,
            "starts_at": starts_at,
            "duration_minutes": 30
        })),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains(&existing_id));
}

#[tokio::test]
async fn test_create_appointment_in_the_past_is_rejected() {
    let mock_server = MockServer::start().await;
    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();

    let (status, _) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/",
        Some(json!({ "patient_id": Uuid::new_v4(), "starts_at": yesterday })),
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_completed_appointment_cannot_be_confirmed() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();

    let mut completed = MockSupabaseResponses::appointment_response(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        "2024-03-01T10:00:00Z",
    );
    completed["status"] = json!("completed");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, _) = send(
        test_app(&mock_server.uri()),
        "POST",
        &format!("/{}/status", appointment_id),
        Some(json!({ "status": "confirmed" })),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

fn rescheduled_slot(appointment_id: &str, professional_id: Uuid, starts_at: &str) -> Value {
    let mut rescheduled = MockSupabaseResponses::appointment_response(appointment_id, &Uuid::new_v4().to_string(), starts_at);
    rescheduled["status"] = json!("rescheduled");
    rescheduled["professional_id"] = json!(professional_id);
    rescheduled
}

#[tokio::test]
async fn test_reconfirming_rescheduled_appointment_checks_conflicts() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4().to_string();
    let taken_by = Uuid::new_v4().to_string();
    let starts_at = tomorrow_at_ten();

    let mut other = MockSupabaseResponses::appointment_response(&taken_by, &Uuid::new_v4().to_string(), &starts_at);
    other["professional_id"] = json!(professional_id);
    other["status"] = json!("confirmed");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            rescheduled_slot(&appointment_id, professional_id, &starts_at)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([other])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        &format!("/{}/status", appointment_id),
        Some(json!({ "status": "confirmed" })),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains(&taken_by));
}

#[tokio::test]
async fn test_reconfirming_rescheduled_appointment_ignores_itself() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4().to_string();
    let starts_at = tomorrow_at_ten();
    let slot = rescheduled_slot(&appointment_id, professional_id, &starts_at);

    let mut own_row = slot.clone();
    own_row["status"] = json!("scheduled");
    let mut confirmed = slot.clone();
    confirmed["status"] = json!("confirmed");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([own_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "confirmed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        &format!("/{}/status", appointment_id),
        Some(json!({ "status": "confirmed" })),
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
}

#[tokio::test]
async fn test_cancel_records_reason() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let scheduled = MockSupabaseResponses::appointment_response(&appointment_id, &patient_id, "2030-03-01T10:00:00Z");

    let mut cancelled = scheduled.clone();
    cancelled["status"] = json!("cancelled");
    cancelled["status_reason"] = json!("patient travelling");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "cancelled", "status_reason": "patient travelling" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        &format!("/{}/status", appointment_id),
        Some(json!({ "status": "cancelled", "reason": "patient travelling" })),
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn test_calendar_range_is_limited() {
    let mock_server = MockServer::start().await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "GET",
        "/calendar?from=2030-01-01T00:00:00Z&to=2030-06-01T00:00:00Z",
        None,
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("62 days"));
}

#[tokio::test]
async fn test_calendar_lists_range_in_order() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("order", "starts_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&Uuid::new_v4().to_string(), &patient_id, "2030-01-02T09:00:00Z"),
            MockSupabaseResponses::appointment_response(&Uuid::new_v4().to_string(), &patient_id, "2030-01-03T09:00:00Z"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "GET",
        "/calendar?from=2030-01-01T00:00:00Z&to=2030-01-31T00:00:00Z",
        None,
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["overdue"], json!([]));
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let mock_server = MockServer::start().await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = test_app(&mock_server.uri()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
