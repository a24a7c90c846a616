use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::patient_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

fn test_app(supabase_uri: &str) -> Router {
    patient_routes(TestConfig::default().with_supabase(supabase_uri).to_arc())
}

fn token() -> String {
    JwtTestUtils::create_test_token(&TestUser::receptionist("front@audicare.test"), TEST_JWT_SECRET, Some(1))
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

#[tokio::test]
async fn test_create_patient_normalizes_phone() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("phone", "like.*87654321"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "phone": "5521987654321" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "full_name": "Maria da Silva", "phone": "5511987654321" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "5511987654321")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/",
        Some(json!({ "full_name": "  Maria da Silva ", "phone": "(11) 98765-4321" })),
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], patient_id);
    assert_eq!(body["phone"], "5511987654321");
}

#[tokio::test]
async fn test_create_patient_rejects_duplicate_phone() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("phone", "like.*87654321"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "phone": "551187654321" }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/",
        Some(json!({ "full_name": "João", "phone": "+55 11 98765-4321" })),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("5511987654321"));
}

#[tokio::test]
async fn test_create_patient_requires_name() {
    let mock_server = MockServer::start().await;

    let (status, _) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/",
        Some(json!({ "full_name": "   " })),
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_missing_patient_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (status, _) = send(
        test_app(&mock_server.uri()),
        "GET",
        &format!("/{}", Uuid::new_v4()),
        None,
    ).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_by_unused_tag_skips_patient_query() {
    let mock_server = MockServer::start().await;
    let tag_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_tags"))
        .and(query_param("tag_id", format!("eq.{}", tag_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "GET",
        &format!("/search?tag_id={}", tag_id),
        None,
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_patient_tags_are_flattened_and_sorted() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_tags"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "tags": { "id": Uuid::new_v4(), "name": "retorno", "color": null } },
            { "tags": { "id": Uuid::new_v4(), "name": "Aparelho novo", "color": "#00aa00" } }
        ])))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "GET",
        &format!("/{}/tags", patient_id),
        None,
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"][0]["name"], "Aparelho novo");
    assert_eq!(body["tags"][1]["name"], "retorno");
}

#[tokio::test]
async fn test_tag_with_wildcard_characters_is_not_a_duplicate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Retorno 30d", "color": null }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/tags"))
        .and(body_partial_json(json!({ "name": "Retorno%" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Retorno%", "color": null }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/tags",
        Some(json!({ "name": "Retorno%" })),
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Retorno%");
}

#[tokio::test]
async fn test_tag_name_differing_only_in_case_is_a_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Retorno", "color": null }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/tags"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, _) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/tags",
        Some(json!({ "name": " RETORNO " })),
    ).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_attach_unknown_tag_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (status, _) = send(
        test_app(&mock_server.uri()),
        "POST",
        &format!("/{}/tags/{}", Uuid::new_v4(), Uuid::new_v4()),
        None,
    ).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_routes_require_token() {
    let app = patient_routes(TestConfig::default().to_arc());

    let request = Request::builder()
        .method("GET")
        .uri("/search")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
