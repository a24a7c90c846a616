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

use document_cell::document_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

fn test_app(uri: &str) -> Router {
    document_routes(TestConfig::default().with_supabase(uri).to_arc())
}

fn token() -> String {
    JwtTestUtils::create_test_token(&TestUser::receptionist("recepcao@audicare.test"), TEST_JWT_SECRET, Some(1))
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

fn template_json(id: Uuid, body: &str) -> Value {
    json!({
        "id": id,
        "name": "Recibo",
        "kind": "receipt",
        "body": body,
        "created_at": "2024-01-10T09:00:00Z"
    })
}

#[tokio::test]
async fn test_generate_renders_and_stores_document() {
    let mock_server = MockServer::start().await;
    let template_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let document_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/document_templates"))
        .and(query_param("id", format!("eq.{}", template_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            template_json(template_id, "Recebemos de {{ patient.full_name }} o valor de R$ {{amount}} referente a {{ item }}.")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id.to_string(), "5511987654321")
        ])))
        .mount(&mock_server)
        .await;

    let expected_content = "Recebemos de Maria da Silva o valor de R$ 4.500,00 referente a .";

    Mock::given(method("POST"))
        .and(path("/rest/v1/documents"))
        .and(body_partial_json(json!({
            "patient_id": patient_id,
            "template_id": template_id,
            "title": "Recibo - Maria da Silva",
            "content": expected_content
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": document_id,
            "patient_id": patient_id,
            "template_id": template_id,
            "title": "Recibo - Maria da Silva",
            "content": expected_content,
            "created_at": "2024-03-05T14:00:00Z"
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/generate",
        Some(json!({
            "template_id": template_id,
            "patient_id": patient_id,
            "fields": { "amount": "4.500,00" }
        })),
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["document"]["content"], expected_content);
    assert_eq!(body["missing_fields"], json!(["item"]));
}

#[tokio::test]
async fn test_generate_with_unknown_template_is_404() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/document_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&Uuid::new_v4().to_string(), "5511987654321")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/documents"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, _) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/generate",
        Some(json!({ "template_id": Uuid::new_v4(), "patient_id": Uuid::new_v4() })),
    ).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_template_requires_body() {
    let mock_server = MockServer::start().await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/templates",
        Some(json!({ "name": "Garantia", "kind": "warranty", "body": "   " })),
    ).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("body"));
}

#[tokio::test]
async fn test_create_template() {
    let mock_server = MockServer::start().await;
    let template_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/document_templates"))
        .and(body_partial_json(json!({ "name": "Recibo", "kind": "receipt" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            template_json(template_id, "Recebemos de {{patient.full_name}}")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "POST",
        "/templates",
        Some(json!({ "name": " Recibo ", "kind": "receipt", "body": "Recebemos de {{patient.full_name}}" })),
    ).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], template_id.to_string());
}

#[tokio::test]
async fn test_patient_documents_listing() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/documents"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "template_id": null,
            "title": "Laudo",
            "content": "…",
            "created_at": "2024-03-05T14:00:00Z"
        }])))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server.uri()),
        "GET",
        &format!("/patients/{}", patient_id),
        None,
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["documents"][0]["title"], "Laudo");
}

#[tokio::test]
async fn test_templates_require_auth() {
    let mock_server = MockServer::start().await;

    let request = Request::builder()
        .method("GET")
        .uri("/templates")
        .body(Body::empty())
        .unwrap();

    let response = test_app(&mock_server.uri()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
