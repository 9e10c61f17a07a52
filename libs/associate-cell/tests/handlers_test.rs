use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use associate_cell::router::associate_routes;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

fn test_app(test_config: &TestConfig, mock_server: &MockServer) -> Router {
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();
    associate_routes(Arc::new(config))
}

fn create_body() -> String {
    json!({
        "full_name": "Dana Reyes",
        "email": "dana@example.com",
        "designation": "psychologist"
    })
    .to_string()
}

#[tokio::test]
async fn create_requires_admin() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let app = test_app(&test_config, &mock_server);

    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &test_config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(create_body()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_creates_an_associate() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let associate_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/associates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::associate_profile(&associate_id.to_string(), "psychologist")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = test_app(&test_config, &mock_server);
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &test_config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(create_body()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_unknown_associate_is_not_found() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let associate_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .and(query_param("id", format!("eq.{}", associate_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = test_app(&test_config, &mock_server);
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &test_config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", associate_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lists_associates_filtered_by_designation() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .and(query_param("designation", "eq.cosmetologist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::associate_profile(&Uuid::new_v4().to_string(), "cosmetologist")
        ])))
        .mount(&mock_server)
        .await;

    let app = test_app(&test_config, &mock_server);
    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &test_config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("GET")
        .uri("/?designation=cosmetologist")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
