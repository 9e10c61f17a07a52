use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::router::booking_routes;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

fn test_app(test_config: &TestConfig, mock_server: &MockServer) -> Router {
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();
    booking_routes(Arc::new(config))
}

fn booking_date_string() -> String {
    (Utc::now().date_naive() + Duration::days(7)).to_string()
}

fn book_request_body(client_id: &str, associate_id: Uuid) -> String {
    json!({
        "associate_id": associate_id,
        "client_id": client_id,
        "date": booking_date_string(),
        "time": "10:00",
        "duration_minutes": 50,
        "service_type": "counselling"
    })
    .to_string()
}

fn post_booking(body: String, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn mount_booking_flow_mocks(mock_server: &MockServer, associate_id: Uuid, client_id: &str) {
    let slots = vec![
        MockStoreResponses::open_slot("09:30"),
        MockStoreResponses::open_slot("10:00"),
        MockStoreResponses::open_slot("10:30"),
    ];
    let days = json!([MockStoreResponses::day(&booking_date_string(), slots)]);

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", days, 0)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/associates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", json!([]), 1)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::booking_row(
                &Uuid::new_v4().to_string(),
                &associate_id.to_string(),
                client_id,
                &booking_date_string(),
                "10:00",
                50,
            )
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn rejects_missing_token() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let app = test_app(&test_config, &mock_server);

    let response = app
        .oneshot(post_booking(
            book_request_body(&Uuid::new_v4().to_string(), Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_cannot_book_for_someone_else() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let app = test_app(&test_config, &mock_server);

    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_test_token(&client, &test_config.jwt_secret, Some(1));

    let other_client = Uuid::new_v4().to_string();
    let response = app
        .oneshot(post_booking(
            book_request_body(&other_client, Uuid::new_v4()),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_books_their_own_session() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();

    let client = TestUser::client("client@example.com");
    let associate_id = Uuid::new_v4();
    mount_booking_flow_mocks(&mock_server, associate_id, &client.id).await;

    let app = test_app(&test_config, &mock_server);
    let token = JwtTestUtils::create_test_token(&client, &test_config.jwt_secret, Some(1));

    let response = app
        .oneshot(post_booking(
            book_request_body(&client.id, associate_id),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let app = test_app(&test_config, &mock_server);

    let client = TestUser::client("client@example.com");
    let token = JwtTestUtils::create_expired_token(&client, &test_config.jwt_secret);

    let response = app
        .oneshot(post_booking(
            book_request_body(&client.id, Uuid::new_v4()),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stranger_cannot_cancel_a_booking() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let booking_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::booking_row(
                &booking_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &booking_date_string(),
                "10:00",
                50,
            )
        ])))
        .mount(&mock_server)
        .await;

    let app = test_app(&test_config, &mock_server);
    let stranger = TestUser::client("stranger@example.com");
    let token = JwtTestUtils::create_test_token(&stranger, &test_config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/cancel", booking_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "reason": "change of plans" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn conflict_is_surfaced_as_http_409() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();

    let client = TestUser::client("client@example.com");
    let associate_id = Uuid::new_v4();

    // Slot already booked by someone else
    let slots = vec![json!({
        "time": "10:00",
        "is_available": false,
        "is_booked": true,
        "duration_minutes": 50,
        "possible_durations": [30, 50, 80],
        "booking_id": Uuid::new_v4()
    })];
    let days = json!([MockStoreResponses::day(&booking_date_string(), slots)]);
    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", days, 0)
        ])))
        .mount(&mock_server)
        .await;

    let app = test_app(&test_config, &mock_server);
    let token = JwtTestUtils::create_test_token(&client, &test_config.jwt_secret, Some(1));

    let response = app
        .oneshot(post_booking(
            book_request_body(&client.id, associate_id),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}
