use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::models::{ApplyPatternRequest, AvailabilityError, AvailabilityPattern};
use availability_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_utils::test_utils::{MockStoreResponses, TestConfig};

fn config_for(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn set_availability_saves_with_version_check() {
    let mock_server = MockServer::start().await;
    let associate_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .and(query_param("id", format!("eq.{}", associate_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", json!([]), 0)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/associates"))
        .and(query_param("id", format!("eq.{}", associate_id)))
        .and(query_param("version", "eq.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", json!([]), 1)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config_for(&mock_server));
    let schedule = service
        .set_availability(
            associate_id,
            date(2026, 9, 14),
            &["09:00".to_string(), "09:30".to_string()],
            "test-token",
        )
        .await
        .unwrap();

    assert_eq!(schedule.version, 1);
    let day = schedule.day(date(2026, 9, 14)).unwrap();
    assert_eq!(day.slots.len(), 2);
    assert!(day.slots.iter().all(|s| s.is_free()));
}

#[tokio::test]
async fn lost_save_race_reloads_and_retries() {
    let mock_server = MockServer::start().await;
    let associate_id = Uuid::new_v4();

    // First load sees version 0, the save under version 0 loses the race,
    // the reload sees version 1 and that save lands.
    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .and(query_param("id", format!("eq.{}", associate_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", json!([]), 0)
        ])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .and(query_param("id", format!("eq.{}", associate_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", json!([]), 1)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/associates"))
        .and(query_param("version", "eq.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/associates"))
        .and(query_param("version", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", json!([]), 2)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config_for(&mock_server));
    let schedule = service
        .set_availability(associate_id, date(2026, 9, 14), &["10:00".to_string()], "test-token")
        .await
        .unwrap();

    assert_eq!(schedule.version, 2);
}

#[tokio::test]
async fn unknown_associate_is_not_found() {
    let mock_server = MockServer::start().await;
    let associate_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config_for(&mock_server));
    let result = service
        .set_availability(associate_id, date(2026, 9, 14), &["09:00".to_string()], "test-token")
        .await;

    assert_matches!(result, Err(AvailabilityError::AssociateNotFound));
}

#[tokio::test]
async fn malformed_times_are_rejected_before_any_write() {
    let mock_server = MockServer::start().await;
    let associate_id = Uuid::new_v4();

    // No GET/PATCH may happen for a request that fails validation
    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config_for(&mock_server));

    for bad in ["9:00", "12:15", "24:00", "nonsense"] {
        let result = service
            .set_availability(associate_id, date(2026, 9, 14), &[bad.to_string()], "test-token")
            .await;
        assert_matches!(result, Err(AvailabilityError::InvalidTime(_)), "{}", bad);
    }
}

#[tokio::test]
async fn pattern_touches_every_matching_date_in_one_write() {
    let mock_server = MockServer::start().await;
    let associate_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .and(query_param("id", format!("eq.{}", associate_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "cosmetologist", json!([]), 4)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/associates"))
        .and(query_param("version", "eq.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "cosmetologist", json!([]), 5)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config_for(&mock_server));
    let request = ApplyPatternRequest {
        pattern: AvailabilityPattern::DayOfWeek,
        start_date: date(2026, 9, 1),
        end_date: Some(date(2026, 9, 30)),
        day_of_week: Some(1),
        times: vec!["09:00".to_string(), "09:30".to_string()],
        clear: false,
    };

    let schedule = service
        .apply_pattern(associate_id, &request, "test-token")
        .await
        .unwrap();

    // Four Mondays in September 2026, two slots each
    assert_eq!(schedule.days.len(), 4);
    assert!(schedule.days.iter().all(|d| d.slots.len() == 2));
    assert_eq!(schedule.version, 5);
}

#[tokio::test]
async fn clear_pattern_preserves_booked_slots() {
    let mock_server = MockServer::start().await;
    let associate_id = Uuid::new_v4();
    let booking_id = Uuid::new_v4();

    let days = json!([MockStoreResponses::day(
        "2026-09-14",
        vec![
            MockStoreResponses::open_slot("09:00"),
            json!({
                "time": "09:30",
                "is_available": false,
                "is_booked": true,
                "duration_minutes": 50,
                "possible_durations": [30, 50, 80],
                "booking_id": booking_id
            }),
        ]
    )]);

    Mock::given(method("GET"))
        .and(path("/rest/v1/associates"))
        .and(query_param("id", format!("eq.{}", associate_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", days, 0)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/associates"))
        .and(query_param("version", "eq.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::schedule_row(&associate_id.to_string(), "psychologist", json!([]), 1)
        ])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config_for(&mock_server));
    let schedule = service
        .clear_availability(associate_id, &[date(2026, 9, 14)], "test-token")
        .await
        .unwrap();

    // The open slot is gone, the booked one survives the clear
    let day = schedule.day(date(2026, 9, 14)).unwrap();
    assert_eq!(day.slots.len(), 1);
    assert!(day.slots[0].is_booked);
    assert_eq!(day.slots[0].booking_id, Some(booking_id));
}
