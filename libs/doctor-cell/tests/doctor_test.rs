use axum::{body::Body, http::{Request, StatusCode}};
use chrono::NaiveDate;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::{doctor_routes, DoctorService, Specialization};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

#[tokio::test]
async fn list_verified_filters_and_orders_by_rating() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("is_verified", "eq.true"))
        .and(query_param("specialization", "eq.crop_diseases"))
        .and(query_param("order", "rating.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &Uuid::new_v4().to_string())
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(&config);
    let doctors = service
        .list_verified(Some(Specialization::CropDiseases), None, None)
        .await
        .unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].id.to_string(), doctor_id);
    assert_eq!(doctors[0].specialization, Specialization::CropDiseases);
}

#[tokio::test]
async fn increment_calls_store_side_counter() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/increment_doctor_consultations"))
        .and(body_json(json!({ "p_doctor_id": doctor_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(&config);
    let count = service.increment_total_consultations(&doctor_id, "token").await.unwrap();

    assert_eq!(count, 42);
}

#[tokio::test]
async fn dashboard_stats_aggregate_appointment_rows() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4().to_string();
    let doctor: doctor_cell::Doctor = serde_json::from_value(
        MockSupabaseResponses::doctor_response(&doctor_id, &Uuid::new_v4().to_string()),
    ).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "status": "completed", "appointment_date": "2025-01-09", "fee": 300.0 },
            { "status": "pending", "appointment_date": "2025-01-10", "fee": 0.0 },
            { "status": "confirmed", "appointment_date": "2025-01-10", "fee": null }
        ])))
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(&config);
    let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
    let stats = service.get_dashboard_stats(&doctor, today, "token").await.unwrap();

    assert_eq!(stats.total_appointments, 3);
    assert_eq!(stats.today_appointments, 2);
    assert_eq!(stats.completed_appointments, 1);
    assert_eq!(stats.total_earnings, 300.0);
    assert_eq!(stats.total_consultations, 41);
}

#[tokio::test]
async fn unknown_specialization_is_bad_request() {
    let app = doctor_routes(TestConfig::default().to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?specialization=cardiology")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_requires_admin() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let app = doctor_routes(config.to_arc());
    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/{}/verify", Uuid::new_v4()))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_edits_a_doctor_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4().to_string();

    let mut updated = MockSupabaseResponses::doctor_response(&doctor_id, &Uuid::new_v4().to_string());
    updated["workplace"] = json!("BARI, Gazipur");
    updated["available_days"] = json!(["saturday", "sunday"]);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .and(body_json(json!({
            "workplace": "BARI, Gazipur",
            "available_days": ["saturday", "sunday"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = doctor_routes(config.to_arc())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/{}", doctor_id))
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({
                    "workplace": "BARI, Gazipur",
                    "available_days": ["Sat", "Sunday"]
                }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["doctor"]["workplace"], "BARI, Gazipur");
}

#[tokio::test]
async fn admin_edit_of_unknown_doctor_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = doctor_routes(config.to_arc())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/{}", Uuid::new_v4()))
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "consultation_fee": 200.0 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn doctors_cannot_edit_or_delete_doctors() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = doctor_routes(config.to_arc());

    for method_name in ["PUT", "DELETE"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method_name)
                    .uri(format!("/{}", Uuid::new_v4()))
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "workplace": "Elsewhere" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", method_name);
    }
}

#[tokio::test]
async fn public_profile_stays_readable_without_token() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri());
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, &Uuid::new_v4().to_string())
        ])))
        .mount(&mock_server)
        .await;

    let response = doctor_routes(config.to_arc())
        .oneshot(
            Request::builder()
                .uri(format!("/{}", doctor_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_removes_the_doctor_user_row() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id.to_string(), &user_id.to_string())
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": user_id }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(&config);
    let deleted = service.delete_doctor(&doctor_id, "token").await.unwrap();

    assert_eq!(deleted.map(|d| d.id), Some(doctor_id));
}

#[tokio::test]
async fn delete_of_unknown_doctor_touches_nothing() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let deleted = DoctorService::new(&config).delete_doctor(&Uuid::new_v4(), "token").await.unwrap();

    assert!(deleted.is_none());
}
