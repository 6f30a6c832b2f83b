use assert_matches::assert_matches;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{
    AppointmentBookingService, AppointmentError, AppointmentListQuery, AppointmentStatus,
    ConsultationNotesRequest, FarmType, Party, RequestAppointmentRequest,
    RescheduleAppointmentRequest, UpdateStatusRequest,
};
use doctor_cell::Doctor;
use farmer_cell::Farmer;
use shared_config::AppConfig;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

struct Fixture {
    server: MockServer,
    config: AppConfig,
    farmer: Farmer,
    doctor: Doctor,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_store(&server.uri()).to_app_config();

        let farmer: Farmer = serde_json::from_value(MockSupabaseResponses::farmer_response(
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
        )).unwrap();
        let doctor: Doctor = serde_json::from_value(MockSupabaseResponses::doctor_response(
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
        )).unwrap();

        Self { server, config, farmer, doctor }
    }

    fn service(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(&self.config)
    }

    fn farmer_row(&self) -> Value {
        MockSupabaseResponses::farmer_response(&self.farmer.id.to_string(), &self.farmer.user_id.to_string())
    }

    fn doctor_row(&self) -> Value {
        MockSupabaseResponses::doctor_response(&self.doctor.id.to_string(), &self.doctor.user_id.to_string())
    }

    fn appointment_row(&self, id: Uuid, status: &str, version: i64) -> Value {
        let mut row = MockSupabaseResponses::appointment_response(
            &id.to_string(),
            &self.farmer.id.to_string(),
            &self.doctor.id.to_string(),
            status,
        );
        row["version"] = json!(version);
        row
    }

    async fn mount_doctor_lookup(&self) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("id", format!("eq.{}", self.doctor.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([self.doctor_row()])))
            .mount(&self.server)
            .await;
    }

    async fn mount_farmer_lookup(&self) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/farmers"))
            .and(query_param("id", format!("eq.{}", self.farmer.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([self.farmer_row()])))
            .mount(&self.server)
            .await;
    }

    /// Any notification not matched by a more specific mock fails verification.
    async fn forbid_other_notifications(&self) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/notifications"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .with_priority(10)
            .expect(0)
            .mount(&self.server)
            .await;
    }

    async fn expect_notification(&self, user_id: Uuid, kind: &str) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/notifications"))
            .and(body_partial_json(json!({ "user_id": user_id, "type": kind })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                MockSupabaseResponses::notification_response(&Uuid::new_v4().to_string(), &user_id.to_string(), kind)
            ])))
            .with_priority(1)
            .expect(1)
            .mount(&self.server)
            .await;
    }
}

fn leaf_spot_request(doctor_id: Uuid) -> RequestAppointmentRequest {
    RequestAppointmentRequest {
        doctor_id: Some(doctor_id),
        appointment_date: NaiveDate::from_ymd_opt(2025, 1, 10),
        appointment_time: Some("10:00".to_string()),
        problem_description: Some("leaf spot".to_string()),
        farm_type: Some(FarmType::Rice),
        urgency: None,
        meeting_link: None,
    }
}

fn status(value: &str) -> UpdateStatusRequest {
    UpdateStatusRequest {
        status: value.to_string(),
        meeting_link: None,
    }
}

#[tokio::test]
async fn request_confirm_complete_scenario() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    fx.mount_doctor_lookup().await;
    fx.mount_farmer_lookup().await;
    fx.forbid_other_notifications().await;
    fx.expect_notification(fx.doctor.user_id, "appointment_request").await;
    fx.expect_notification(fx.farmer.user_id, "appointment_confirmed").await;

    // Duplicate-slot probe finds nothing
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "pending",
            "appointment_time": "10:00:00",
            "farm_type": "rice",
            "urgency": "normal",
            "fee": 0.0,
            "version": 1
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([fx.appointment_row(appointment_id, "pending", 1)])))
        .expect(1)
        .mount(&fx.server)
        .await;

    // Reads observe the committed state of each step
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "pending", 1)])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "confirmed", 2)])))
        .with_priority(2)
        .mount(&fx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("version", "eq.1"))
        .and(query_param("status", "in.(pending,payment_pending)"))
        .and(body_partial_json(json!({ "status": "confirmed", "version": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "confirmed", 2)])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("version", "eq.2"))
        .and(query_param("status", "in.(confirmed,accepted)"))
        .and(body_partial_json(json!({ "status": "completed", "version": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "completed", 3)])))
        .expect(1)
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/increment_doctor_consultations"))
        .and(body_partial_json(json!({ "p_doctor_id": fx.doctor.id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
        .expect(1)
        .mount(&fx.server)
        .await;

    let service = fx.service();
    let doctor_party = Party::Doctor(fx.doctor.clone());

    let requested = service
        .request_appointment(&fx.farmer, leaf_spot_request(fx.doctor.id), "token")
        .await
        .unwrap();
    assert_eq!(requested.status, AppointmentStatus::Pending);

    let confirmed = service
        .transition_status(&doctor_party, &appointment_id, status("confirmed"), "token")
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let completed = service
        .transition_status(&doctor_party, &appointment_id, status("completed"), "token")
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    fx.server.verify().await;
}

#[tokio::test]
async fn duplicate_slot_is_rejected_without_insert() {
    let fx = Fixture::new().await;
    fx.mount_doctor_lookup().await;
    fx.forbid_other_notifications().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "id"))
        .and(query_param("appointment_date", "eq.2025-01-10"))
        .and(query_param("appointment_time", "eq.10:00:00"))
        .and(query_param("status", "in.(pending,payment_pending,confirmed,accepted)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .expect(1)
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let result = fx.service()
        .request_appointment(&fx.farmer, leaf_spot_request(fx.doctor.id), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::DuplicateBooking));
}

#[tokio::test]
async fn missing_doctor_selection_is_validation_error() {
    let fx = Fixture::new().await;
    let mut request = leaf_spot_request(fx.doctor.id);
    request.doctor_id = None;

    let result = fx.service().request_appointment(&fx.farmer, request, "token").await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    let result = fx.service()
        .request_appointment(&fx.farmer, leaf_spot_request(Uuid::new_v4()), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn non_owner_doctor_sees_not_found_and_nothing_changes() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "pending", 1)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let mut other_doctor = fx.doctor.clone();
    other_doctor.id = Uuid::new_v4();

    let result = fx.service()
        .transition_status(&Party::Doctor(other_doctor), &appointment_id, status("confirmed"), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn farmer_cannot_confirm_own_appointment() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "pending", 1)])))
        .mount(&fx.server)
        .await;

    let result = fx.service()
        .transition_status(&Party::Farmer(fx.farmer.clone()), &appointment_id, status("confirmed"), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::Forbidden(_)));
}

#[tokio::test]
async fn farmer_withdrawal_notifies_doctor() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    fx.mount_doctor_lookup().await;
    fx.forbid_other_notifications().await;
    fx.expect_notification(fx.doctor.user_id, "appointment_cancelled").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "confirmed", 4)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("version", "eq.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "cancelled", 5)])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let cancelled = fx.service()
        .transition_status(&Party::Farmer(fx.farmer.clone()), &appointment_id, status("cancelled"), "token")
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.version, 5);
}

#[tokio::test]
async fn terminal_state_cannot_be_left() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "completed", 3)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let result = fx.service()
        .transition_status(&Party::Doctor(fx.doctor.clone()), &appointment_id, status("cancelled"), "token")
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidTransition { from: AppointmentStatus::Completed, to: AppointmentStatus::Cancelled })
    );
}

#[tokio::test]
async fn lost_race_reports_concurrent_modification_without_side_effects() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.forbid_other_notifications().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "confirmed", 2)])))
        .mount(&fx.server)
        .await;
    // Another writer bumped the version first
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/increment_doctor_consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(1)))
        .expect(0)
        .mount(&fx.server)
        .await;

    let result = fx.service()
        .transition_status(&Party::Doctor(fx.doctor.clone()), &appointment_id, status("completed"), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::ConcurrentModification));
}

#[tokio::test]
async fn counter_failure_does_not_undo_completion() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "confirmed", 2)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "completed", 3)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/increment_doctor_consultations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("function unavailable"))
        .expect(1)
        .mount(&fx.server)
        .await;

    let completed = fx.service()
        .transition_status(&Party::Doctor(fx.doctor.clone()), &appointment_id, status("completed"), "token")
        .await
        .unwrap();

    assert_eq!(completed.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn unrecognized_status_is_rejected_before_any_read() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let result = fx.service()
        .transition_status(&Party::Doctor(fx.doctor.clone()), &Uuid::new_v4(), status("archived"), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidStatus(_)));
}

#[tokio::test]
async fn doctor_list_returns_both_requests_in_slot_order() {
    let fx = Fixture::new().await;
    let early = Uuid::new_v4();
    let late = Uuid::new_v4();

    let mut early_row = fx.appointment_row(early, "pending", 1);
    early_row["farmer_id"] = json!(Uuid::new_v4());
    early_row["appointment_time"] = json!("09:00:00");
    let mut late_row = fx.appointment_row(late, "pending", 1);
    late_row["appointment_time"] = json!("14:30:00");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", fx.doctor.id)))
        .and(query_param("order", "appointment_date.asc,appointment_time.asc"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "0-1/2")
                .set_body_json(json!([early_row, late_row])),
        )
        .expect(1)
        .mount(&fx.server)
        .await;

    let page = fx.service()
        .list_appointments(&Party::Doctor(fx.doctor.clone()), AppointmentListQuery::default(), Utc::now(), "token")
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.limit, 50);
    let ids: Vec<Uuid> = page.appointments.iter().map(|a| a.appointment.id).collect();
    assert_eq!(ids, vec![early, late]);
    assert!(page.appointments.iter().all(|a| !a.can_join));
}

#[tokio::test]
async fn list_with_unknown_status_filter_is_rejected() {
    let fx = Fixture::new().await;

    let query = AppointmentListQuery {
        status: Some("someday".to_string()),
        ..Default::default()
    };
    let result = fx.service()
        .list_appointments(&Party::Farmer(fx.farmer.clone()), query, Utc::now(), "token")
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidStatus(_)));
}

#[tokio::test]
async fn reschedule_moves_pending_slot_and_notifies_doctor() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    fx.mount_doctor_lookup().await;
    fx.forbid_other_notifications().await;
    fx.expect_notification(fx.doctor.user_id, "appointment_rescheduled").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "pending", 1)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "id"))
        .and(query_param("id", format!("neq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .with_priority(1)
        .expect(1)
        .mount(&fx.server)
        .await;

    let mut moved = fx.appointment_row(appointment_id, "pending", 2);
    moved["appointment_date"] = json!("2025-01-12");
    moved["appointment_time"] = json!("11:15:00");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("version", "eq.1"))
        .and(body_partial_json(json!({
            "appointment_date": "2025-01-12",
            "appointment_time": "11:15:00",
            "version": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([moved])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let request = RescheduleAppointmentRequest {
        appointment_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        appointment_time: "11:15".to_string(),
        problem_description: None,
        urgency: None,
        meeting_link: None,
    };
    let updated = fx.service()
        .reschedule_appointment(&fx.farmer, &appointment_id, request, "token")
        .await
        .unwrap();

    assert_eq!(updated.appointment_date, NaiveDate::from_ymd_opt(2025, 1, 12).unwrap());
    assert_eq!(updated.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn confirmed_appointment_cannot_be_deleted() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "confirmed", 2)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let result = fx.service()
        .delete_appointment(&Party::Farmer(fx.farmer.clone()), &appointment_id, "token")
        .await;

    assert_matches!(result, Err(AppointmentError::NotEditable(AppointmentStatus::Confirmed)));
}

#[tokio::test]
async fn notes_with_prescription_are_stored_as_structured_blob() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "completed", 3)])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", fx.doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([fx.appointment_row(appointment_id, "completed", 3)])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let request = ConsultationNotesRequest {
        consultation_notes: "Brown spot confirmed".to_string(),
        prescription: Some(json!({ "diagnosis": "Brown spot" })),
    };
    fx.service()
        .add_consultation_notes(&fx.doctor, &appointment_id, request, "token")
        .await
        .unwrap();

    let requests = fx.server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    let body: Value = serde_json::from_slice(&patch.body).unwrap();
    let stored: Value = serde_json::from_str(body["consultation_notes"].as_str().unwrap()).unwrap();

    assert_eq!(stored["consultation_notes"], "Brown spot confirmed");
    assert_eq!(stored["prescription"]["diagnosis"], "Brown spot");
    assert_eq!(stored["doctor_id"], json!(fx.doctor.id));
}
