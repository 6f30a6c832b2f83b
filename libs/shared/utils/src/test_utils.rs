use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_store(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            server_port: 5000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "farmer".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn farmer(email: &str) -> Self {
        Self::new(email, "farmer")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows shaped like the platform tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn farmer_response(farmer_id: &str, user_id: &str) -> serde_json::Value {
        json!({
            "id": farmer_id,
            "user_id": user_id,
            "farmer_name": "Rahim Uddin",
            "address": "Mymensingh Sadar",
            "farm_type": "rice",
            "farm_size": "3 acres",
            "experience_years": 12,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(doctor_id: &str, user_id: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "user_id": user_id,
            "full_name": "Dr. Nasrin Akter",
            "qualification": "PhD Plant Pathology",
            "specialization": "crop_diseases",
            "experience_years": 9,
            "workplace": "Bangladesh Rice Research Institute",
            "license_number": "AGRI-2291",
            "available_time_start": "09:00:00",
            "available_time_end": "17:00:00",
            "available_days": ["sunday", "monday", "tuesday"],
            "consultation_fee": 300.0,
            "rating": 4.8,
            "total_consultations": 41,
            "is_verified": true
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        farmer_id: &str,
        doctor_id: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "farmer_id": farmer_id,
            "doctor_id": doctor_id,
            "appointment_date": "2025-01-10",
            "appointment_time": "10:00:00",
            "problem_description": "leaf spot",
            "farm_type": "rice",
            "urgency": "normal",
            "status": status,
            "meeting_link": null,
            "fee": 0.0,
            "consultation_notes": null,
            "version": 1,
            "created_at": "2025-01-01T08:00:00Z",
            "updated_at": "2025-01-01T08:00:00Z"
        })
    }

    pub fn prescription_response(
        prescription_id: &str,
        prescription_no: &str,
        doctor_id: &str,
        farmer_id: &str,
        appointment_id: Option<&str>,
    ) -> serde_json::Value {
        json!({
            "id": prescription_id,
            "prescription_no": prescription_no,
            "appointment_id": appointment_id,
            "doctor_id": doctor_id,
            "farmer_id": farmer_id,
            "diagnosis": "Brown spot",
            "treatment": "Fungicide spray",
            "medicines": [
                { "name": "Mancozeb 75% WP", "dosage": "2 g/L", "duration": "7 days", "instructions": "Spray in the evening", "kind": "medicine" }
            ],
            "instructions": null,
            "follow_up_date": null,
            "notes": null,
            "created_at": "2025-01-10T11:00:00Z"
        })
    }

    pub fn notification_response(notification_id: &str, user_id: &str, kind: &str) -> serde_json::Value {
        json!({
            "id": notification_id,
            "user_id": user_id,
            "title": "Notification",
            "message": "Something happened",
            "type": kind,
            "related_id": null,
            "is_read": false,
            "created_at": "2025-01-10T09:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
