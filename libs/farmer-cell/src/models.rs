use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Farmer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub farmer_name: String,
    pub address: Option<String>,
    pub farm_type: Option<String>,
    pub farm_size: Option<String>,
    pub experience_years: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFarmerProfileRequest {
    pub farmer_name: Option<String>,
    pub address: Option<String>,
    pub farm_type: Option<String>,
    pub farm_size: Option<String>,
    pub experience_years: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FarmerListQuery {
    pub name: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum FarmerError {
    #[error("Farmer profile not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for FarmerError {
    fn from(err: anyhow::Error) -> Self {
        FarmerError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for FarmerError {
    fn from(err: serde_json::Error) -> Self {
        FarmerError::DatabaseError(err.to_string())
    }
}
