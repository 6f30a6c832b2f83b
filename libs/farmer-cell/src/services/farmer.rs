use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Farmer, FarmerError, FarmerListQuery, UpdateFarmerProfileRequest};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 100;

pub struct FarmerService {
    supabase: SupabaseClient,
}

impl FarmerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Resolves the farmer profile owned by an authenticated user, if any.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<Farmer>, FarmerError> {
        debug!("Resolving farmer profile for user {}", user_id);

        let path = format!("/rest/v1/farmers?user_id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_farmer(
        &self,
        farmer_id: &str,
        auth_token: &str,
    ) -> Result<Farmer, FarmerError> {
        debug!("Fetching farmer profile: {}", farmer_id);

        let path = format!("/rest/v1/farmers?id=eq.{}", farmer_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let row = result.into_iter().next().ok_or(FarmerError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Farmer self-service edit of the caller's own profile.
    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateFarmerProfileRequest,
        auth_token: &str,
    ) -> Result<Farmer, FarmerError> {
        debug!("Updating farmer profile for user {}", user_id);

        let changes = profile_changes(request)?;
        let farmer = self.patch(&format!("user_id=eq.{}", user_id), changes, auth_token).await?;
        info!("Farmer profile {} updated", farmer.id);

        Ok(farmer)
    }

    /// Admin edit of any farmer profile by id.
    pub async fn admin_update(
        &self,
        farmer_id: &Uuid,
        request: UpdateFarmerProfileRequest,
        auth_token: &str,
    ) -> Result<Farmer, FarmerError> {
        debug!("Admin update of farmer {}", farmer_id);

        let changes = profile_changes(request)?;
        let farmer = self.patch(&format!("id=eq.{}", farmer_id), changes, auth_token).await?;
        info!("Farmer profile {} updated by admin", farmer.id);

        Ok(farmer)
    }

    /// Removes the farmer's user row; the profile, appointments and orders
    /// go with it through `ON DELETE CASCADE`.
    pub async fn delete_farmer(&self, farmer_id: &Uuid, auth_token: &str) -> Result<Farmer, FarmerError> {
        let farmer = self.get_farmer(&farmer_id.to_string(), auth_token).await?;

        let path = format!("/rest/v1/users?id=eq.{}", farmer.user_id);
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Err(FarmerError::NotFound);
        }

        info!("Farmer {} and user {} deleted", farmer.id, farmer.user_id);
        Ok(farmer)
    }

    async fn patch(
        &self,
        filter: &str,
        changes: serde_json::Map<String, Value>,
        auth_token: &str,
    ) -> Result<Farmer, FarmerError> {
        let path = format!("/rest/v1/farmers?{}", filter);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(changes)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(FarmerError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn list_farmers(
        &self,
        query: FarmerListQuery,
        auth_token: &str,
    ) -> Result<Vec<Farmer>, FarmerError> {
        debug!("Listing farmers with query: {:?}", query);

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut path = String::from("/rest/v1/farmers?order=farmer_name.asc");
        if let Some(name) = query.name.filter(|n| !n.trim().is_empty()) {
            path.push_str(&format!("&farmer_name=ilike.*{}*", name.trim()));
        }
        path.push_str(&format!("&limit={}&offset={}", limit, offset));

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let farmers = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Farmer>, _>>()?;

        Ok(farmers)
    }
}

fn profile_changes(request: UpdateFarmerProfileRequest) -> Result<serde_json::Map<String, Value>, FarmerError> {
    let mut changes = serde_json::Map::new();

    if let Some(farmer_name) = request.farmer_name {
        if farmer_name.trim().is_empty() {
            return Err(FarmerError::ValidationError("Farmer name cannot be empty".to_string()));
        }
        changes.insert("farmer_name".to_string(), json!(farmer_name.trim()));
    }
    if let Some(address) = request.address {
        changes.insert("address".to_string(), json!(address));
    }
    if let Some(farm_type) = request.farm_type {
        changes.insert("farm_type".to_string(), json!(farm_type));
    }
    if let Some(farm_size) = request.farm_size {
        changes.insert("farm_size".to_string(), json!(farm_size));
    }
    if let Some(experience_years) = request.experience_years {
        if experience_years < 0 {
            return Err(FarmerError::ValidationError("Experience years cannot be negative".to_string()));
        }
        changes.insert("experience_years".to_string(), json!(experience_years));
    }

    if changes.is_empty() {
        return Err(FarmerError::ValidationError("No profile fields to update".to_string()));
    }

    Ok(changes)
}
