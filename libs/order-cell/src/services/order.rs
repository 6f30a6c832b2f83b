use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use farmer_cell::{Farmer, FarmerService};

use crate::models::{CreateOrderRequest, MedicineOrder, OrderError, OrderStatus};

pub struct OrderService {
    supabase: SupabaseClient,
    farmers: FarmerService,
}

impl OrderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            farmers: FarmerService::new(config),
        }
    }

    pub async fn resolve_farmer(&self, user_id: &str, auth_token: &str) -> Result<Farmer, OrderError> {
        self.farmers
            .find_by_user_id(user_id, auth_token)
            .await
            .map_err(|e| OrderError::DatabaseError(e.to_string()))?
            .ok_or(OrderError::FarmerNotFound)
    }

    /// The total is always computed here; clients never supply it.
    pub async fn create_order(
        &self,
        farmer: &Farmer,
        request: CreateOrderRequest,
        auth_token: &str,
    ) -> Result<MedicineOrder, OrderError> {
        let total_amount = request.validated_total()?;
        debug!("Creating order for farmer {} with {} items", farmer.id, request.items.len());

        let order_data = json!({
            "farmer_id": farmer.id,
            "shop_id": request.shop_id,
            "items": request.items,
            "total_amount": total_amount,
            "status": OrderStatus::Pending
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/medicine_orders",
            Some(auth_token),
            Some(order_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| OrderError::DatabaseError("Failed to create order".to_string()))?;
        let order: MedicineOrder = serde_json::from_value(row)?;

        info!("Order {} created for farmer {} totalling {:.2}", order.id, farmer.id, order.total_amount);
        Ok(order)
    }

    pub async fn list_for_farmer(&self, farmer: &Farmer, auth_token: &str) -> Result<Vec<MedicineOrder>, OrderError> {
        let path = format!("/rest/v1/medicine_orders?farmer_id=eq.{}&order=created_at.desc", farmer.id);
        let orders: Vec<MedicineOrder> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(orders)
    }
}
