use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i32,
    pub price: f64,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineOrder {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub shop_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub shop_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl CreateOrderRequest {
    /// Checks every line and returns the order total, rounded to cents.
    pub fn validated_total(&self) -> Result<f64, OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::ValidationError("Order must contain at least one item".to_string()));
        }

        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(OrderError::ValidationError("Every item needs a name".to_string()));
            }
            if item.quantity < 1 {
                return Err(OrderError::ValidationError(format!("Quantity for {} must be at least 1", item.name)));
            }
            if !item.price.is_finite() || item.price < 0.0 {
                return Err(OrderError::ValidationError(format!("Price for {} cannot be negative", item.name)));
            }
        }

        let total: f64 = self.items.iter().map(OrderItem::line_total).sum();
        Ok((total * 100.0).round() / 100.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Farmer profile not found")]
    FarmerNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for OrderError {
    fn from(err: anyhow::Error) -> Self {
        OrderError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::DatabaseError(err.to_string())
    }
}
