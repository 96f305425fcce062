//! The confirmed order as returned to the storefront.

use serde::{Deserialize, Serialize};

use super::draft::{OrderItem, OrderSummary, UserInfo};

/// Verified payment facts attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: String,
    /// Amount in minor units, as reported by the gateway.
    pub amount: i64,
    pub currency: String,
    pub razorpay_payment_id: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub status: String,
    pub payment_confirmed: bool,
    /// Unix timestamp.
    pub payment_date: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub status: String,
    pub notes: Option<String>,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_id: String,
    pub user_info: UserInfo,
    pub items: Vec<OrderItem>,
    pub order_summary: OrderSummary,
    pub payment: PaymentDetails,
    pub order_status: String,
    pub delivery: DeliveryDetails,
    pub order_date: Option<String>,
    /// Unix timestamp.
    pub created_at: i64,
    /// Unix timestamp.
    pub updated_at: i64,
}
