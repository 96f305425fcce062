use crate::entities::payments::VerifiedPayment;
use crate::framework::DatabaseProcessor;
use bookpay_sdk::objects::{
    DeliveryDetails, OrderDetails, OrderDraft, OrderItem, OrderSummary, PaymentDetails, UserInfo,
};
use kanau::processor::Processor;
use sqlx::types::Json;

/// Payment status recorded on every order this service creates.
pub const PAYMENT_STATUS_PAID: &str = "Paid";
/// Order status recorded on creation. Later transitions happen elsewhere.
pub const ORDER_STATUS_CONFIRMED: &str = "Confirmed";
/// Delivery status recorded on creation.
pub const DELIVERY_STATUS_PLACED: &str = "Order Placed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPayment {
    pub method: String,
    pub amount_minor: i64,
    pub currency: String,
    pub razorpay_payment_id: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub status: String,
    pub payment_confirmed: bool,
    pub payment_date: time::OffsetDateTime,
}

/// A persisted order: the client draft merged with verified payment facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: String,
    pub user_info: UserInfo,
    pub items: Vec<OrderItem>,
    pub order_summary: OrderSummary,
    pub payment: OrderPayment,
    pub order_status: String,
    pub delivery_status: String,
    pub delivery_notes: Option<String>,
    pub order_date: Option<String>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

impl Order {
    /// Merge a validated draft with the gateway's view of the payment.
    ///
    /// Amount and currency always come from `payment`; the draft's own
    /// `payment.amount` is ignored.
    pub fn from_verified(
        order_id: String,
        draft: &OrderDraft,
        payment: &VerifiedPayment,
        signature: Option<&str>,
        now: time::OffsetDateTime,
    ) -> Self {
        let method = payment
            .method
            .clone()
            .unwrap_or_else(|| draft.payment.method.clone());
        Self {
            order_id,
            user_info: draft.user_info.clone(),
            items: draft.items.clone(),
            order_summary: draft.order_summary.clone(),
            payment: OrderPayment {
                method,
                amount_minor: payment.amount_minor_units,
                currency: payment.currency.clone(),
                razorpay_payment_id: payment.payment_id.clone(),
                razorpay_order_id: payment.gateway_order_id.clone(),
                razorpay_signature: signature.map(str::to_string),
                status: PAYMENT_STATUS_PAID.to_string(),
                payment_confirmed: true,
                payment_date: now,
            },
            order_status: ORDER_STATUS_CONFIRMED.to_string(),
            delivery_status: DELIVERY_STATUS_PLACED.to_string(),
            delivery_notes: None,
            order_date: draft.order_date.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_details(&self) -> OrderDetails {
        OrderDetails {
            order_id: self.order_id.clone(),
            user_info: self.user_info.clone(),
            items: self.items.clone(),
            order_summary: self.order_summary.clone(),
            payment: PaymentDetails {
                method: self.payment.method.clone(),
                amount: self.payment.amount_minor,
                currency: self.payment.currency.clone(),
                razorpay_payment_id: self.payment.razorpay_payment_id.clone(),
                razorpay_order_id: self.payment.razorpay_order_id.clone(),
                razorpay_signature: self.payment.razorpay_signature.clone(),
                status: self.payment.status.clone(),
                payment_confirmed: self.payment.payment_confirmed,
                payment_date: self.payment.payment_date.unix_timestamp(),
            },
            order_status: self.order_status.clone(),
            delivery: DeliveryDetails {
                status: self.delivery_status.clone(),
                notes: self.delivery_notes.clone(),
            },
            order_date: self.order_date.clone(),
            created_at: self.created_at.unix_timestamp(),
            updated_at: self.updated_at.unix_timestamp(),
        }
    }
}

/// Row of the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRecord {
    pub order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub user_info: Json<UserInfo>,
    pub items: Json<Vec<OrderItem>>,
    pub order_summary: Json<OrderSummary>,
    pub payment_method: String,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_status: String,
    pub payment_confirmed: bool,
    pub payment_date: time::OffsetDateTime,
    pub order_status: String,
    pub delivery_status: String,
    pub delivery_notes: Option<String>,
    pub order_date: Option<String>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Self {
            order_id: r.order_id,
            user_info: r.user_info.0,
            items: r.items.0,
            order_summary: r.order_summary.0,
            payment: OrderPayment {
                method: r.payment_method,
                amount_minor: r.amount_minor,
                currency: r.currency,
                razorpay_payment_id: r.razorpay_payment_id,
                razorpay_order_id: r.razorpay_order_id,
                razorpay_signature: r.razorpay_signature,
                status: r.payment_status,
                payment_confirmed: r.payment_confirmed,
                payment_date: r.payment_date,
            },
            order_status: r.order_status,
            delivery_status: r.delivery_status,
            delivery_notes: r.delivery_notes,
            order_date: r.order_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
/// Find the order matching either payment identifier.
///
/// A `None` identifier never matches.
pub struct FindOrderByPaymentIdentity {
    pub payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
}

impl Processor<FindOrderByPaymentIdentity> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindOrderByPaymentIdentity")]
    async fn process(
        &self,
        query: FindOrderByPaymentIdentity,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT
                order_id, razorpay_payment_id, razorpay_order_id, razorpay_signature,
                user_info, items, order_summary, payment_method, amount_minor, currency,
                payment_status, payment_confirmed, payment_date, order_status,
                delivery_status, delivery_notes, order_date, created_at, updated_at
            FROM orders
            WHERE razorpay_payment_id = $1 OR razorpay_order_id = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
            .bind(query.payment_id)
            .bind(query.gateway_order_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetOrderById {
    pub order_id: String,
}

impl Processor<GetOrderById> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderById")]
    async fn process(&self, query: GetOrderById) -> Result<Option<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT
                order_id, razorpay_payment_id, razorpay_order_id, razorpay_signature,
                user_info, items, order_summary, payment_method, amount_minor, currency,
                payment_status, payment_confirmed, payment_date, order_status,
                delivery_status, delivery_notes, order_date, created_at, updated_at
            FROM orders
            WHERE order_id = $1
            "#,
        )
            .bind(query.order_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Insert a new order.
///
/// No `ON CONFLICT` clause: a unique violation is the deduplication
/// signal and must reach the caller.
pub struct InsertOrder {
    pub order: Order,
}

impl Processor<InsertOrder> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOrder")]
    async fn process(&self, insert: InsertOrder) -> Result<(), sqlx::Error> {
        let order = insert.order;
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, razorpay_payment_id, razorpay_order_id, razorpay_signature,
                user_info, items, order_summary, payment_method, amount_minor, currency,
                payment_status, payment_confirmed, payment_date, order_status,
                delivery_status, delivery_notes, order_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
            .bind(order.order_id)
            .bind(order.payment.razorpay_payment_id)
            .bind(order.payment.razorpay_order_id)
            .bind(order.payment.razorpay_signature)
            .bind(Json(order.user_info))
            .bind(Json(order.items))
            .bind(Json(order.order_summary))
            .bind(order.payment.method)
            .bind(order.payment.amount_minor)
            .bind(order.payment.currency)
            .bind(order.payment.status)
            .bind(order.payment.payment_confirmed)
            .bind(order.payment.payment_date)
            .bind(order.order_status)
            .bind(order.delivery_status)
            .bind(order.delivery_notes)
            .bind(order.order_date)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::payments::PaymentStatus;
    use crate::testing::sample_draft;

    #[test]
    fn test_merge_takes_amount_from_gateway() {
        let mut draft = sample_draft(Some("BK-1"));
        draft.payment.amount = Some(rust_decimal::Decimal::new(1, 0));
        let payment = VerifiedPayment {
            payment_id: "pay_123".to_string(),
            gateway_order_id: Some("order_abc".to_string()),
            amount_minor_units: 49900,
            currency: "INR".to_string(),
            status: PaymentStatus::Captured,
            method: Some("upi".to_string()),
        };
        let now = time::OffsetDateTime::now_utc();
        let order = Order::from_verified("BK-1".into(), &draft, &payment, Some("sig"), now);

        assert_eq!(order.payment.amount_minor, 49900);
        assert_eq!(order.payment.method, "upi");
        assert_eq!(order.payment.status, PAYMENT_STATUS_PAID);
        assert!(order.payment.payment_confirmed);
        assert_eq!(order.order_status, ORDER_STATUS_CONFIRMED);
        assert_eq!(order.delivery_status, DELIVERY_STATUS_PLACED);

        let details = order.to_details();
        assert_eq!(details.payment.razorpay_signature.as_deref(), Some("sig"));
        assert_eq!(details.created_at, now.unix_timestamp());
    }
}
