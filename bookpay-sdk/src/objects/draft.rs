//! The client-built order draft submitted alongside a payment.
//!
//! The draft crosses a trust boundary: every field is client controlled.
//! [`OrderDraft::validate`] checks the shape and arithmetic before the
//! server uses it, and yields the grand total in minor units that is
//! compared against the amount the gateway reports.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Shipping and contact details of the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(alias = "productId", alias = "id")]
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(alias = "unitPrice", alias = "price")]
    pub unit_price: Decimal,
    #[serde(alias = "lineTotal")]
    pub line_total: Decimal,
}

/// Totals as displayed at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub subtotal: Decimal,
    #[serde(default, alias = "couponDiscount")]
    pub coupon_discount: Decimal,
    #[serde(default, alias = "deliveryCharge")]
    pub delivery_charge: Decimal,
    #[serde(alias = "grandTotal")]
    pub grand_total: Decimal,
}

/// Payment method chosen in the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPayment {
    pub method: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// The order as constructed by the storefront before verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    #[serde(default, alias = "orderId")]
    pub order_id: Option<String>,
    #[serde(alias = "userInfo")]
    pub user_info: UserInfo,
    pub items: Vec<OrderItem>,
    #[serde(alias = "orderSummary")]
    pub order_summary: OrderSummary,
    pub payment: DraftPayment,
    #[serde(default, alias = "orderDate")]
    pub order_date: Option<String>,
}

/// Totals recomputed from the draft's line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftTotals {
    pub grand_total: Decimal,
    pub grand_total_minor: i64,
}

/// Reasons a draft is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("order draft is not valid json: {0}")]
    Malformed(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("order has no items")]
    NoItems,
    #[error("item {0} has zero quantity")]
    ZeroQuantity(String),
    #[error("negative amount in `{0}`")]
    NegativeAmount(&'static str),
    #[error("line total of item {0} does not match quantity x unit price")]
    LineTotalMismatch(String),
    #[error("subtotal does not match the sum of line totals")]
    SubtotalMismatch,
    #[error("grand total does not match subtotal - discount + delivery")]
    GrandTotalMismatch,
    #[error("grand total must be positive")]
    NonPositiveTotal,
    #[error("amount `{0}` has sub-minor-unit precision")]
    Precision(&'static str),
    #[error("invalid email address")]
    InvalidEmail,
    #[error("amount `{0}` is out of range")]
    AmountOverflow(&'static str),
}

/// Convert a major-unit amount (e.g. rupees) into minor units (paise).
///
/// Returns `None` if the amount carries precision finer than one minor
/// unit or does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let scaled = amount.checked_mul(Decimal::ONE_HUNDRED)?;
    if !scaled.fract().is_zero() {
        return None;
    }
    scaled.to_i64()
}

impl OrderDraft {
    /// Parse a draft from an untrusted JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DraftError> {
        serde_json::from_value(value).map_err(|e| DraftError::Malformed(e.to_string()))
    }

    /// Validate the draft and recompute its totals.
    pub fn validate(&self) -> Result<DraftTotals, DraftError> {
        let user = &self.user_info;
        if user.name.trim().is_empty() {
            return Err(DraftError::MissingField("user_info.name"));
        }
        if user.phone.trim().is_empty() {
            return Err(DraftError::MissingField("user_info.phone"));
        }
        if user.address.trim().is_empty() {
            return Err(DraftError::MissingField("user_info.address"));
        }
        if !is_plausible_email(&user.email) {
            return Err(DraftError::InvalidEmail);
        }
        if self.payment.method.trim().is_empty() {
            return Err(DraftError::MissingField("payment.method"));
        }
        if self.items.is_empty() {
            return Err(DraftError::NoItems);
        }

        let mut subtotal = Decimal::ZERO;
        for item in &self.items {
            if item.product_id.trim().is_empty() {
                return Err(DraftError::MissingField("items.product_id"));
            }
            if item.quantity == 0 {
                return Err(DraftError::ZeroQuantity(item.product_id.clone()));
            }
            if item.unit_price.is_sign_negative() {
                return Err(DraftError::NegativeAmount("items.unit_price"));
            }
            let expected_line = item
                .unit_price
                .checked_mul(Decimal::from(item.quantity))
                .ok_or(DraftError::AmountOverflow("items.line_total"))?;
            if expected_line != item.line_total {
                return Err(DraftError::LineTotalMismatch(item.product_id.clone()));
            }
            subtotal = subtotal
                .checked_add(item.line_total)
                .ok_or(DraftError::AmountOverflow("order_summary.subtotal"))?;
        }

        let summary = &self.order_summary;
        if summary.coupon_discount.is_sign_negative() {
            return Err(DraftError::NegativeAmount("order_summary.coupon_discount"));
        }
        if summary.delivery_charge.is_sign_negative() {
            return Err(DraftError::NegativeAmount("order_summary.delivery_charge"));
        }
        if subtotal != summary.subtotal {
            return Err(DraftError::SubtotalMismatch);
        }

        let grand_total = subtotal
            .checked_sub(summary.coupon_discount)
            .and_then(|total| total.checked_add(summary.delivery_charge))
            .ok_or(DraftError::AmountOverflow("order_summary.grand_total"))?;
        if grand_total != summary.grand_total {
            return Err(DraftError::GrandTotalMismatch);
        }
        if grand_total <= Decimal::ZERO {
            return Err(DraftError::NonPositiveTotal);
        }
        let grand_total_minor =
            to_minor_units(grand_total).ok_or(DraftError::Precision("order_summary.grand_total"))?;

        Ok(DraftTotals {
            grand_total,
            grand_total_minor,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "order_id": "BK-1001",
            "user_info": {
                "name": "Asha Rao",
                "email": "asha@example.com",
                "phone": "+91 98450 00000",
                "address": "12 MG Road, Bengaluru"
            },
            "items": [
                {"product_id": "isbn-978", "name": "The Hobbit", "quantity": 2, "unit_price": 199.5, "line_total": 399.0},
                {"product_id": "isbn-979", "name": "Dune", "quantity": 1, "unit_price": "150.00", "line_total": "150.00"}
            ],
            "order_summary": {"subtotal": 549, "coupon_discount": 100, "delivery_charge": 50, "grand_total": 499.00},
            "payment": {"method": "razorpay", "amount": 499},
            "order_date": "2026-10-14T10:00:00Z"
        })
    }

    #[test]
    fn test_valid_draft_totals() {
        let draft = OrderDraft::from_json(sample()).unwrap();
        let totals = draft.validate().unwrap();
        assert_eq!(totals.grand_total_minor, 49900);
        assert_eq!(draft.items.len(), 2);
    }

    #[test]
    fn test_camel_case_aliases() {
        let value = json!({
            "orderId": "BK-1",
            "userInfo": {"name": "A", "email": "a@b.co", "phone": "1", "address": "x"},
            "items": [{"productId": "p1", "name": "Book", "quantity": 1, "price": 10, "lineTotal": 10}],
            "orderSummary": {"subtotal": 10, "grandTotal": 10},
            "payment": {"method": "upi"}
        });
        let draft = OrderDraft::from_json(value).unwrap();
        assert_eq!(draft.order_id.as_deref(), Some("BK-1"));
        assert_eq!(draft.validate().unwrap().grand_total_minor, 1000);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("user_info");
        assert!(matches!(OrderDraft::from_json(value), Err(DraftError::Malformed(_))));
    }

    #[test]
    fn test_tampered_totals_rejected() {
        let mut value = sample();
        value["order_summary"]["grand_total"] = json!(1.0);
        let draft = OrderDraft::from_json(value).unwrap();
        assert_eq!(draft.validate(), Err(DraftError::GrandTotalMismatch));

        let mut value = sample();
        value["items"][0]["line_total"] = json!(1.0);
        let draft = OrderDraft::from_json(value).unwrap();
        assert!(matches!(draft.validate(), Err(DraftError::LineTotalMismatch(_))));
    }

    #[test]
    fn test_empty_items_and_bad_email() {
        let mut value = sample();
        value["items"] = json!([]);
        let draft = OrderDraft::from_json(value).unwrap();
        assert_eq!(draft.validate(), Err(DraftError::NoItems));

        let mut value = sample();
        value["user_info"]["email"] = json!("not-an-email");
        let draft = OrderDraft::from_json(value).unwrap();
        assert_eq!(draft.validate(), Err(DraftError::InvalidEmail));
    }

    #[test]
    fn test_huge_amounts_are_rejected() {
        let mut value = sample();
        value["items"][0]["unit_price"] = json!(Decimal::MAX.to_string());
        let draft = OrderDraft::from_json(value).unwrap();
        assert_eq!(
            draft.validate(),
            Err(DraftError::AmountOverflow("items.line_total"))
        );

        let mut value = sample();
        value["items"][0]["quantity"] = json!(1);
        value["items"][0]["unit_price"] = json!(Decimal::MAX.to_string());
        value["items"][0]["line_total"] = json!(Decimal::MAX.to_string());
        let draft = OrderDraft::from_json(value).unwrap();
        assert_eq!(
            draft.validate(),
            Err(DraftError::AmountOverflow("order_summary.subtotal"))
        );

        let mut value = sample();
        value["items"] = json!([{"product_id": "p1", "name": "Book", "quantity": 1,
            "unit_price": Decimal::MAX.to_string(), "line_total": Decimal::MAX.to_string()}]);
        value["order_summary"] = json!({"subtotal": Decimal::MAX.to_string(),
            "coupon_discount": 0, "delivery_charge": 1, "grand_total": 1});
        let draft = OrderDraft::from_json(value).unwrap();
        assert_eq!(
            draft.validate(),
            Err(DraftError::AmountOverflow("order_summary.grand_total"))
        );
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(49900, 2)), Some(49900));
        assert_eq!(to_minor_units(Decimal::new(499, 0)), Some(49900));
        assert_eq!(to_minor_units(Decimal::new(49901, 2)), Some(49901));
        assert_eq!(to_minor_units(Decimal::new(499001, 3)), None);
    }
}
