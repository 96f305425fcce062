use bookpay_sdk::objects::GatewayPaymentEntity;

/// Payment state as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment status `{0}`")]
pub struct UnknownPaymentStatus(pub String);

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownPaymentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PaymentStatus::Created),
            "authorized" => Ok(PaymentStatus::Authorized),
            "captured" => Ok(PaymentStatus::Captured),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownPaymentStatus(other.to_string())),
        }
    }
}

/// Payment facts re-derived from the gateway. Overrides anything the draft
/// claims about amount and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub payment_id: String,
    pub gateway_order_id: Option<String>,
    pub amount_minor_units: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: Option<String>,
}

impl TryFrom<GatewayPaymentEntity> for VerifiedPayment {
    type Error = UnknownPaymentStatus;

    fn try_from(entity: GatewayPaymentEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            status: entity.status.parse()?,
            payment_id: entity.id,
            gateway_order_id: entity.order_id,
            amount_minor_units: entity.amount,
            currency: entity.currency,
            method: entity.method,
        })
    }
}
