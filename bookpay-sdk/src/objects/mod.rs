//! Request, response and payload types exchanged with the payment service.

pub mod draft;
pub mod gateway;
pub mod order;
pub mod payment;

pub use draft::{DraftError, DraftPayment, DraftTotals, OrderDraft, OrderItem, OrderSummary, UserInfo};
pub use gateway::{GatewayErrorBody, GatewayPaymentEntity, OrderPaymentsCollection, WebhookEnvelope};
pub use order::{DeliveryDetails, OrderDetails, PaymentDetails};
pub use payment::{
    CheckPaymentStatusRequest, PaymentAssertion, PaymentResponse, RecoveryStatus,
    VerifyPaymentRequest, WebhookResponse,
};
