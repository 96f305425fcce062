//! HMAC-SHA256 signatures used by the payment gateway.
//!
//! Two schemes exist:
//!
//! * **Checkout signature** (returned to the browser after payment):
//!   `hex(HMAC-SHA256("{gateway_order_id}|{payment_id}", key_secret))`
//!
//! * **Webhook signature** (the `X-Razorpay-Signature` header):
//!   `hex(HMAC-SHA256(raw_body, webhook_secret))`
//!
//! Verification never fails loudly: every malformed or missing input
//! yields `false`. Signatures must be lowercase hex, which is what the
//! gateway emits.

use ring::hmac;

/// Header carrying the webhook body signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

/// Header carrying the provider's unique event id.
pub const WEBHOOK_EVENT_ID_HEADER: &str = "X-Razorpay-Event-Id";

fn tag(data: &[u8], secret: &[u8]) -> hmac::Tag {
    hmac::sign(&hmac::Key::new(hmac::HMAC_SHA256, secret), data)
}

fn checkout_message(gateway_order_id: &str, payment_id: &str) -> String {
    format!("{gateway_order_id}|{payment_id}")
}

fn is_lower_hex(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn verify_hex(data: &[u8], signature: &str, secret: &[u8]) -> bool {
    if secret.is_empty() || signature.is_empty() || !is_lower_hex(signature) {
        return false;
    }
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    hmac::verify(
        &hmac::Key::new(hmac::HMAC_SHA256, secret),
        data,
        &expected,
    )
    .is_ok()
}

/// Compute the checkout signature for an order/payment pair.
pub fn sign_payment(gateway_order_id: &str, payment_id: &str, secret: &[u8]) -> String {
    let message = checkout_message(gateway_order_id, payment_id);
    hex::encode(tag(message.as_bytes(), secret).as_ref())
}

/// Verify the checkout signature for an order/payment pair.
///
/// The comparison is constant time. Missing identifiers, an empty secret
/// or a signature that is not lowercase hex all return `false`.
pub fn verify_payment_signature(
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &[u8],
) -> bool {
    if gateway_order_id.is_empty() || payment_id.is_empty() {
        return false;
    }
    let message = checkout_message(gateway_order_id, payment_id);
    verify_hex(message.as_bytes(), signature, secret)
}

/// Compute the webhook signature over a raw request body.
pub fn sign_webhook(body: &[u8], secret: &[u8]) -> String {
    hex::encode(tag(body, secret).as_ref())
}

/// Verify a webhook signature over the raw request body.
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &[u8]) -> bool {
    verify_hex(body, signature, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test";
    const EXPECTED: &str = "791780dcd0331bd7980f2cbe3ae5899061aa79fb57d2bba54b5bc8f81a5d33e1";
    const OTHER_PAIR: &str = "fe1cbc5f2b5c584c834d142633e04e2cc58e3cef83d60e1b134f614fa8e10434";

    #[test]
    fn test_known_vector() {
        assert_eq!(sign_payment("order_abc", "pay_123", SECRET), EXPECTED);
        assert!(verify_payment_signature("order_abc", "pay_123", EXPECTED, SECRET));
    }

    #[test]
    fn test_signature_of_other_pair_rejected() {
        assert_eq!(sign_payment("order_abc", "pay_124", SECRET), OTHER_PAIR);
        assert!(!verify_payment_signature("order_abc", "pay_123", OTHER_PAIR, SECRET));
    }

    #[test]
    fn test_single_byte_mutations_rejected() {
        let mutate = |s: &str, i: usize| {
            let mut bytes = s.as_bytes().to_vec();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            String::from_utf8(bytes).unwrap()
        };

        for i in 0..EXPECTED.len() {
            assert!(!verify_payment_signature("order_abc", "pay_123", &mutate(EXPECTED, i), SECRET));
        }
        for i in 0.."order_abc".len() {
            assert!(!verify_payment_signature(&mutate("order_abc", i), "pay_123", EXPECTED, SECRET));
        }
        for i in 0.."pay_123".len() {
            assert!(!verify_payment_signature("order_abc", &mutate("pay_123", i), EXPECTED, SECRET));
        }
        assert!(!verify_payment_signature("order_abc", "pay_123", EXPECTED, b"whsec_tesT"));
    }

    #[test]
    fn test_case_change_rejected() {
        let upper = EXPECTED.to_uppercase();
        assert!(!verify_payment_signature("order_abc", "pay_123", &upper, SECRET));
    }

    #[test]
    fn test_malformed_input_fails_closed() {
        assert!(!verify_payment_signature("", "pay_123", EXPECTED, SECRET));
        assert!(!verify_payment_signature("order_abc", "", EXPECTED, SECRET));
        assert!(!verify_payment_signature("order_abc", "pay_123", "", SECRET));
        assert!(!verify_payment_signature("order_abc", "pay_123", EXPECTED, b""));
        assert!(!verify_payment_signature("order_abc", "pay_123", "not-hex", SECRET));
        assert!(!verify_payment_signature("order_abc", "pay_123", "abc", SECRET));
        assert!(!verify_payment_signature("order_abc", "pay_123", &EXPECTED[..62], SECRET));
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign_webhook(body, SECRET);
        assert_eq!(
            sig,
            "4f463a57dd128675850163391f0311888616d57bccca75c774c9cdb28134f851"
        );
        assert!(verify_webhook_signature(body, &sig, SECRET));
        assert!(!verify_webhook_signature(br#"{"event":"payment.failed"}"#, &sig, SECRET));
        assert!(!verify_webhook_signature(body, &sig, b"other"));
    }
}
