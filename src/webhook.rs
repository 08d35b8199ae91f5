//! Gateway webhook trust boundary and event model.
//!
//! The signature is verified over the exact raw bytes received, before any
//! parsing or state mutation. Verification failure is the only non-success
//! outcome; everything signature-valid is acknowledged so the gateway does
//! not build up a retry backlog.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the gateway's HMAC-SHA256 signature (hex) over the raw body.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Checkout-callback signature: HMAC-SHA256 over `"<order_id>|<payment_id>"`
/// with the API key secret.
pub fn verify_checkout_signature(
    key_secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature_hex: &str,
) -> bool {
    let message = format!("{gateway_order_id}|{gateway_payment_id}");
    verify_signature(key_secret, message.as_bytes(), signature_hex)
}

/// Gateway events this system reconciles. Everything else is `Ignored` and
/// acknowledged as a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentCaptured {
        payment_id: Option<String>,
        gateway_order_id: Option<String>,
    },
    PaymentFailed {
        payment_id: Option<String>,
        gateway_order_id: Option<String>,
    },
    OrderPaid {
        gateway_order_id: Option<String>,
    },
    RefundUpdate {
        completed: bool,
        payment_id: Option<String>,
        gateway_order_id: Option<String>,
        amount: Option<Decimal>,
    },
    Ignored,
}

fn entity_str(payload: &serde_json::Value, entity: &str, field: &str) -> Option<String> {
    payload["payload"][entity]["entity"][field]
        .as_str()
        .map(str::to_string)
}

/// Parse a signature-valid raw body into an event. Malformed or unrecognized
/// payloads become `Ignored`; the gateway may send event shapes this system
/// has no interest in.
pub fn parse_event(body: &[u8]) -> GatewayEvent {
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(body) else {
        return GatewayEvent::Ignored;
    };
    let Some(event) = payload["event"].as_str() else {
        return GatewayEvent::Ignored;
    };

    match event {
        "payment.captured" => GatewayEvent::PaymentCaptured {
            payment_id: entity_str(&payload, "payment", "id"),
            gateway_order_id: entity_str(&payload, "payment", "order_id"),
        },
        "payment.failed" => GatewayEvent::PaymentFailed {
            payment_id: entity_str(&payload, "payment", "id"),
            gateway_order_id: entity_str(&payload, "payment", "order_id"),
        },
        "order.paid" => GatewayEvent::OrderPaid {
            gateway_order_id: entity_str(&payload, "order", "id"),
        },
        "refund.created" | "refund.processed" => GatewayEvent::RefundUpdate {
            completed: event == "refund.processed",
            payment_id: entity_str(&payload, "refund", "payment_id"),
            gateway_order_id: entity_str(&payload, "refund", "order_id"),
            // Gateway amounts are in minor units.
            amount: payload["payload"]["refund"]["entity"]["amount"]
                .as_i64()
                .map(|paise| Decimal::from(paise) / Decimal::from(100)),
        },
        _ => GatewayEvent::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"event":"payment.captured"}"#;
        assert!(verify_signature(SECRET, body, &sign(body)));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign(body);
        assert!(!verify_signature(SECRET, br#"{"event":"payment.failed"}"#, &signature));
    }

    #[test]
    fn garbage_signature_fails_quietly() {
        assert!(!verify_signature(SECRET, b"{}", "not-hex!"));
        assert!(!verify_signature(SECRET, b"{}", "deadbeef"));
    }

    #[test]
    fn checkout_signature_covers_order_and_payment() {
        let mut mac = HmacSha256::new_from_slice(b"key_secret").unwrap();
        mac.update(b"order_G1|pay_1");
        let signature = hex::encode(mac.finalize().into_bytes());
        assert!(verify_checkout_signature("key_secret", "order_G1", "pay_1", &signature));
        assert!(!verify_checkout_signature("key_secret", "order_G1", "pay_2", &signature));
    }

    #[test]
    fn parses_payment_captured() {
        let body = br#"{
            "event": "payment.captured",
            "payload": {"payment": {"entity": {"id": "pay_1", "order_id": "order_G1"}}}
        }"#;
        assert_eq!(
            parse_event(body),
            GatewayEvent::PaymentCaptured {
                payment_id: Some("pay_1".into()),
                gateway_order_id: Some("order_G1".into()),
            }
        );
    }

    #[test]
    fn parses_refund_amount_from_minor_units() {
        let body = br#"{
            "event": "refund.processed",
            "payload": {"refund": {"entity": {"payment_id": "pay_1", "amount": 100000}}}
        }"#;
        match parse_event(body) {
            GatewayEvent::RefundUpdate {
                completed, amount, payment_id, ..
            } => {
                assert!(completed);
                assert_eq!(payment_id.as_deref(), Some("pay_1"));
                assert_eq!(amount, Some(Decimal::from(1000)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_and_malformed_body_are_ignored() {
        assert_eq!(parse_event(br#"{"event":"invoice.paid"}"#), GatewayEvent::Ignored);
        assert_eq!(parse_event(b"not json"), GatewayEvent::Ignored);
        assert_eq!(parse_event(b"{}"), GatewayEvent::Ignored);
    }
}
