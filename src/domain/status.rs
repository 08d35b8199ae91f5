//! Closed status enumerations for the three lifecycle domains of an order,
//! plus payment and refund bookkeeping states.
//!
//! Every enum round-trips through its SCREAMING_SNAKE_CASE wire form; an
//! unknown string is a client input error, never a panic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommerceError;

/// One of the three independent status tracks on an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Fulfillment,
    Return,
    Exchange,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fulfillment => "fulfillment",
            Domain::Return => "return",
            Domain::Exchange => "exchange",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident, $domain:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = CommerceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(CommerceError::InvalidStatus {
                        domain: $domain,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum!(
    /// Fulfillment track of an order.
    OrderStatus, "order", {
        Pending => "PENDING",
        Confirmed => "CONFIRMED",
        Processing => "PROCESSING",
        Shipped => "SHIPPED",
        Delivered => "DELIVERED",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
);

impl OrderStatus {
    /// Orders cancelled in these states are settled (refunded/credited);
    /// once shipped, cancellation carries no automatic refund.
    pub fn is_pre_shipping(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Processing)
    }
}

status_enum!(
    /// Return track of an order.
    ReturnStatus, "return", {
        None => "NONE",
        Requested => "REQUESTED",
        Approved => "APPROVED",
        PickupScheduled => "PICKUP_SCHEDULED",
        PickupCompleted => "PICKUP_COMPLETED",
        RefundInitiated => "REFUND_INITIATED",
        RefundCompleted => "REFUND_COMPLETED",
        Rejected => "REJECTED",
    }
);

impl ReturnStatus {
    /// A return in an active status blocks a second request on the same order.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::None | Self::RefundCompleted | Self::Rejected)
    }
}

status_enum!(
    /// Exchange track of an order.
    ExchangeStatus, "exchange", {
        None => "NONE",
        Requested => "REQUESTED",
        Approved => "APPROVED",
        PickupScheduled => "PICKUP_SCHEDULED",
        PickupCompleted => "PICKUP_COMPLETED",
        ExchangeProcessing => "EXCHANGE_PROCESSING",
        ExchangeCompleted => "EXCHANGE_COMPLETED",
        Rejected => "REJECTED",
    }
);

impl ExchangeStatus {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::None | Self::ExchangeCompleted | Self::Rejected)
    }
}

status_enum!(
    /// Payment track, advanced synchronously at checkout verification and
    /// asynchronously by gateway webhooks.
    PaymentStatus, "payment", {
        Pending => "PENDING",
        Paid => "PAID",
        Failed => "FAILED",
        Refunded => "REFUNDED",
    }
);

status_enum!(
    PaymentMethod, "payment method", {
        Cod => "COD",
        Prepaid => "PREPAID",
    }
);

status_enum!(
    /// Refund bookkeeping; `!= NONE` guards settlement re-entry.
    RefundStatus, "refund", {
        None => "NONE",
        Initiated => "INITIATED",
        Completed => "COMPLETED",
    }
);

status_enum!(
    RefundMethod, "refund method", {
        OriginalSource => "ORIGINAL_SOURCE",
        Wallet => "WALLET",
    }
);
