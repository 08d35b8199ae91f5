//! Read-side projection of an order's lifecycle into an ordered step list.
//!
//! Presentation derivative only; never consulted for transition decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::order::Order;
use crate::domain::status::{Domain, ExchangeStatus, OrderStatus, ReturnStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Completed,
    Current,
    Pending,
}

#[derive(Clone, Debug, Serialize)]
pub struct TimelineStep {
    pub status: &'static str,
    pub title: &'static str,
    pub scope: Domain,
    pub state: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

const FULFILLMENT_SEQ: &[(OrderStatus, &str)] = &[
    (OrderStatus::Pending, "Order Placed"),
    (OrderStatus::Confirmed, "Order Confirmed"),
    (OrderStatus::Processing, "Processing"),
    (OrderStatus::Shipped, "Shipped"),
    (OrderStatus::Delivered, "Delivered"),
    (OrderStatus::Completed, "Completed"),
];

const RETURN_SEQ: &[(ReturnStatus, &str)] = &[
    (ReturnStatus::Requested, "Return Requested"),
    (ReturnStatus::Approved, "Return Approved"),
    (ReturnStatus::PickupScheduled, "Pickup Scheduled"),
    (ReturnStatus::PickupCompleted, "Pickup Completed"),
    (ReturnStatus::RefundInitiated, "Refund Initiated"),
    (ReturnStatus::RefundCompleted, "Refund Completed"),
];

const EXCHANGE_SEQ: &[(ExchangeStatus, &str)] = &[
    (ExchangeStatus::Requested, "Exchange Requested"),
    (ExchangeStatus::Approved, "Exchange Approved"),
    (ExchangeStatus::PickupScheduled, "Pickup Scheduled"),
    (ExchangeStatus::PickupCompleted, "Pickup Completed"),
    (ExchangeStatus::ExchangeProcessing, "Replacement Processing"),
    (ExchangeStatus::ExchangeCompleted, "Exchange Completed"),
];

fn mark(position: usize, current: Option<usize>) -> StepState {
    match current {
        Some(cur) if position < cur => StepState::Completed,
        Some(cur) if position == cur => StepState::Current,
        _ => StepState::Pending,
    }
}

fn fulfillment_timestamp(order: &Order, status: OrderStatus) -> Option<DateTime<Utc>> {
    match status {
        OrderStatus::Pending => Some(order.created_at),
        OrderStatus::Shipped => order.shipped_at,
        OrderStatus::Delivered => order.delivered_at,
        OrderStatus::Completed => order.completed_at,
        _ => None,
    }
}

/// Project the order into its human-facing timeline: the fulfillment sequence,
/// followed by the active return or exchange sequence when one is in progress.
/// A cancelled order collapses to placed + cancelled regardless of the other
/// tracks.
pub fn project(order: &Order) -> Vec<TimelineStep> {
    if order.status == OrderStatus::Cancelled {
        return vec![
            TimelineStep {
                status: OrderStatus::Pending.as_str(),
                title: "Order Placed",
                scope: Domain::Fulfillment,
                state: StepState::Completed,
                timestamp: Some(order.created_at),
            },
            TimelineStep {
                status: OrderStatus::Cancelled.as_str(),
                title: "Cancelled",
                scope: Domain::Fulfillment,
                state: StepState::Current,
                timestamp: order.cancelled_at,
            },
        ];
    }

    let cur = FULFILLMENT_SEQ.iter().position(|(s, _)| *s == order.status);
    let mut steps: Vec<TimelineStep> = FULFILLMENT_SEQ
        .iter()
        .enumerate()
        // COMPLETED only shows once reached; the track usually ends at DELIVERED.
        .filter(|(_, (s, _))| *s != OrderStatus::Completed || order.status == OrderStatus::Completed)
        .map(|(i, &(s, title))| TimelineStep {
            status: s.as_str(),
            title,
            scope: Domain::Fulfillment,
            state: mark(i, cur),
            timestamp: fulfillment_timestamp(order, s),
        })
        .collect();

    if order.return_status != ReturnStatus::None {
        if order.return_status == ReturnStatus::Rejected {
            steps.push(TimelineStep {
                status: ReturnStatus::Rejected.as_str(),
                title: "Return Rejected",
                scope: Domain::Return,
                state: StepState::Current,
                timestamp: None,
            });
        } else {
            let cur = RETURN_SEQ.iter().position(|(s, _)| *s == order.return_status);
            steps.extend(RETURN_SEQ.iter().enumerate().map(|(i, &(s, title))| {
                TimelineStep {
                    status: s.as_str(),
                    title,
                    scope: Domain::Return,
                    state: mark(i, cur),
                    timestamp: None,
                }
            }));
        }
    } else if order.exchange_status != ExchangeStatus::None {
        if order.exchange_status == ExchangeStatus::Rejected {
            steps.push(TimelineStep {
                status: ExchangeStatus::Rejected.as_str(),
                title: "Exchange Rejected",
                scope: Domain::Exchange,
                state: StepState::Current,
                timestamp: None,
            });
        } else {
            let cur = EXCHANGE_SEQ
                .iter()
                .position(|(s, _)| *s == order.exchange_status);
            steps.extend(EXCHANGE_SEQ.iter().enumerate().map(|(i, &(s, title))| {
                TimelineStep {
                    status: s.as_str(),
                    title,
                    scope: Domain::Exchange,
                    state: mark(i, cur),
                    timestamp: None,
                }
            }));
        }
    }

    steps
}
