//! Velour Commerce back office
//!
//! Order post-purchase lifecycle service: fulfillment transitions, returns
//! and exchanges, conditional refund settlement, and payment-gateway webhook
//! reconciliation.
//!
//! The persisted order record is the single source of truth; the pure
//! [`domain`] core decides what a transition means, [`service`] orchestrates
//! settlement and the guarded commit, and [`store`] owns persistence.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod service;
pub mod store;
pub mod webhook;

pub use error::{CommerceError, Result};
