//! Environment configuration, collected once at startup.

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_webhook_secret: String,
    pub razorpay_base_url: String,
    pub default_return_window_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8083".to_string())
                .parse()
                .context("PORT must be a number")?,
            razorpay_key_id: std::env::var("RAZORPAY_KEY_ID")
                .context("RAZORPAY_KEY_ID is required")?,
            razorpay_key_secret: std::env::var("RAZORPAY_KEY_SECRET")
                .context("RAZORPAY_KEY_SECRET is required")?,
            razorpay_webhook_secret: std::env::var("RAZORPAY_WEBHOOK_SECRET")
                .context("RAZORPAY_WEBHOOK_SECRET is required")?,
            razorpay_base_url: std::env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            default_return_window_days: std::env::var("RETURN_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
        })
    }
}
