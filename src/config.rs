// src/config.rs
//
// Runtime configuration, read from the environment (.env is loaded by main).

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::pricing::PricingPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub s3_public_base_url: String,
    pub mock_s3: bool,
    pub pricing: PricingPolicy,
    pub default_page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let production = env::var("APP_ENV").map(|v| v == "production").unwrap_or(false);
        let s3_bucket = optional("S3_BUCKET").unwrap_or_else(|| "storefront-media".to_string());
        let s3_public_base_url = optional("S3_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", s3_bucket));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: optional("HOST")
                .unwrap_or_else(|| if production { "0.0.0.0" } else { "127.0.0.1" }.to_string()),
            port: parsed("PORT", 3000)?,
            production,
            s3_bucket,
            s3_endpoint: optional("S3_ENDPOINT"),
            s3_public_base_url,
            mock_s3: parsed("MOCK_S3", false)?,
            pricing: pricing_from_env()?,
            default_page_size: parsed("DEFAULT_PAGE_SIZE", crate::catalog::DEFAULT_LIMIT)?,
        })
    }
}

/// Settings of the `seed` binary. It never talks to S3 or issues tokens, so
/// `JWT_SECRET` is not required here.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub database_url: String,
    pub password: String,
    pub users: usize,
    pub orders: usize,
    pub pricing: PricingPolicy,
}

impl SeedConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            password: optional("SEED_PASSWORD").unwrap_or_else(|| "123456".to_string()),
            users: parsed("SEED_USERS", 20)?,
            orders: parsed("SEED_ORDERS", 50)?,
            pricing: pricing_from_env()?,
        })
    }
}

fn pricing_from_env() -> Result<PricingPolicy, ConfigError> {
    let defaults = PricingPolicy::default();
    Ok(PricingPolicy {
        tax_rate: parsed("TAX_RATE", defaults.tax_rate)?,
        shipping_fee: parsed("SHIPPING_FEE", defaults.shipping_fee)?,
        free_shipping_threshold: parsed(
            "FREE_SHIPPING_THRESHOLD",
            defaults.free_shipping_threshold,
        )?,
    })
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
