pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod pricing;
pub mod s3_utils;
pub mod seed;
pub mod validation;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::pricing::PricingPolicy;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub s3_client: S3Client,
    pub s3_bucket: String,
    pub s3_public_base_url: String,
    /// Skip object storage calls; image URLs are still generated.
    pub mock_s3: bool,
    pub jwt_secret: String,
    pub secure_cookies: bool,
    pub pricing: PricingPolicy,
    pub default_page_size: i64,
}

impl AppState {
    pub fn new(config: &AppConfig, pool: PgPool, s3_client: S3Client) -> Self {
        Self {
            pool,
            s3_client,
            s3_bucket: config.s3_bucket.clone(),
            s3_public_base_url: config.s3_public_base_url.clone(),
            mock_s3: config.mock_s3,
            jwt_secret: config.jwt_secret.clone(),
            secure_cookies: config.production,
            pricing: config.pricing,
            default_page_size: config.default_page_size,
        }
    }
}
