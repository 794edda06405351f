// src/s3_utils.rs
//
// Product image storage on S3-compatible buckets.

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::AppState;

pub const IMAGE_PREFIX: &str = "products/";

/// Client from the default AWS chain; a custom endpoint (MinIO, R2, ...)
/// switches to path-style addressing.
pub async fn build_client(config: &AppConfig) -> S3Client {
    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

    if let Some(endpoint) = &config.s3_endpoint {
        s3_config_builder = s3_config_builder
            .endpoint_url(endpoint)
            .force_path_style(true);
    }

    S3Client::from_conf(s3_config_builder.build())
}

pub fn build_public_url(base: &str, bucket: &str, key: &str) -> String {
    let trimmed = base.trim_end_matches('/');

    // Allow simple templating: https://host/{bucket}/{key} or https://bucket.host/{key}
    if trimmed.contains("{bucket}") || trimmed.contains("{key}") {
        return trimmed.replace("{bucket}", bucket).replace("{key}", key);
    }

    if trimmed.contains(bucket) {
        format!("{}/{}", trimmed, key)
    } else {
        format!("{}/{}/{}", trimmed, bucket, key)
    }
}

/// `products/{slug}/{uuid}.{ext}`; the extension comes from the upload name.
pub fn product_image_key(slug: &str, filename: &str) -> String {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("{IMAGE_PREFIX}{slug}/{}.{ext}", Uuid::new_v4())
}

/// Object key of an image URL produced by `build_public_url`.
pub fn object_key(url: &str) -> Option<&str> {
    url.find(IMAGE_PREFIX).map(|idx| &url[idx..])
}

/// Last path segment, the name clients use to address a single image.
pub fn image_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("avif") => "image/avif",
        _ => "image/jpeg",
    }
}

/// Stores the bytes and returns the public URL.
pub async fn put_image(state: &AppState, key: &str, bytes: Vec<u8>) -> Result<String, AppError> {
    if !state.mock_s3 {
        state
            .s3_client
            .put_object()
            .bucket(&state.s3_bucket)
            .key(key)
            .content_type(content_type_for(key))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("S3 put_object failed: {e}")))?;
    }
    Ok(build_public_url(&state.s3_public_base_url, &state.s3_bucket, key))
}

pub async fn delete_image(state: &AppState, url: &str) -> Result<(), AppError> {
    let Some(key) = object_key(url) else {
        log::warn!("image url outside the product prefix, not deleting: {url}");
        return Ok(());
    };
    if state.mock_s3 {
        return Ok(());
    }
    state
        .s3_client
        .delete_object()
        .bucket(&state.s3_bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("S3 delete_object failed: {e}")))?;
    Ok(())
}
