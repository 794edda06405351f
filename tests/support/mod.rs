#![allow(dead_code)]

use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};

use storefront_api::api::auth::{generate_token, hash_password};
use storefront_api::db;
use storefront_api::models::{NewProduct, NewUser, ProductCategory, Role, Variant};
use storefront_api::pricing::PricingPolicy;
use storefront_api::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "secret123";

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Fresh database per test, serialized through a process-wide lock and a
/// Postgres advisory lock for parallel test binaries.
pub async fn init_test_db() -> TestDb {
    dotenvy::dotenv().ok();
    let test_url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let (admin_url, db_name) =
        split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url)
        .await
        .expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(737373)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    if let Err(e) = sqlx::query(&create_sql).execute(&admin_pool).await {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(737373)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url)
        .await
        .expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    TestDb { pool, _guard: guard }
}

/// Object storage is mocked; the client is never called.
pub fn build_state(pool: PgPool) -> AppState {
    let s3_config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .build();

    AppState {
        pool,
        s3_client: S3Client::from_conf(s3_config),
        s3_bucket: "test-bucket".to_string(),
        s3_public_base_url: "http://localhost/media".to_string(),
        mock_s3: true,
        jwt_secret: JWT_SECRET.to_string(),
        secure_cookies: false,
        pricing: PricingPolicy::default(),
        default_page_size: 12,
    }
}

/// Real S3 calls against an endpoint that refuses connections, so every
/// storage operation fails.
pub fn build_state_with_failing_storage(pool: PgPool) -> AppState {
    let s3_config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "tests"))
        .endpoint_url("http://127.0.0.1:1")
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .build();

    AppState {
        s3_client: S3Client::from_conf(s3_config),
        mock_s3: false,
        ..build_state(pool)
    }
}

pub async fn set_product_images(pool: &PgPool, id: i32, images: &[String]) {
    sqlx::query("UPDATE products SET images = $1, thumbnail = $2 WHERE id = $3")
        .bind(images)
        .bind(images.first().cloned().unwrap_or_default())
        .bind(id)
        .execute(pool)
        .await
        .expect("set images");
}

pub async fn create_user(pool: &PgPool, email: &str, role: Role) -> i32 {
    let user = db::insert_user(
        pool,
        &NewUser {
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).expect("hash"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
            email_verified: true,
        },
    )
    .await
    .expect("insert user");
    user.id
}

pub fn bearer(user_id: i32, email: &str, role: Role) -> (String, String) {
    let token = generate_token(JWT_SECRET, user_id, email, role).expect("token");
    ("Authorization".to_string(), format!("Bearer {token}"))
}

pub fn variant(color: &str, size: &str, stock: i32) -> Variant {
    Variant {
        color: color.to_string(),
        color_code: None,
        size: size.to_string(),
        sku: None,
        stock,
    }
}

pub async fn create_product(
    pool: &PgPool,
    slug: &str,
    category: ProductCategory,
    price: f64,
    discount_percentage: f64,
    variants: Vec<Variant>,
) -> i32 {
    db::insert_product(
        pool,
        &NewProduct {
            title: slug.replace('-', " "),
            slug: slug.to_string(),
            description: format!("{slug} description"),
            price,
            discount_percentage,
            brand: "Acme".to_string(),
            category,
            sub_category: None,
            tags: vec![],
            thumbnail: format!("http://localhost/media/test-bucket/products/{slug}/thumb.jpg"),
            images: vec![],
            variants,
            is_featured: false,
        },
    )
    .await
    .expect("insert product")
}
