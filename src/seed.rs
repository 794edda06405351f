// src/seed.rs
//
// Development data: two fixed accounts plus random users, a small clothing
// catalog, and a year of orders whose flags agree with their status.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use fake::faker::address::en::{BuildingNumber, CityName, CountryName, StreetName, ZipCode};
use fake::faker::name::en::{FirstName, LastName};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use crate::api::auth::hash_password;
use crate::errors::{AppError, AppResult};
use crate::models::{
    NewProduct, NewUser, OrderStatus, PaymentResult, Product, ProductCategory, Role,
    ShippingAddress, Variant,
};
use crate::pricing::{CartLine, CatalogPrice, PricedOrder, PricingPolicy};
use crate::validation::slugify;
use crate::db;

/// Relative weights; most seeded orders end up delivered.
pub const STATUS_WEIGHTS: [(OrderStatus, u32); 5] = [
    (OrderStatus::Pending, 10),
    (OrderStatus::Processing, 20),
    (OrderStatus::Shipped, 20),
    (OrderStatus::Delivered, 40),
    (OrderStatus::Cancelled, 10),
];

pub fn pick_status<R: Rng + ?Sized>(rng: &mut R) -> OrderStatus {
    let total: u32 = STATUS_WEIGHTS.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for (status, weight) in STATUS_WEIGHTS {
        if roll < weight {
            return status;
        }
        roll -= weight;
    }
    OrderStatus::Pending
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Paid an hour after creation once past Pending, delivered three days after.
pub fn status_flags(status: OrderStatus, created_at: DateTime<Utc>) -> StatusFlags {
    let paid = matches!(
        status,
        OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
    );
    let delivered = status == OrderStatus::Delivered;

    StatusFlags {
        is_paid: paid,
        paid_at: paid.then(|| created_at + Duration::hours(1)),
        is_delivered: delivered,
        delivered_at: delivered.then(|| created_at + Duration::days(3)),
    }
}

fn random_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

// ---------------------------------------------------------------------------
// users

pub fn fixed_accounts(password_hash: &str) -> Vec<NewUser> {
    vec![
        NewUser {
            email: "admin@example.com".into(),
            password_hash: password_hash.to_string(),
            first_name: "Admin".into(),
            last_name: "User".into(),
            role: Role::Admin,
            email_verified: true,
        },
        NewUser {
            email: "user@example.com".into(),
            password_hash: password_hash.to_string(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            role: Role::User,
            email_verified: true,
        },
    ]
}

/// The index keeps generated emails unique within one run.
pub fn random_account<R: Rng + ?Sized>(rng: &mut R, index: usize, password_hash: &str) -> NewUser {
    let first_name: String = FirstName().fake_with_rng(rng);
    let last_name: String = LastName().fake_with_rng(rng);
    let local: String = format!("{first_name}.{last_name}")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect::<String>()
        .to_lowercase();

    NewUser {
        email: format!("{local}{index}@example.com"),
        password_hash: password_hash.to_string(),
        first_name,
        last_name,
        role: Role::User,
        email_verified: rng.gen_bool(0.5),
    }
}

/// Hashes the password once for every account. Existing emails are skipped.
pub async fn seed_users<R: Rng + ?Sized>(
    pool: &PgPool,
    rng: &mut R,
    password: &str,
    count: usize,
) -> AppResult<u64> {
    let password_hash = hash_password(password)?;

    let mut accounts = fixed_accounts(&password_hash);
    accounts.extend((0..count).map(|i| random_account(rng, i, &password_hash)));

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO users (email, password_hash, first_name, last_name, role, email_verified) ",
    );
    qb.push_values(&accounts, |mut b, user| {
        b.push_bind(user.email.clone())
            .push_bind(user.password_hash.clone())
            .push_bind(user.first_name.clone())
            .push_bind(user.last_name.clone())
            .push_bind(user.role)
            .push_bind(user.email_verified);
    });
    qb.push(" ON CONFLICT (email) DO NOTHING");

    let inserted = qb.build().execute(pool).await?.rows_affected();
    log::info!("seeded {inserted} users ({} skipped as existing)", accounts.len() as u64 - inserted);
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// products

pub struct ProductSeed {
    pub title: &'static str,
    pub brand: &'static str,
    pub category: ProductCategory,
    pub sub_category: &'static str,
    pub price: f64,
    pub discount_percentage: f64,
    pub tags: &'static [&'static str],
    pub colors: &'static [(&'static str, &'static str)],
    pub sizes: &'static [&'static str],
    pub is_featured: bool,
}

pub const CATALOG: &[ProductSeed] = &[
    ProductSeed {
        title: "Classic Denim Jacket",
        brand: "Northwind",
        category: ProductCategory::Men,
        sub_category: "Jackets",
        price: 89.99,
        discount_percentage: 10.0,
        tags: &["denim", "outerwear", "casual"],
        colors: &[("Blue", "#1f3a93"), ("Black", "#000000")],
        sizes: &["S", "M", "L", "XL"],
        is_featured: true,
    },
    ProductSeed {
        title: "Slim Fit Oxford Shirt",
        brand: "Harbor & Co",
        category: ProductCategory::Men,
        sub_category: "Shirts",
        price: 45.0,
        discount_percentage: 0.0,
        tags: &["cotton", "office"],
        colors: &[("White", "#ffffff"), ("Blue", "#8ab4f8"), ("Red", "#c0392b")],
        sizes: &["S", "M", "L"],
        is_featured: false,
    },
    ProductSeed {
        title: "Everyday Chino Pants",
        brand: "Northwind",
        category: ProductCategory::Men,
        sub_category: "Pants",
        price: 59.5,
        discount_percentage: 20.0,
        tags: &["chino", "cotton"],
        colors: &[("Khaki", "#c3b091"), ("Navy", "#000080")],
        sizes: &["30", "32", "34", "36"],
        is_featured: false,
    },
    ProductSeed {
        title: "Floral Summer Dress",
        brand: "Lumen",
        category: ProductCategory::Women,
        sub_category: "Dresses",
        price: 74.0,
        discount_percentage: 15.0,
        tags: &["summer", "floral", "linen"],
        colors: &[("Red", "#e74c3c"), ("Yellow", "#f1c40f")],
        sizes: &["XS", "S", "M", "L"],
        is_featured: true,
    },
    ProductSeed {
        title: "High Rise Skinny Jeans",
        brand: "Lumen",
        category: ProductCategory::Women,
        sub_category: "Jeans",
        price: 68.0,
        discount_percentage: 0.0,
        tags: &["denim", "stretch"],
        colors: &[("Blue", "#2c3e50"), ("Black", "#000000")],
        sizes: &["24", "26", "28", "30"],
        is_featured: false,
    },
    ProductSeed {
        title: "Cashmere Blend Sweater",
        brand: "Harbor & Co",
        category: ProductCategory::Women,
        sub_category: "Knitwear",
        price: 120.0,
        discount_percentage: 25.0,
        tags: &["wool", "winter"],
        colors: &[("Beige", "#f5f5dc"), ("Grey", "#808080")],
        sizes: &["S", "M", "L"],
        is_featured: true,
    },
    ProductSeed {
        title: "Kids Graphic Tee",
        brand: "Sprout",
        category: ProductCategory::Kids,
        sub_category: "T-Shirts",
        price: 18.0,
        discount_percentage: 0.0,
        tags: &["cotton", "graphic"],
        colors: &[("Green", "#27ae60"), ("Red", "#e74c3c")],
        sizes: &["4Y", "6Y", "8Y", "10Y"],
        is_featured: false,
    },
    ProductSeed {
        title: "Kids Rain Jacket",
        brand: "Sprout",
        category: ProductCategory::Kids,
        sub_category: "Jackets",
        price: 42.0,
        discount_percentage: 5.0,
        tags: &["waterproof", "outerwear"],
        colors: &[("Yellow", "#f1c40f"), ("Blue", "#3498db")],
        sizes: &["4Y", "6Y", "8Y"],
        is_featured: false,
    },
    ProductSeed {
        title: "Canvas Low Top Sneakers",
        brand: "Stride",
        category: ProductCategory::Unisex,
        sub_category: "Shoes",
        price: 55.0,
        discount_percentage: 0.0,
        tags: &["sneakers", "canvas"],
        colors: &[("White", "#ffffff"), ("Black", "#000000"), ("Red", "#c0392b")],
        sizes: &["38", "40", "42", "44"],
        is_featured: true,
    },
    ProductSeed {
        title: "Merino Beanie",
        brand: "Stride",
        category: ProductCategory::Unisex,
        sub_category: "Accessories",
        price: 24.0,
        discount_percentage: 0.0,
        tags: &["wool", "winter", "hat"],
        colors: &[("Grey", "#808080"), ("Navy", "#000080")],
        sizes: &["One Size"],
        is_featured: false,
    },
];

pub fn catalog_product<R: Rng + ?Sized>(rng: &mut R, seed: &ProductSeed) -> NewProduct {
    let slug = slugify(seed.title);
    let prefix: String = slug
        .split('-')
        .filter_map(|part| part.chars().next())
        .collect::<String>()
        .to_uppercase();

    let variants = seed
        .colors
        .iter()
        .flat_map(|&(color, code)| seed.sizes.iter().map(move |&size| (color, code, size)))
        .map(|(color, code, size)| Variant {
            color: color.to_string(),
            color_code: Some(code.to_string()),
            size: size.to_string(),
            sku: Some(format!("{prefix}-{}-{}", color.to_uppercase(), size.to_uppercase())),
            stock: rng.gen_range(0..=25),
        })
        .collect();

    let thumbnail = format!("https://placehold.co/600x800?text={slug}");
    NewProduct {
        title: seed.title.to_string(),
        description: format!("{} by {}.", seed.title, seed.brand),
        price: seed.price,
        discount_percentage: seed.discount_percentage,
        brand: seed.brand.to_string(),
        category: seed.category,
        sub_category: Some(seed.sub_category.to_string()),
        tags: seed.tags.iter().map(|t| t.to_string()).collect(),
        images: vec![thumbnail.clone()],
        thumbnail,
        variants,
        is_featured: seed.is_featured,
        slug,
    }
}

/// Inserts the catalog products whose slug is still free.
pub async fn seed_products<R: Rng + ?Sized>(pool: &PgPool, rng: &mut R) -> AppResult<usize> {
    let mut inserted = 0;
    for seed in CATALOG {
        let product = catalog_product(rng, seed);
        if db::slug_exists(pool, &product.slug).await? {
            continue;
        }
        db::insert_product(pool, &product).await?;
        inserted += 1;
    }
    log::info!("seeded {inserted} products");
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// orders

#[derive(Debug, Clone)]
pub struct SeedCustomer {
    pub id: i32,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct SeedOrder {
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub flags: StatusFlags,
    pub shipping: ShippingAddress,
    pub payment_method: String,
    pub payment_result: Option<PaymentResult>,
    pub priced: PricedOrder,
}

pub fn price_index(products: &[Product]) -> HashMap<String, CatalogPrice> {
    products
        .iter()
        .map(|p| {
            (
                p.slug.clone(),
                CatalogPrice {
                    product_id: p.id,
                    title: p.title.clone(),
                    thumbnail: p.thumbnail.clone(),
                    unit_price: p.price,
                },
            )
        })
        .collect()
}

fn random_address<R: Rng + ?Sized>(rng: &mut R) -> ShippingAddress {
    let number: String = BuildingNumber().fake_with_rng(rng);
    let street: String = StreetName().fake_with_rng(rng);
    ShippingAddress {
        address: format!("{number} {street}"),
        city: CityName().fake_with_rng(rng),
        postal_code: ZipCode().fake_with_rng(rng),
        country: CountryName().fake_with_rng(rng),
        phone_number: PhoneNumber().fake_with_rng(rng),
    }
}

/// One to four lines of one to three units, priced like a checkout.
pub fn generate_order<R: Rng + ?Sized>(
    rng: &mut R,
    customers: &[SeedCustomer],
    products: &[Product],
    prices: &HashMap<String, CatalogPrice>,
    policy: &PricingPolicy,
    now: DateTime<Utc>,
) -> AppResult<SeedOrder> {
    let customer = customers
        .choose(rng)
        .ok_or_else(|| AppError::validation("Seed users before orders"))?;

    let line_count = rng.gen_range(1..=4);
    let mut lines = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        let product = products
            .choose(rng)
            .ok_or_else(|| AppError::validation("Seed products before orders"))?;
        let (size, color, sku) = match product.variants.choose(rng) {
            Some(v) => (v.size.clone(), v.color.clone(), v.sku.clone()),
            None => ("OS".to_string(), "Default".to_string(), None),
        };
        lines.push(CartLine {
            product: product.slug.clone(),
            qty: rng.gen_range(1..=3),
            size,
            color,
            sku: sku.or_else(|| Some(random_code(rng, 8))),
            name: None,
            image: None,
            price: None,
        });
    }
    let priced = policy.price_cart(&lines, prices)?;

    let status = pick_status(rng);
    let created_at = now - Duration::seconds(rng.gen_range(0..365 * 24 * 3600));
    let flags = status_flags(status, created_at);
    let payment_result = flags.paid_at.map(|paid_at| PaymentResult {
        id: Some(random_code(rng, 10)),
        status: Some("COMPLETED".to_string()),
        update_time: Some(paid_at.to_rfc3339()),
        email_address: Some(customer.email.clone()),
    });

    Ok(SeedOrder {
        user_id: customer.id,
        created_at,
        status,
        flags,
        shipping: random_address(rng),
        payment_method: "Stripe".to_string(),
        payment_result,
        priced,
    })
}

async fn insert_seed_order(
    tx: &mut Transaction<'_, Postgres>,
    order: &SeedOrder,
) -> Result<i32, sqlx::Error> {
    let totals = &order.priced.totals;
    let id: i32 = sqlx::query(
        r#"INSERT INTO orders
           (user_id, shipping_address, shipping_city, shipping_postal_code, shipping_country,
            shipping_phone_number, payment_method, payment_result, items_price, tax_price,
            shipping_price, total_price, is_paid, paid_at, is_delivered, delivered_at, status,
            created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
           RETURNING id"#,
    )
    .bind(order.user_id)
    .bind(&order.shipping.address)
    .bind(&order.shipping.city)
    .bind(&order.shipping.postal_code)
    .bind(&order.shipping.country)
    .bind(&order.shipping.phone_number)
    .bind(&order.payment_method)
    .bind(order.payment_result.as_ref().map(Json))
    .bind(totals.items_price)
    .bind(totals.tax_price)
    .bind(totals.shipping_price)
    .bind(totals.total_price)
    .bind(order.flags.is_paid)
    .bind(order.flags.paid_at)
    .bind(order.flags.is_delivered)
    .bind(order.flags.delivered_at)
    .bind(order.status)
    .bind(order.created_at)
    .fetch_one(&mut **tx)
    .await?
    .get("id");

    db::insert_order_items(tx, id, &order.priced.items).await?;
    Ok(id)
}

/// Replaces every order with `count` generated ones.
pub async fn seed_orders<R: Rng + ?Sized>(
    pool: &PgPool,
    rng: &mut R,
    policy: &PricingPolicy,
    count: usize,
) -> AppResult<usize> {
    let customers: Vec<SeedCustomer> =
        sqlx::query("SELECT id, email FROM users WHERE is_active = TRUE ORDER BY id")
            .fetch_all(pool)
            .await?
            .iter()
            .map(|r| SeedCustomer {
                id: r.get("id"),
                email: r.get("email"),
            })
            .collect();
    let products = db::list_active_products(pool).await?;
    if customers.is_empty() || products.is_empty() {
        return Err(AppError::validation(
            "Seed users and products before seeding orders",
        ));
    }
    log::info!(
        "found {} users and {} products, generating {count} orders",
        customers.len(),
        products.len()
    );

    let prices = price_index(&products);
    let now = Utc::now();
    let orders = (0..count)
        .map(|_| generate_order(rng, &customers, &products, &prices, policy, now))
        .collect::<AppResult<Vec<_>>>()?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM orders").execute(&mut *tx).await?;
    for order in &orders {
        insert_seed_order(&mut tx, order).await?;
    }
    tx.commit().await?;

    log::info!("seeded {} orders", orders.len());
    Ok(orders.len())
}
