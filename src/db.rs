// src/db.rs

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use crate::catalog::ListingRequest;
use crate::models::{
    NewProduct, NewUser, Order, OrderItem, OrderStatus, PaymentResult, Product,
    ProductCategory, ProductMetadata, ProductUpdate, ShippingAddress, User, UserSummary,
    UserUpdate, Variant,
};
use crate::pricing::{CatalogPrice, PricedOrder};

const PRODUCT_COLUMNS: &str = "p.id, p.title, p.slug, p.description, p.price, p.discount_percentage, \
     p.brand, p.category, p.sub_category, p.tags, p.thumbnail, p.images, p.rating, p.num_reviews, \
     p.is_featured, p.is_active, p.created_at, p.updated_at";

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, email_verified, \
     is_active, password_reset_token, password_reset_expires, created_at, updated_at";

const ORDER_SELECT: &str = r#"SELECT o.id, o.user_id, u.first_name, u.last_name, u.email,
          o.shipping_address, o.shipping_city, o.shipping_postal_code, o.shipping_country,
          o.shipping_phone_number, o.payment_method, o.payment_result,
          o.items_price, o.tax_price, o.shipping_price, o.total_price,
          o.is_paid, o.paid_at, o.is_delivered, o.delivered_at, o.status,
          o.tracking_number, o.courier_name, o.created_at, o.updated_at
   FROM orders o
   JOIN users u ON u.id = o.user_id"#;

// ---------------------------------------------------------------------------
// products

fn product_from_row(r: &PgRow) -> Product {
    Product {
        id: r.get("id"),
        title: r.get("title"),
        slug: r.get("slug"),
        description: r.get("description"),
        price: r.get("price"),
        discount_percentage: r.get("discount_percentage"),
        brand: r.get("brand"),
        category: r.get("category"),
        sub_category: r.get("sub_category"),
        tags: r.get("tags"),
        thumbnail: r.get("thumbnail"),
        images: r.get("images"),
        variants: Vec::new(),
        rating: r.get("rating"),
        num_reviews: r.get("num_reviews"),
        is_featured: r.get("is_featured"),
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

async fn attach_variants(pool: &PgPool, products: &mut [Product]) -> Result<(), sqlx::Error> {
    if products.is_empty() {
        return Ok(());
    }
    let ids: Vec<i32> = products.iter().map(|p| p.id).collect();

    let rows = sqlx::query(
        r#"SELECT product_id, color, color_code, size, sku, stock
           FROM product_variants
           WHERE product_id = ANY($1)
           ORDER BY product_id, position, id"#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_product: HashMap<i32, Vec<Variant>> = HashMap::new();
    for r in rows {
        by_product.entry(r.get("product_id")).or_default().push(Variant {
            color: r.get("color"),
            color_code: r.get("color_code"),
            size: r.get("size"),
            sku: r.get("sku"),
            stock: r.get("stock"),
        });
    }
    for product in products.iter_mut() {
        product.variants = by_product.remove(&product.id).unwrap_or_default();
    }
    Ok(())
}

async fn insert_variants(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i32,
    variants: &[Variant],
) -> Result<(), sqlx::Error> {
    if variants.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO product_variants (product_id, position, color, color_code, size, sku, stock) ",
    );
    qb.push_values(variants.iter().enumerate(), |mut b, (position, v)| {
        b.push_bind(product_id)
            .push_bind(position as i32)
            .push_bind(v.color.clone())
            .push_bind(v.color_code.clone())
            .push_bind(v.size.clone())
            .push_bind(v.sku.clone())
            .push_bind(v.stock);
    });
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

/// One page of active products matching the filter, plus the total match count.
pub async fn list_products(
    pool: &PgPool,
    req: &ListingRequest,
) -> Result<(Vec<Product>, i64), sqlx::Error> {
    let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM products p");
    req.filter.push_where(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p"));
    req.filter.push_where(&mut qb);
    req.sort.push_order_by(&mut qb);
    qb.push(" LIMIT ");
    qb.push_bind(req.page.limit);
    qb.push(" OFFSET ");
    qb.push_bind(req.page.skip());

    let rows = qb.build().fetch_all(pool).await?;
    let mut products: Vec<Product> = rows.iter().map(product_from_row).collect();
    attach_variants(pool, &mut products).await?;

    Ok((products, total))
}

pub async fn list_active_products(pool: &PgPool) -> Result<Vec<Product>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.is_active = TRUE ORDER BY p.id"
    ))
    .fetch_all(pool)
    .await?;

    let mut products: Vec<Product> = rows.iter().map(product_from_row).collect();
    attach_variants(pool, &mut products).await?;
    Ok(products)
}

pub async fn get_product_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Product>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1 AND p.is_active = TRUE"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    with_variants(pool, row.as_ref().map(product_from_row)).await
}

/// Includes soft-deleted products; used by admin operations.
pub async fn get_product_by_id(pool: &PgPool, id: i32) -> Result<Option<Product>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    with_variants(pool, row.as_ref().map(product_from_row)).await
}

async fn with_variants(
    pool: &PgPool,
    product: Option<Product>,
) -> Result<Option<Product>, sqlx::Error> {
    match product {
        Some(p) => {
            let mut one = [p];
            attach_variants(pool, &mut one).await?;
            let [p] = one;
            Ok(Some(p))
        }
        None => Ok(None),
    }
}

pub async fn insert_product(pool: &PgPool, product: &NewProduct) -> Result<i32, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let id: i32 = sqlx::query(
        r#"INSERT INTO products
           (title, slug, description, price, discount_percentage, brand, category, sub_category,
            tags, thumbnail, images, is_featured)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
           RETURNING id"#,
    )
    .bind(&product.title)
    .bind(&product.slug)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.discount_percentage)
    .bind(&product.brand)
    .bind(product.category)
    .bind(product.sub_category.as_deref())
    .bind(&product.tags)
    .bind(&product.thumbnail)
    .bind(&product.images)
    .bind(product.is_featured)
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    insert_variants(&mut tx, id, &product.variants).await?;
    tx.commit().await?;

    Ok(id)
}

/// Returns `false` when no product has this id.
pub async fn update_product(
    pool: &PgPool,
    id: i32,
    changes: &ProductUpdate,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"UPDATE products SET
               title = COALESCE($2, title),
               slug = COALESCE($3, slug),
               description = COALESCE($4, description),
               price = COALESCE($5, price),
               discount_percentage = COALESCE($6, discount_percentage),
               brand = COALESCE($7, brand),
               category = COALESCE($8, category),
               sub_category = COALESCE($9, sub_category),
               tags = COALESCE($10, tags),
               thumbnail = COALESCE($11, thumbnail),
               is_featured = COALESCE($12, is_featured),
               is_active = COALESCE($13, is_active),
               updated_at = NOW()
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(changes.title.as_deref())
    .bind(changes.slug.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.price)
    .bind(changes.discount_percentage)
    .bind(changes.brand.as_deref())
    .bind(changes.category)
    .bind(changes.sub_category.as_deref())
    .bind(changes.tags.as_ref())
    .bind(changes.thumbnail.as_deref())
    .bind(changes.is_featured)
    .bind(changes.is_active)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    if let Some(variants) = &changes.variants {
        sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_variants(&mut tx, id, variants).await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Counts soft-deleted products too; slugs stay reserved.
pub async fn slug_exists(pool: &PgPool, slug: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE slug = $1)")
        .bind(slug)
        .fetch_one(pool)
        .await
}

pub async fn soft_delete_product(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_product_images(
    pool: &PgPool,
    id: i32,
    images: &[String],
    thumbnail: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET images = $2, thumbnail = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(images)
    .bind(thumbnail)
    .execute(pool)
    .await?;

    Ok(())
}

/// Distinct filter values over active products.
pub async fn product_metadata(pool: &PgPool) -> Result<ProductMetadata, sqlx::Error> {
    let categories: Vec<ProductCategory> = sqlx::query_scalar(
        "SELECT DISTINCT category FROM products WHERE is_active = TRUE ORDER BY category",
    )
    .fetch_all(pool)
    .await?;

    let sub_categories: Vec<String> = sqlx::query_scalar(
        r#"SELECT DISTINCT sub_category FROM products
           WHERE is_active = TRUE AND sub_category IS NOT NULL
           ORDER BY sub_category"#,
    )
    .fetch_all(pool)
    .await?;

    let brands: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT brand FROM products WHERE is_active = TRUE ORDER BY brand",
    )
    .fetch_all(pool)
    .await?;

    let colors: Vec<String> = sqlx::query_scalar(
        r#"SELECT DISTINCT v.color FROM product_variants v
           JOIN products p ON p.id = v.product_id
           WHERE p.is_active = TRUE
           ORDER BY v.color"#,
    )
    .fetch_all(pool)
    .await?;

    let sizes: Vec<String> = sqlx::query_scalar(
        r#"SELECT DISTINCT v.size FROM product_variants v
           JOIN products p ON p.id = v.product_id
           WHERE p.is_active = TRUE
           ORDER BY v.size"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ProductMetadata {
        categories,
        sub_categories,
        brands,
        colors,
        sizes,
    })
}

/// Current prices of the referenced active products, keyed by slug.
pub async fn catalog_prices(
    pool: &PgPool,
    slugs: &[String],
) -> Result<HashMap<String, CatalogPrice>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, slug, title, thumbnail, price
           FROM products
           WHERE slug = ANY($1) AND is_active = TRUE"#,
    )
    .bind(slugs)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let slug: String = r.get("slug");
            (
                slug,
                CatalogPrice {
                    product_id: r.get("id"),
                    title: r.get("title"),
                    thumbnail: r.get("thumbnail"),
                    unit_price: r.get("price"),
                },
            )
        })
        .collect())
}

// ---------------------------------------------------------------------------
// users

fn user_from_row(r: &PgRow) -> User {
    User {
        id: r.get("id"),
        email: r.get("email"),
        password_hash: r.get("password_hash"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        role: r.get("role"),
        email_verified: r.get("email_verified"),
        is_active: r.get("is_active"),
        password_reset_token: r.get("password_reset_token"),
        password_reset_expires: r.get("password_reset_expires"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

pub async fn insert_user(pool: &PgPool, user: &NewUser) -> Result<User, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO users (email, password_hash, first_name, last_name, role, email_verified)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING {USER_COLUMNS}"#
    ))
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.role)
    .bind(user.email_verified)
    .fetch_one(pool)
    .await?;

    Ok(user_from_row(&row))
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn get_user(pool: &PgPool, id: i32) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(user_from_row).collect())
}

pub async fn update_user(
    pool: &PgPool,
    id: i32,
    changes: &UserUpdate,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"UPDATE users SET
               email = COALESCE($2, email),
               password_hash = COALESCE($3, password_hash),
               first_name = COALESCE($4, first_name),
               last_name = COALESCE($5, last_name),
               role = COALESCE($6, role),
               email_verified = COALESCE($7, email_verified),
               is_active = COALESCE($8, is_active),
               updated_at = NOW()
           WHERE id = $1
           RETURNING {USER_COLUMNS}"#
    ))
    .bind(id)
    .bind(changes.email.as_deref())
    .bind(changes.password_hash.as_deref())
    .bind(changes.first_name.as_deref())
    .bind(changes.last_name.as_deref())
    .bind(changes.role)
    .bind(changes.email_verified)
    .bind(changes.is_active)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

// ---------------------------------------------------------------------------
// orders

fn order_from_row(r: &PgRow) -> Order {
    let payment_result: Option<Json<PaymentResult>> = r.get("payment_result");
    Order {
        id: r.get("id"),
        user: UserSummary {
            id: r.get("user_id"),
            first_name: r.get("first_name"),
            last_name: r.get("last_name"),
            email: r.get("email"),
        },
        order_items: Vec::new(),
        shipping_address: ShippingAddress {
            address: r.get("shipping_address"),
            city: r.get("shipping_city"),
            postal_code: r.get("shipping_postal_code"),
            country: r.get("shipping_country"),
            phone_number: r.get("shipping_phone_number"),
        },
        payment_method: r.get("payment_method"),
        payment_result: payment_result.map(|j| j.0),
        items_price: r.get("items_price"),
        tax_price: r.get("tax_price"),
        shipping_price: r.get("shipping_price"),
        total_price: r.get("total_price"),
        is_paid: r.get("is_paid"),
        paid_at: r.get("paid_at"),
        is_delivered: r.get("is_delivered"),
        delivered_at: r.get("delivered_at"),
        status: r.get("status"),
        tracking_number: r.get("tracking_number"),
        courier_name: r.get("courier_name"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

async fn attach_items(pool: &PgPool, orders: &mut [Order]) -> Result<(), sqlx::Error> {
    if orders.is_empty() {
        return Ok(());
    }
    let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();

    let rows = sqlx::query(
        r#"SELECT order_id, product_id, name, qty, image, price, size, color, sku
           FROM order_items
           WHERE order_id = ANY($1)
           ORDER BY order_id, id"#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_order: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for r in rows {
        by_order.entry(r.get("order_id")).or_default().push(OrderItem {
            name: r.get("name"),
            qty: r.get("qty"),
            image: r.get("image"),
            price: r.get("price"),
            size: r.get("size"),
            color: r.get("color"),
            sku: r.get("sku"),
            product: r.get("product_id"),
        });
    }
    for order in orders.iter_mut() {
        order.order_items = by_order.remove(&order.id).unwrap_or_default();
    }
    Ok(())
}

/// Stores the order and its item snapshots in one transaction.
pub async fn insert_order(
    pool: &PgPool,
    user_id: i32,
    priced: &PricedOrder,
    shipping: &ShippingAddress,
    payment_method: &str,
) -> Result<i32, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let order_id: i32 = sqlx::query(
        r#"INSERT INTO orders
           (user_id, shipping_address, shipping_city, shipping_postal_code, shipping_country,
            shipping_phone_number, payment_method, items_price, tax_price, shipping_price, total_price)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(&shipping.address)
    .bind(&shipping.city)
    .bind(&shipping.postal_code)
    .bind(&shipping.country)
    .bind(&shipping.phone_number)
    .bind(payment_method)
    .bind(priced.totals.items_price)
    .bind(priced.totals.tax_price)
    .bind(priced.totals.shipping_price)
    .bind(priced.totals.total_price)
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    insert_order_items(&mut tx, order_id, &priced.items).await?;
    tx.commit().await?;

    Ok(order_id)
}

pub(crate) async fn insert_order_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: i32,
    items: &[OrderItem],
) -> Result<(), sqlx::Error> {
    if items.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO order_items (order_id, product_id, name, qty, image, price, size, color, sku) ",
    );
    qb.push_values(items, |mut b, item| {
        b.push_bind(order_id)
            .push_bind(item.product)
            .push_bind(item.name.clone())
            .push_bind(item.qty)
            .push_bind(item.image.clone())
            .push_bind(item.price)
            .push_bind(item.size.clone())
            .push_bind(item.color.clone())
            .push_bind(item.sku.clone());
    });
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

pub async fn get_order(pool: &PgPool, id: i32) -> Result<Option<Order>, sqlx::Error> {
    let row = sqlx::query(&format!("{ORDER_SELECT} WHERE o.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut one = [order_from_row(&row)];
    attach_items(pool, &mut one).await?;
    let [order] = one;
    Ok(Some(order))
}

pub async fn list_orders(pool: &PgPool) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query(&format!("{ORDER_SELECT} ORDER BY o.created_at DESC, o.id DESC"))
        .fetch_all(pool)
        .await?;

    let mut orders: Vec<Order> = rows.iter().map(order_from_row).collect();
    attach_items(pool, &mut orders).await?;
    Ok(orders)
}

pub async fn list_user_orders(pool: &PgPool, user_id: i32) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "{ORDER_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut orders: Vec<Order> = rows.iter().map(order_from_row).collect();
    attach_items(pool, &mut orders).await?;
    Ok(orders)
}

/// Keeps the first `paid_at` when payment is recorded again.
pub async fn mark_order_paid(
    pool: &PgPool,
    id: i32,
    status: OrderStatus,
    payment: &PaymentResult,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE orders SET
               is_paid = TRUE,
               paid_at = COALESCE(paid_at, NOW()),
               payment_result = $2,
               status = $3,
               updated_at = NOW()
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(Json(payment))
    .bind(status)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_order_delivered(
    pool: &PgPool,
    id: i32,
    tracking_number: Option<&str>,
    courier_name: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE orders SET
               is_delivered = TRUE,
               delivered_at = COALESCE(delivered_at, NOW()),
               status = 'Delivered',
               tracking_number = COALESCE($2, tracking_number),
               courier_name = COALESCE($3, courier_name),
               updated_at = NOW()
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(tracking_number)
    .bind(courier_name)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_order_status(
    pool: &PgPool,
    id: i32,
    status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;

    Ok(())
}
