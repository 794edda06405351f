// src/api/products.rs

use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::auth::{require_role, Principal};
use crate::api::ApiResponse;
use crate::catalog::{ListingRequest, ProductListQuery};
use crate::errors::{AppError, AppResult};
use crate::models::{NewProduct, ProductCategory, ProductUpdate, ProductView, Role, Variant};
use crate::s3_utils::{delete_image, image_name, product_image_key, put_image};
use crate::validation::{required, slugify, validate_discount, validate_price};
use crate::{db, AppState};

pub const MAX_IMAGES: usize = 5;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[utoipa::path(
    get,
    path = "/products",
    params(ProductListQuery),
    responses((status = 200, description = "One page of active products", body = [ProductView])),
    tag = "products"
)]
#[get("/products")]
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<Vec<(String, String)>>,
) -> AppResult<HttpResponse> {
    let query = ProductListQuery::from_pairs(query.into_inner());
    let listing = ListingRequest::from_query(&query, state.default_page_size);
    let (products, total) = db::list_products(&state.pool, &listing).await?;

    let meta = listing.page.meta(products.len(), total);
    let views: Vec<ProductView> = products.into_iter().map(ProductView::from).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::paged(views, meta)))
}

#[utoipa::path(
    get,
    path = "/products/metadata",
    responses((status = 200, description = "Distinct filter values", body = crate::models::ProductMetadata)),
    tag = "products"
)]
#[get("/products/metadata")]
pub async fn product_metadata(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let metadata = db::product_metadata(&state.pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(metadata)))
}

#[utoipa::path(
    get,
    path = "/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Active product", body = ProductView),
        (status = 404, description = "No active product with this slug")
    ),
    tag = "products"
)]
#[get("/products/{slug}")]
pub async fn get_product(
    state: web::Data<AppState>,
    slug: web::Path<String>,
) -> AppResult<HttpResponse> {
    let product = db::get_product_by_slug(&state.pool, &slug)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product '{slug}' not found")))?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(ProductView::from(product))))
}

struct UploadedImage {
    filename: String,
    bytes: Vec<u8>,
}

/// Text fields plus image files of a product form.
#[derive(Default)]
struct ProductForm {
    fields: HashMap<String, String>,
    images: Vec<UploadedImage>,
}

async fn read_product_form(mut payload: Multipart) -> AppResult<ProductForm> {
    let mut form = ProductForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?;

        let cd = field.content_disposition();
        let name = cd.get_name().unwrap_or_default().to_string();
        let filename = cd.get_filename().map(str::to_string);

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?;
            bytes.extend_from_slice(&data);
            if bytes.len() > MAX_IMAGE_BYTES {
                return Err(AppError::validation("Image exceeds the 5 MB limit"));
            }
        }

        if name == "images" {
            let is_image = field
                .content_type()
                .map(|m| m.essence_str().starts_with("image/"))
                .unwrap_or(false);
            if !is_image {
                return Err(AppError::validation("Only image uploads are allowed"));
            }
            if form.images.len() == MAX_IMAGES {
                return Err(AppError::validation(format!(
                    "A product can have at most {MAX_IMAGES} images"
                )));
            }
            if !bytes.is_empty() {
                form.images.push(UploadedImage {
                    filename: filename.unwrap_or_else(|| "image.jpg".to_string()),
                    bytes,
                });
            }
        } else if !name.is_empty() {
            let value = String::from_utf8(bytes)
                .map_err(|_| AppError::validation(format!("Field '{name}' is not valid UTF-8")))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Accepts a JSON array or a comma-separated list.
fn parse_tags(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let tags: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).unwrap_or_default()
    } else {
        raw.split(',').map(str::to_string).collect()
    };
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_variants(raw: &str) -> AppResult<Vec<Variant>> {
    let variants: Vec<Variant> = serde_json::from_str(raw.trim())
        .map_err(|e| AppError::validation(format!("variants must be a JSON array: {e}")))?;
    validate_variants(&variants)?;
    Ok(variants)
}

fn validate_variants(variants: &[Variant]) -> AppResult<()> {
    for v in variants {
        if v.color.trim().is_empty() || v.size.trim().is_empty() {
            return Err(AppError::validation("Each variant needs a color and a size"));
        }
        if v.stock < 0 {
            return Err(AppError::validation("Variant stock cannot be negative"));
        }
    }
    Ok(())
}

fn parse_number(field: &str, raw: &str) -> AppResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AppError::validation(format!("{field} must be a number")))
}

fn parse_category(raw: &str) -> AppResult<ProductCategory> {
    raw.parse::<ProductCategory>().map_err(|_| {
        AppError::validation("category must be one of Men, Women, Kids, Unisex")
    })
}

fn product_from_fields(fields: &HashMap<String, String>) -> AppResult<NewProduct> {
    let field = |name: &str| fields.get(name).map(String::as_str);

    let title = required("title", field("title"))?;
    let description = required("description", field("description"))?;
    let brand = required("brand", field("brand"))?;
    let category = parse_category(&required("category", field("category"))?)?;

    let price = parse_number("price", &required("price", field("price"))?)?;
    validate_price("price", price)?;

    let discount_percentage = match field("discountPercentage").map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_number("discountPercentage", raw)?,
        _ => 0.0,
    };
    validate_discount(discount_percentage)?;

    let slug = slugify(field("slug").filter(|s| !s.trim().is_empty()).unwrap_or(&title));
    if slug.is_empty() {
        return Err(AppError::validation("title must contain letters or digits"));
    }

    let variants = match field("variants").map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_variants(raw)?,
        _ => Vec::new(),
    };

    Ok(NewProduct {
        title,
        slug,
        description,
        price,
        discount_percentage,
        brand,
        category,
        sub_category: field("subCategory")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        tags: field("tags").map(parse_tags).unwrap_or_default(),
        thumbnail: field("thumbnail").map(str::trim).unwrap_or_default().to_string(),
        images: Vec::new(),
        variants,
        is_featured: field("isFeatured").map(|v| v.trim() == "true").unwrap_or(false),
    })
}

/// Multipart form read by `POST /products`. Documentation only; the handler
/// walks the fields itself.
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductUploadForm {
    pub title: String,
    /// Derived from the title when omitted.
    pub slug: Option<String>,
    pub description: String,
    pub price: f64,
    pub discount_percentage: Option<f64>,
    pub brand: String,
    /// Men, Women, Kids or Unisex.
    pub category: String,
    pub sub_category: Option<String>,
    /// JSON array or comma-separated list.
    pub tags: Option<String>,
    /// JSON array of `{color, colorCode?, size, sku?, stock}`.
    pub variants: Option<String>,
    pub is_featured: Option<bool>,
    /// Defaults to the first uploaded image.
    pub thumbnail: Option<String>,
    /// Up to 5 files, 5 MB each.
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
}

#[utoipa::path(
    post,
    path = "/products",
    request_body(
        content = ProductUploadForm,
        content_type = "multipart/form-data",
        description = "Product fields plus up to 5 `images` files"
    ),
    responses(
        (status = 201, description = "Product created", body = ProductView),
        (status = 400, description = "Invalid product data or duplicate slug"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Admin only")
    ),
    tag = "products"
)]
#[post("/products")]
pub async fn create_product(
    state: web::Data<AppState>,
    principal: Principal,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;

    let form = read_product_form(payload).await?;
    let mut product = product_from_fields(&form.fields)?;

    if db::slug_exists(&state.pool, &product.slug).await? {
        return Err(AppError::validation("A product with this slug already exists"));
    }

    for image in form.images {
        let key = product_image_key(&product.slug, &image.filename);
        match put_image(&state, &key, image.bytes).await {
            Ok(url) => product.images.push(url),
            Err(e) => {
                discard_images(&state, &product.images).await;
                return Err(e);
            }
        }
    }
    if product.thumbnail.is_empty() {
        product.thumbnail = product.images.first().cloned().unwrap_or_default();
    }

    let id = match db::insert_product(&state.pool, &product).await {
        Ok(id) => id,
        Err(e) => {
            discard_images(&state, &product.images).await;
            return Err(AppError::from_unique(e, "A product with this slug already exists"));
        }
    };
    let created = db::get_product_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("product {id} vanished after insert")))?;

    log::info!("product {} ({}) created by user {}", id, created.slug, principal.user_id);
    Ok(HttpResponse::Created().json(
        ApiResponse::ok(ProductView::from(created)).with_message("Product created successfully"),
    ))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    /// Replaces every stored variant when present.
    pub variants: Option<Vec<Variant>>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl UpdateProductRequest {
    fn into_update(self) -> AppResult<ProductUpdate> {
        if let Some(price) = self.price {
            validate_price("price", price)?;
        }
        if let Some(discount) = self.discount_percentage {
            validate_discount(discount)?;
        }
        let category = self.category.as_deref().map(parse_category).transpose()?;
        if let Some(variants) = &self.variants {
            validate_variants(variants)?;
        }
        let slug = match self.slug {
            Some(raw) => {
                let slug = slugify(&raw);
                if slug.is_empty() {
                    return Err(AppError::validation("slug must contain letters or digits"));
                }
                Some(slug)
            }
            None => None,
        };
        let non_blank = |v: Option<String>, field: &str| -> AppResult<Option<String>> {
            match v {
                Some(s) if s.trim().is_empty() => {
                    Err(AppError::validation(format!("{field} cannot be empty")))
                }
                other => Ok(other.map(|s| s.trim().to_string())),
            }
        };

        Ok(ProductUpdate {
            title: non_blank(self.title, "title")?,
            slug,
            description: non_blank(self.description, "description")?,
            price: self.price,
            discount_percentage: self.discount_percentage,
            brand: non_blank(self.brand, "brand")?,
            category,
            sub_category: self.sub_category,
            tags: self.tags.map(|tags| {
                tags.into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }),
            thumbnail: self.thumbnail,
            variants: self.variants,
            is_featured: self.is_featured,
            is_active: self.is_active,
        })
    }
}

#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductView),
        (status = 400, description = "Invalid product data"),
        (status = 404, description = "Product not found")
    ),
    tag = "products"
)]
#[put("/products/{id}")]
pub async fn update_product(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
    payload: web::Json<UpdateProductRequest>,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;
    let id = id.into_inner();

    let changes = payload.into_inner().into_update()?;
    let found = db::update_product(&state.pool, id, &changes)
        .await
        .map_err(|e| AppError::from_unique(e, "A product with this slug already exists"))?;
    if !found {
        return Err(AppError::not_found(format!("Product {id} not found")));
    }

    let product = db::get_product_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;
    Ok(HttpResponse::Ok().json(
        ApiResponse::ok(ProductView::from(product)).with_message("Product updated successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deactivated"),
        (status = 404, description = "Product not found")
    ),
    tag = "products"
)]
#[delete("/products/{id}")]
pub async fn delete_product(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;
    let id = id.into_inner();

    if !db::soft_delete_product(&state.pool, id).await? {
        return Err(AppError::not_found(format!("Product {id} not found")));
    }
    log::info!("product {id} deactivated by user {}", principal.user_id);
    Ok(HttpResponse::Ok().json(ApiResponse::message("Product deleted successfully")))
}

/// Removes stored objects no product points at. Failures are only logged.
async fn discard_images(state: &AppState, urls: &[String]) {
    for url in urls {
        if let Err(e) = delete_image(state, url).await {
            log::warn!("could not remove image {url}: {e}");
        }
    }
}

/// Image list and thumbnail left after removing `name`; `None` when no
/// image has that name.
fn without_image(
    images: &[String],
    thumbnail: &str,
    name: &str,
) -> Option<(String, Vec<String>, String)> {
    let removed = images.iter().find(|url| image_name(url) == name)?.clone();
    let remaining: Vec<String> = images.iter().filter(|url| **url != removed).cloned().collect();
    let thumbnail = if thumbnail == removed {
        remaining.first().cloned().unwrap_or_default()
    } else {
        thumbnail.to_string()
    };
    Some((removed, remaining, thumbnail))
}

#[utoipa::path(
    delete,
    path = "/products/{id}/{image}",
    params(
        ("id" = i32, Path, description = "Product id"),
        ("image" = String, Path, description = "Last URL segment of the image")
    ),
    responses(
        (status = 200, description = "Image removed", body = ProductView),
        (status = 404, description = "Product or image not found")
    ),
    tag = "products"
)]
#[delete("/products/{id}/{image}")]
pub async fn delete_product_image(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(i32, String)>,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;
    let (id, image) = path.into_inner();

    let product = db::get_product_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;
    let (removed, images, thumbnail) = without_image(&product.images, &product.thumbnail, &image)
        .ok_or_else(|| AppError::not_found(format!("Image '{image}' not found")))?;

    db::set_product_images(&state.pool, id, &images, &thumbnail).await?;
    discard_images(&state, std::slice::from_ref(&removed)).await;

    let product = db::get_product_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;
    Ok(HttpResponse::Ok().json(
        ApiResponse::ok(ProductView::from(product)).with_message("Image deleted successfully"),
    ))
}
