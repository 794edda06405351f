// src/catalog.rs
//
// Product listing: query-string parameters -> filter predicate, page window
// and sort order, rendered into a `QueryBuilder`.

use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use utoipa::{IntoParams, ToSchema};

use crate::models::ProductCategory;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 12;
pub const MAX_LIMIT: i64 = 100;

/// Raw `GET /products` query. Everything is kept as text so a malformed value
/// is ignored instead of failing the request. Built with
/// [`ProductListQuery::from_pairs`], so repeated keys never fail either.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    /// Case-insensitive match on title, description or tags.
    pub search: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    /// Comma-separated variant colors.
    pub colors: Option<String>,
    /// Comma-separated variant sizes.
    pub sizes: Option<String>,
    pub in_stock: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    /// Comma-separated fields, `-` prefix for descending (e.g. `-price,title`).
    pub sort: Option<String>,
}

impl ProductListQuery {
    /// Repeated `colors`/`sizes` keys are merged into one list; for every
    /// other key the first value wins. Unknown keys are dropped.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let value = value.into();
            let slot = match key.as_ref() {
                "colors" => {
                    append_list(&mut query.colors, value);
                    continue;
                }
                "sizes" => {
                    append_list(&mut query.sizes, value);
                    continue;
                }
                "search" => &mut query.search,
                "category" => &mut query.category,
                "subCategory" => &mut query.sub_category,
                "brand" => &mut query.brand,
                "minPrice" => &mut query.min_price,
                "maxPrice" => &mut query.max_price,
                "inStock" => &mut query.in_stock,
                "page" => &mut query.page,
                "limit" => &mut query.limit,
                "sort" => &mut query.sort,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

fn append_list(slot: &mut Option<String>, value: String) {
    match slot {
        Some(existing) => {
            existing.push(',');
            existing.push_str(&value);
        }
        None => *slot = Some(value),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<ProductCategory>,
    pub sub_category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub in_stock: bool,
}

impl ProductFilter {
    pub fn from_query(query: &ProductListQuery) -> Self {
        Self {
            search: non_blank(query.search.as_deref()),
            category: non_blank(query.category.as_deref()).and_then(|c| c.parse().ok()),
            sub_category: non_blank(query.sub_category.as_deref()),
            brand: non_blank(query.brand.as_deref()),
            min_price: parse_price(query.min_price.as_deref()),
            max_price: parse_price(query.max_price.as_deref()),
            colors: split_list(query.colors.as_deref()),
            sizes: split_list(query.sizes.as_deref()),
            in_stock: query
                .in_stock
                .as_deref()
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    fn has_variant_clause(&self) -> bool {
        !self.colors.is_empty() || !self.sizes.is_empty() || self.in_stock
    }

    /// Appends ` WHERE ...` for a query over `products p`.
    ///
    /// Variant conditions share one `EXISTS`, so they must hold for the same
    /// variant.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE p.is_active = TRUE");

        if let Some(term) = &self.search {
            let pattern = format!("%{}%", escape_like(term));
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR p.description ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR EXISTS (SELECT 1 FROM unnest(p.tags) AS tag WHERE tag ILIKE ");
            qb.push_bind(pattern);
            qb.push("))");
        }

        if let Some(category) = self.category {
            qb.push(" AND p.category = ");
            qb.push_bind(category);
        }
        if let Some(sub_category) = &self.sub_category {
            qb.push(" AND p.sub_category = ");
            qb.push_bind(sub_category.clone());
        }
        if let Some(brand) = &self.brand {
            qb.push(" AND p.brand = ");
            qb.push_bind(brand.clone());
        }
        if let Some(min) = self.min_price {
            qb.push(" AND p.price >= ");
            qb.push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND p.price <= ");
            qb.push_bind(max);
        }

        if self.has_variant_clause() {
            qb.push(" AND EXISTS (SELECT 1 FROM product_variants v WHERE v.product_id = p.id");
            if !self.colors.is_empty() {
                qb.push(" AND v.color = ANY(");
                qb.push_bind(self.colors.clone());
                qb.push(")");
            }
            if !self.sizes.is_empty() {
                qb.push(" AND v.size = ANY(");
                qb.push_bind(self.sizes.clone());
                qb.push(")");
            }
            if self.in_stock {
                qb.push(" AND v.stock > 0");
            }
            qb.push(")");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn resolve(page: Option<&str>, limit: Option<&str>, default_limit: i64) -> Self {
        let default_limit = default_limit.clamp(1, MAX_LIMIT);
        Self {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).map(|l| l.min(MAX_LIMIT)).unwrap_or(default_limit),
        }
    }

    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn meta(&self, count: usize, total: i64) -> PageMeta {
        PageMeta {
            count,
            total,
            page: self.page,
            total_pages: total_pages(total, self.limit),
        }
    }
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub count: usize,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Price,
    Title,
    Rating,
    NumReviews,
    DiscountPercentage,
}

impl SortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "createdAt" => Some(Self::CreatedAt),
            "price" => Some(Self::Price),
            "title" => Some(Self::Title),
            "rating" => Some(Self::Rating),
            "numReviews" => Some(Self::NumReviews),
            "discountPercentage" => Some(Self::DiscountPercentage),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "p.created_at",
            Self::Price => "p.price",
            Self::Title => "p.title",
            Self::Rating => "p.rating",
            Self::NumReviews => "p.num_reviews",
            Self::DiscountPercentage => "p.discount_percentage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder(pub Vec<(SortField, bool)>);

impl SortOrder {
    /// Parses `price,-createdAt`; `true` in the pair means descending.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut keys: Vec<(SortField, bool)> = Vec::new();
        for part in raw.unwrap_or("").split(',') {
            let part = part.trim();
            let (name, desc) = match part.strip_prefix('-') {
                Some(name) => (name, true),
                None => (part, false),
            };
            if let Some(field) = SortField::parse(name) {
                if !keys.iter().any(|(f, _)| *f == field) {
                    keys.push((field, desc));
                }
            }
        }
        if keys.is_empty() {
            keys.push((SortField::CreatedAt, true));
        }
        Self(keys)
    }

    /// Column names come from a fixed whitelist, never from the request.
    pub fn push_order_by(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ");
        for (field, desc) in &self.0 {
            qb.push(field.column());
            qb.push(if *desc { " DESC, " } else { " ASC, " });
        }
        qb.push("p.id DESC");
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::parse(None)
    }
}

/// Everything needed to run one listing query.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub filter: ProductFilter,
    pub page: PageRequest,
    pub sort: SortOrder,
}

impl ListingRequest {
    pub fn from_query(query: &ProductListQuery, default_limit: i64) -> Self {
        Self {
            filter: ProductFilter::from_query(query),
            page: PageRequest::resolve(query.page.as_deref(), query.limit.as_deref(), default_limit),
            sort: SortOrder::parse(query.sort.as_deref()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn parse_price(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn positive(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok()).filter(|v| *v > 0)
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
