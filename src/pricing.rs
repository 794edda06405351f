// src/pricing.rs
//
// Server-side order pricing. Client-submitted prices are never trusted: every
// line is re-priced from the current product row before the order is stored.

use std::collections::HashMap;

use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::OrderItem;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    pub tax_rate: f64,
    pub shipping_fee: f64,
    /// Orders strictly above this amount ship for free.
    pub free_shipping_threshold: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: 0.15,
            shipping_fee: 10.0,
            free_shipping_threshold: 100.0,
        }
    }
}

/// One cart line as the client sends it. `name`, `image` and `price` are
/// accepted for compatibility and ignored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product slug.
    pub product: String,
    pub qty: i32,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Authoritative product state used to price a line. `unit_price` is the
/// list price; `discountPercentage` only affects the displayed `finalPrice`.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPrice {
    pub product_id: i32,
    pub title: String,
    pub thumbnail: String,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub items_price: f64,
    pub tax_price: f64,
    pub shipping_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl PricingPolicy {
    pub fn totals(&self, items_price: f64) -> OrderTotals {
        let items_price = round2(items_price);
        let shipping_price = if items_price > self.free_shipping_threshold {
            0.0
        } else {
            self.shipping_fee
        };
        let tax_price = round2(items_price * self.tax_rate);
        OrderTotals {
            items_price,
            tax_price,
            shipping_price: round2(shipping_price),
            total_price: round2(items_price + tax_price + shipping_price),
        }
    }

    /// Prices the whole cart or nothing: the first unknown product rejects it.
    pub fn price_cart(
        &self,
        lines: &[CartLine],
        catalog: &HashMap<String, CatalogPrice>,
    ) -> Result<PricedOrder, AppError> {
        if lines.is_empty() {
            return Err(AppError::validation("No order items"));
        }

        let mut items = Vec::with_capacity(lines.len());
        let mut items_price = 0.0;

        for line in lines {
            if line.qty < 1 {
                return Err(AppError::validation(format!(
                    "Invalid quantity for product {}",
                    line.product
                )));
            }
            let Some(entry) = catalog.get(line.product.trim()) else {
                return Err(AppError::validation(format!(
                    "Product not found: {}",
                    line.product
                )));
            };

            let unit = round2(entry.unit_price);
            items_price += unit * f64::from(line.qty);
            items.push(OrderItem {
                name: entry.title.clone(),
                qty: line.qty,
                image: entry.thumbnail.clone(),
                price: unit,
                size: line.size.trim().to_string(),
                color: line.color.trim().to_string(),
                sku: line.sku.clone().filter(|s| !s.trim().is_empty()),
                product: entry.product_id,
            });
        }

        Ok(PricedOrder {
            items,
            totals: self.totals(items_price),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: &str, qty: i32) -> CartLine {
        CartLine {
            product: product.to_string(),
            qty,
            size: "M".into(),
            color: "Red".into(),
            sku: None,
            name: None,
            image: None,
            price: None,
        }
    }

    fn catalog(entries: &[(&str, i32, f64)]) -> HashMap<String, CatalogPrice> {
        entries
            .iter()
            .map(|(slug, id, price)| {
                (
                    slug.to_string(),
                    CatalogPrice {
                        product_id: *id,
                        title: format!("Product {slug}"),
                        thumbnail: format!("{slug}.jpg"),
                        unit_price: *price,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn two_items_at_sixty_ship_free() {
        let priced = PricingPolicy::default()
            .price_cart(&[line("p1", 2)], &catalog(&[("p1", 1, 60.0)]))
            .unwrap();

        assert_eq!(
            priced.totals,
            OrderTotals {
                items_price: 120.0,
                tax_price: 18.0,
                shipping_price: 0.0,
                total_price: 138.0,
            }
        );
        assert_eq!(priced.items[0].price, 60.0);
        assert_eq!(priced.items[0].name, "Product p1");
        assert_eq!(priced.items[0].image, "p1.jpg");
        assert_eq!(priced.items[0].product, 1);
    }

    #[test]
    fn client_price_is_ignored() {
        let mut tampered = line("p1", 1);
        tampered.price = Some(0.01);
        tampered.name = Some("Free stuff".into());

        let priced = PricingPolicy::default()
            .price_cart(&[tampered], &catalog(&[("p1", 1, 40.0)]))
            .unwrap();
        assert_eq!(priced.items[0].price, 40.0);
        assert_eq!(priced.items[0].name, "Product p1");
    }

    #[test]
    fn shipping_threshold_is_strict() {
        let policy = PricingPolicy::default();
        assert_eq!(policy.totals(100.0).shipping_price, 10.0);
        assert_eq!(policy.totals(100.01).shipping_price, 0.0);
        assert_eq!(policy.totals(0.0).shipping_price, 10.0);
    }

    #[test]
    fn tax_is_rounded_to_cents() {
        let totals = PricingPolicy::default().totals(33.33);
        assert_eq!(totals.tax_price, 5.0);
        assert_eq!(totals.total_price, 48.33);

        let totals = PricingPolicy::default().totals(19.99);
        assert_eq!(totals.tax_price, 3.0);
    }

    #[test]
    fn unknown_product_rejects_whole_cart() {
        let err = PricingPolicy::default()
            .price_cart(
                &[line("p1", 1), line("ghost", 1)],
                &catalog(&[("p1", 1, 10.0)]),
            )
            .unwrap_err();
        match err {
            AppError::Validation(msg) => assert_eq!(msg, "Product not found: ghost"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_cart_and_bad_quantities_are_rejected() {
        let policy = PricingPolicy::default();
        let cat = catalog(&[("p1", 1, 10.0)]);
        assert!(matches!(policy.price_cart(&[], &cat), Err(AppError::Validation(_))));
        assert!(matches!(
            policy.price_cart(&[line("p1", 0)], &cat),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn sums_multiple_lines() {
        let priced = PricingPolicy::default()
            .price_cart(
                &[line("a", 3), line("b", 1)],
                &catalog(&[("a", 1, 12.0), ("b", 2, 20.0)]),
            )
            .unwrap();
        assert_eq!(priced.totals.items_price, 56.0);
        assert_eq!(priced.totals.shipping_price, 10.0);
        assert_eq!(priced.totals.tax_price, 8.4);
        assert_eq!(priced.totals.total_price, 74.4);
        assert_eq!(priced.items.len(), 2);
    }
}
