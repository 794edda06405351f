pub mod auth;
pub mod orders;
pub mod products;
pub mod users;

use actix_web::web;
use serde::Serialize;

use crate::catalog::PageMeta;
use crate::errors::AppError;

/// JSON envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageMeta>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            page: None,
        }
    }

    pub fn paged(data: T, page: PageMeta) -> Self {
        Self {
            page: Some(page),
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
            page: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error: Some(error.into()),
            page: None,
        }
    }
}

/// Malformed JSON bodies answer with the error envelope instead of plain text.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::validation(format!("Invalid request body: {err}")).into())
}

/// A path segment of the wrong type (`/orders/abc`) is treated as an unknown
/// resource.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::not_found(format!("Invalid path: {err}")).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::validation(format!("Invalid query string: {err}")).into())
}

/// Registers every route. `/products/metadata` goes before `/products/{slug}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(auth::signup)
        .service(auth::signin)
        .service(auth::signout)
        .service(auth::session)
        .service(products::list_products)
        .service(products::product_metadata)
        .service(products::get_product)
        .service(products::create_product)
        .service(products::update_product)
        .service(products::delete_product)
        .service(products::delete_product_image)
        .service(orders::create_order)
        .service(orders::list_orders)
        .service(orders::my_orders)
        .service(orders::get_order)
        .service(orders::pay_order)
        .service(orders::deliver_order)
        .service(orders::update_order_status)
        .service(users::list_users)
        .service(users::get_user)
        .service(users::update_user)
        .service(users::delete_user);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App, HttpResponse};
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Deserialize)]
    struct Window {
        limit: u32,
    }

    #[actix_web::test]
    async fn extractor_errors_use_the_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(path_config())
                .app_data(query_config())
                .route(
                    "/orders/{id}",
                    web::get().to(|id: web::Path<i32>| async move {
                        HttpResponse::Ok().body(id.to_string())
                    }),
                )
                .route(
                    "/window",
                    web::get().to(|q: web::Query<Window>| async move {
                        HttpResponse::Ok().body(q.limit.to_string())
                    }),
                ),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/orders/abc").to_request()).await;
        assert_eq!(resp.status().as_u16(), 404);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/window?limit=x").to_request()).await;
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid query string"));

        let resp = test::call_service(&app, test::TestRequest::get().uri("/orders/7").to_request()).await;
        assert_eq!(resp.status().as_u16(), 200);
    }

    #[::core::prelude::v1::test]
    fn paged_envelope_flattens_meta() {
        let body = ApiResponse::paged(
            vec![1, 2],
            PageMeta {
                count: 2,
                total: 14,
                page: 1,
                total_pages: 2,
            },
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 2);
        assert_eq!(json["totalPages"], 2);
        assert!(json.get("error").is_none());
        assert!(json.get("page").unwrap().is_number());
    }

    #[::core::prelude::v1::test]
    fn failure_envelope() {
        let json = serde_json::to_value(ApiResponse::failure("Not found", "order 3")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Not found");
        assert_eq!(json["error"], "order 3");
        assert!(json.get("data").is_none());
    }
}
