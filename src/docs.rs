use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::signup,
        crate::api::auth::signin,
        crate::api::auth::signout,
        crate::api::auth::session,
        crate::api::products::list_products,
        crate::api::products::product_metadata,
        crate::api::products::get_product,
        crate::api::products::create_product,
        crate::api::products::update_product,
        crate::api::products::delete_product,
        crate::api::products::delete_product_image,
        crate::api::orders::create_order,
        crate::api::orders::list_orders,
        crate::api::orders::my_orders,
        crate::api::orders::get_order,
        crate::api::orders::pay_order,
        crate::api::orders::deliver_order,
        crate::api::orders::update_order_status,
        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::delete_user
    ),
    components(
        schemas(
            crate::api::auth::SignupRequest,
            crate::api::auth::SigninRequest,
            crate::api::auth::Principal,
            crate::api::products::ProductUploadForm,
            crate::api::products::UpdateProductRequest,
            crate::api::orders::CreateOrderRequest,
            crate::api::orders::DeliverRequest,
            crate::api::orders::StatusRequest,
            crate::api::users::UpdateUserRequest,
            crate::models::Product,
            crate::models::ProductView,
            crate::models::ProductMetadata,
            crate::models::ProductCategory,
            crate::models::Variant,
            crate::models::User,
            crate::models::Role,
            crate::models::Order,
            crate::models::OrderItem,
            crate::models::OrderStatus,
            crate::models::ShippingAddress,
            crate::models::PaymentResult,
            crate::models::UserSummary,
            crate::pricing::CartLine,
            crate::catalog::PageMeta
        )
    ),
    tags(
        (name = "auth", description = "Sign up, sign in and sessions"),
        (name = "products", description = "Catalog browsing and administration"),
        (name = "orders", description = "Checkout and order lifecycle"),
        (name = "users", description = "Account management")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/signin",
            "/products",
            "/products/metadata",
            "/products/{slug}",
            "/products/{id}/{image}",
            "/orders/{id}/pay",
            "/orders/{id}/status",
            "/users/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing from the API doc");
        }
    }

    #[test]
    fn product_upload_is_a_multipart_form() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let body = &doc["paths"]["/products"]["post"]["requestBody"]["content"]["multipart/form-data"];
        assert_eq!(body["schema"]["$ref"], "#/components/schemas/ProductUploadForm");

        let form = &doc["components"]["schemas"]["ProductUploadForm"]["properties"];
        assert!(form.get("discountPercentage").is_some());
        assert_eq!(form["images"]["type"], "array");
    }
}
