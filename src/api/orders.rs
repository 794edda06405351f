// src/api/orders.rs

use actix_web::{get, post, put, web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::auth::{require_role, require_self_or_admin, Principal};
use crate::api::ApiResponse;
use crate::errors::{AppError, AppResult};
use crate::lifecycle::{after_payment, check_delivery, check_transition, OrderState};
use crate::models::{Order, OrderStatus, PaymentResult, Role, ShippingAddress};
use crate::pricing::CartLine;
use crate::validation::required;
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliverRequest {
    pub tracking_number: Option<String>,
    pub courier_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

fn validate_shipping(address: &ShippingAddress) -> AppResult<()> {
    required("shippingAddress.address", Some(&address.address))?;
    required("shippingAddress.city", Some(&address.city))?;
    required("shippingAddress.postalCode", Some(&address.postal_code))?;
    required("shippingAddress.country", Some(&address.country))?;
    required("shippingAddress.phoneNumber", Some(&address.phone_number))?;
    Ok(())
}

fn state_of(order: &Order) -> OrderState {
    OrderState {
        status: order.status,
        is_paid: order.is_paid,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn load_order(state: &AppState, id: i32) -> AppResult<Order> {
    db::get_order(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))
}

#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created with server-side prices", body = Order),
        (status = 400, description = "Empty cart, bad quantity or unknown product"),
        (status = 401, description = "Not signed in")
    ),
    tag = "orders"
)]
#[post("/orders")]
pub async fn create_order(
    state: web::Data<AppState>,
    principal: Principal,
    payload: web::Json<CreateOrderRequest>,
) -> AppResult<HttpResponse> {
    let payload = payload.into_inner();
    if payload.order_items.is_empty() {
        return Err(AppError::validation("No order items"));
    }
    validate_shipping(&payload.shipping_address)?;
    let payment_method = required("paymentMethod", payload.payment_method.as_deref())?;

    let slugs: Vec<String> = payload
        .order_items
        .iter()
        .map(|line| line.product.trim().to_string())
        .collect();
    let catalog = db::catalog_prices(&state.pool, &slugs).await?;
    let priced = state.pricing.price_cart(&payload.order_items, &catalog)?;

    let id = db::insert_order(
        &state.pool,
        principal.user_id,
        &priced,
        &payload.shipping_address,
        &payment_method,
    )
    .await?;
    log::info!(
        "order {id} created by user {} total {:.2}",
        principal.user_id,
        priced.totals.total_price
    );

    let order = load_order(&state, id).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(order).with_message("Order created successfully")))
}

#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "All orders, newest first", body = [Order]),
        (status = 403, description = "Admin only")
    ),
    tag = "orders"
)]
#[get("/orders")]
pub async fn list_orders(
    state: web::Data<AppState>,
    principal: Principal,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;
    let orders = db::list_orders(&state.pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(orders)))
}

#[utoipa::path(
    get,
    path = "/orders/mine",
    responses(
        (status = 200, description = "Orders of the signed-in user", body = [Order]),
        (status = 401, description = "Not signed in")
    ),
    tag = "orders"
)]
#[get("/orders/mine")]
pub async fn my_orders(
    state: web::Data<AppState>,
    principal: Principal,
) -> AppResult<HttpResponse> {
    let orders = db::list_user_orders(&state.pool, principal.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(orders)))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 403, description = "Neither owner nor admin"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
#[get("/orders/{id}")]
pub async fn get_order(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let order = load_order(&state, id.into_inner()).await?;
    require_self_or_admin(&principal, order.user.id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(order)))
}

#[utoipa::path(
    put,
    path = "/orders/{id}/pay",
    params(("id" = i32, Path, description = "Order id")),
    request_body = PaymentResult,
    responses(
        (status = 200, description = "Payment recorded", body = Order),
        (status = 400, description = "Order is cancelled or returned"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
#[put("/orders/{id}/pay")]
pub async fn pay_order(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
    payload: web::Json<PaymentResult>,
) -> AppResult<HttpResponse> {
    let id = id.into_inner();
    let order = load_order(&state, id).await?;
    require_self_or_admin(&principal, order.user.id)?;

    let next = after_payment(state_of(&order))?;
    db::mark_order_paid(&state.pool, id, next, &payload).await?;
    log::info!("order {id} paid, status {next}");

    let order = load_order(&state, id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(order).with_message("Order paid")))
}

#[utoipa::path(
    put,
    path = "/orders/{id}/deliver",
    params(("id" = i32, Path, description = "Order id")),
    request_body = DeliverRequest,
    responses(
        (status = 200, description = "Order delivered", body = Order),
        (status = 400, description = "Order unpaid or in a final state"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
#[put("/orders/{id}/deliver")]
pub async fn deliver_order(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
    payload: Option<web::Json<DeliverRequest>>,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;
    let id = id.into_inner();
    let order = load_order(&state, id).await?;
    check_delivery(state_of(&order))?;

    let body = payload.map(web::Json::into_inner).unwrap_or_default();
    let tracking = non_blank(body.tracking_number);
    let courier = non_blank(body.courier_name);
    db::mark_order_delivered(&state.pool, id, tracking.as_deref(), courier.as_deref()).await?;
    log::info!("order {id} delivered");

    let order = load_order(&state, id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(order).with_message("Order delivered")))
}

#[utoipa::path(
    put,
    path = "/orders/{id}/status",
    params(("id" = i32, Path, description = "Order id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Order),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
#[put("/orders/{id}/status")]
pub async fn update_order_status(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
    payload: web::Json<StatusRequest>,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;
    let id = id.into_inner();
    let next = payload.status;

    let order = load_order(&state, id).await?;
    check_transition(state_of(&order), next)?;

    if next == OrderStatus::Delivered {
        db::mark_order_delivered(&state.pool, id, None, None).await?;
    } else {
        db::set_order_status(&state.pool, id, next).await?;
    }
    log::info!("order {id} moved from {} to {next}", order.status);

    let order = load_order(&state, id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(order).with_message("Order status updated")))
}
