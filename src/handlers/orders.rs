use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::OrderService;
use crate::credentials;
use crate::domain::order::{LineItem, Order, RequestedLineItem};
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

/// A requested line item. Any `unit_price` sent by the client is ignored: the
/// price always comes from the product service.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLineItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer: String,
    pub line_items: Vec<CreateLineItemRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusParams {
    /// New status, e.g. `PROCESSED` or `CANCELLED`.
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LineItemResponse {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub customer: String,
    pub created_at: String,
    pub total: String,
    pub status: String,
    pub line_items: Vec<LineItemResponse>,
}

impl From<LineItem> for LineItemResponse {
    fn from(line: LineItem) -> Self {
        Self {
            id: line.id,
            order_id: line.order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price.to_string(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            customer: order.customer,
            created_at: order.created_at.to_rfc3339(),
            total: order.total.to_string(),
            status: order.status,
            line_items: order.line_items.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Routes ───────────────────────────────────────────────────────────────────

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/orders")
            .route("", web::get().to(list_orders))
            .route("", web::post().to(create_order))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}", web::delete().to(delete_order))
            .route("/{id}/status", web::put().to(update_status)),
    );
}

fn caller_credential(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/orders
///
/// Returns every order with its line items.
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "All orders", body = [OrderResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(service: web::Data<OrderService>) -> Result<HttpResponse, AppError> {
    let orders = service.find_all().await?;
    let body: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/orders/{id}
///
/// Returns the order together with its line items.
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = i64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<OrderService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    match service.find_by_id(path.into_inner()).await? {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Err(AppError::NotFound),
    }
}

/// POST /api/orders
///
/// Validates every line item against the product service, stores the order
/// with its line items in one transaction and then decrements remote stock.
/// Unit prices and the total are always computed server-side. The caller's
/// `Authorization` header is forwarded to the product service.
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Empty order or non-positive quantity"),
        (status = 409, description = "Insufficient stock"),
        (status = 422, description = "Unknown product"),
        (status = 503, description = "Product service unavailable"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    req: HttpRequest,
    service: web::Data<OrderService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let requested = body
        .line_items
        .into_iter()
        .map(|line| RequestedLineItem {
            product_id: line.product_id,
            quantity: line.quantity,
        })
        .collect();

    let order = credentials::scope(
        caller_credential(&req),
        service.create_order(body.customer, requested),
    )
    .await?;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// PUT /api/orders/{id}/status?status=PROCESSED
///
/// Overwrites the order status. Any non-empty value is accepted.
#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("status" = String, Query, description = "New status"),
    ),
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Empty status"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_status(
    service: web::Data<OrderService>,
    path: web::Path<i64>,
    query: web::Query<UpdateStatusParams>,
) -> Result<HttpResponse, AppError> {
    let status = query.into_inner().status;
    if status.trim().is_empty() {
        return Err(AppError::BadRequest("status must not be empty".to_string()));
    }

    match service.update_status(path.into_inner(), status).await? {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Err(AppError::NotFound),
    }
}

/// DELETE /api/orders/{id}
///
/// Deletes the order's line items, then the order.
#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(
        ("id" = i64, Path, description = "Order id"),
    ),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    service: web::Data<OrderService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    if service.delete_order(path.into_inner()).await? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(AppError::NotFound)
    }
}
