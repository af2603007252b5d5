use std::collections::BTreeMap;

use actix_web::{web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::OrderService;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// State of every circuit breaker created so far, e.g. `{"products-cb": "CLOSED"}`.
    pub breakers: BTreeMap<String, String>,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health(service: web::Data<OrderService>) -> HttpResponse {
    let breakers = service
        .products()
        .breakers()
        .snapshot()
        .await
        .into_iter()
        .map(|(name, state)| (name, state.as_str().to_string()))
        .collect();

    HttpResponse::Ok().json(HealthResponse {
        status: "UP".to_string(),
        breakers,
    })
}
