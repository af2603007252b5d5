pub mod application;
pub mod config;
pub mod credentials;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod resilience;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use application::{OrderService, ProductGate};
pub use config::Config;
pub use db::{create_pool, DbPool};

use infrastructure::{DieselOrderRepository, HttpProductClient};
use resilience::BreakerRegistry;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::update_status,
        handlers::orders::delete_order,
        handlers::health::health,
    ),
    components(schemas(
        handlers::orders::CreateOrderRequest,
        handlers::orders::CreateLineItemRequest,
        handlers::orders::OrderResponse,
        handlers::orders::LineItemResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "orders", description = "Purchase order lifecycle"),
        (name = "health", description = "Liveness and circuit breaker states"),
    )
)]
pub struct ApiDoc;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

/// Wire the order service to PostgreSQL and the HTTP product service.
pub fn build_order_service(pool: DbPool, config: &Config) -> Result<OrderService, reqwest::Error> {
    let repo = Arc::new(DieselOrderRepository::new(pool));
    let client = HttpProductClient::new(&config.products_base_url, config.products_timeout)?;
    let gate = ProductGate::new(
        Arc::new(client),
        Arc::new(BreakerRegistry::new(config.breaker.clone())),
        config.products_timeout,
    );
    Ok(OrderService::new(repo.clone(), repo, gate))
}

/// Register the API routes, the health endpoint and the OpenAPI UI.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.configure(handlers::orders::configure)
        .route("/health", web::get().to(handlers::health::health))
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: OrderService,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(service);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .configure(configure_app)
    })
    .bind((host.to_string(), port))?
    .run())
}
