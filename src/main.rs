use dotenvy::dotenv;
use purchase_order_service::{build_order_service, build_server, create_pool, run_migrations, Config};
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let pool = create_pool(&config.database_url, config.db_pool_size).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;

    let service = build_order_service(pool, &config).map_err(io::Error::other)?;

    log::info!(
        "Starting server at http://{}:{} (product service at {})",
        config.host,
        config.port,
        config.products_base_url
    );

    build_server(service, &config.host, config.port)?.await
}
