//! `HttpProductClient` against a stub product service bound to a free port.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use purchase_order_service::credentials;
use purchase_order_service::domain::ports::{ProductClient, ProductClientError};
use purchase_order_service::infrastructure::HttpProductClient;

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    path: String,
    query: String,
    authorization: Option<String>,
}

type Log = web::Data<Mutex<Vec<Seen>>>;

fn record(log: &Log, req: &HttpRequest) {
    log.lock().unwrap().push(Seen {
        path: req.path().to_string(),
        query: req.query_string().to_string(),
        authorization: req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
}

async fn get_product(req: HttpRequest, path: web::Path<i64>, log: Log) -> HttpResponse {
    record(&log, &req);
    match path.into_inner() {
        1 => HttpResponse::Ok().json(json!({
            "id": 1,
            "name": "Keyboard",
            "price": 100.10,
            "stock": 10,
            "active": true
        })),
        2 => HttpResponse::Ok().json(json!({
            "id": 2,
            "name": "Mouse",
            "price": "49.99",
            "stock": 3
        })),
        // Found, but with nothing in the body.
        3 => HttpResponse::Ok().finish(),
        4 => HttpResponse::Ok().body("not json"),
        500 => HttpResponse::InternalServerError().finish(),
        _ => HttpResponse::NotFound().finish(),
    }
}

#[derive(Deserialize)]
struct StockParams {
    quantity: i32,
}

async fn put_stock(
    req: HttpRequest,
    path: web::Path<i64>,
    params: web::Query<StockParams>,
    log: Log,
) -> HttpResponse {
    record(&log, &req);
    if path.into_inner() == 1 && params.quantity <= 10 {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::BadRequest().finish()
    }
}

/// Starts the stub and returns its base URL plus the request log.
async fn start_stub() -> (String, Arc<Mutex<Vec<Seen>>>) {
    let log: Log = web::Data::new(Mutex::new(Vec::new()));
    let shared = log.clone().into_inner();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(log.clone())
            .route("/api/products/{id}", web::get().to(get_product))
            .route("/api/products/{id}/stock", web::put().to(put_stock))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind stub");
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());

    (format!("http://{}", addr), shared)
}

fn client(base_url: &str) -> HttpProductClient {
    HttpProductClient::new(base_url, Duration::from_secs(2)).expect("client builds")
}

#[actix_web::test]
async fn fetch_decodes_numeric_and_string_prices() {
    let (base, _log) = start_stub().await;
    let client = client(&base);

    let keyboard = client.fetch_product(1).await.unwrap().expect("product 1 exists");
    let mouse = client.fetch_product(2).await.unwrap().expect("product 2 exists");

    assert_eq!(keyboard.name, "Keyboard");
    assert_eq!(keyboard.price, BigDecimal::from_str("100.10").unwrap());
    assert_eq!(keyboard.stock, 10);
    assert_eq!(mouse.price, BigDecimal::from_str("49.99").unwrap());
    assert!(mouse.active);
}

#[actix_web::test]
async fn not_found_and_empty_body_mean_no_product() {
    let (base, _log) = start_stub().await;
    let client = client(&base);

    assert!(client.fetch_product(99).await.unwrap().is_none());
    assert!(client.fetch_product(3).await.unwrap().is_none());
}

#[actix_web::test]
async fn server_error_and_bad_json_are_errors() {
    let (base, _log) = start_stub().await;
    let client = client(&base);

    assert!(matches!(
        client.fetch_product(500).await,
        Err(ProductClientError::Status { status: 500 })
    ));
    assert!(matches!(
        client.fetch_product(4).await,
        Err(ProductClientError::Decode(_))
    ));
}

#[actix_web::test]
async fn unreachable_service_is_a_transport_error() {
    // Bind then drop a listener so nothing is accepting on the port.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = client(&format!("http://127.0.0.1:{}", port));

    assert!(matches!(
        client.fetch_product(1).await,
        Err(ProductClientError::Transport(_))
    ));
}

#[actix_web::test]
async fn decrement_sends_quantity_as_query_parameter() {
    let (base, log) = start_stub().await;
    let client = client(&base);

    client.decrement_stock(1, 3).await.expect("decrement accepted");
    let rejected = client.decrement_stock(1, 11).await;

    assert!(matches!(rejected, Err(ProductClientError::Status { status: 400 })));
    let seen = log.lock().unwrap().clone();
    assert_eq!(seen[0].path, "/api/products/1/stock");
    assert_eq!(seen[0].query, "quantity=3");
}

#[actix_web::test]
async fn scoped_credential_is_forwarded_on_both_calls() {
    let (base, log) = start_stub().await;
    let client = client(&base);

    credentials::scope(Some("Bearer t0k3n".to_string()), async {
        client.fetch_product(1).await.unwrap();
        client.decrement_stock(1, 1).await.unwrap();
    })
    .await;
    client.fetch_product(1).await.unwrap();

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer t0k3n"));
    assert_eq!(seen[1].authorization.as_deref(), Some("Bearer t0k3n"));
    assert_eq!(seen[2].authorization, None, "no credential outside the scope");
}
