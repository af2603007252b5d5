use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};

use crate::credentials;
use crate::domain::ports::{ProductClient, ProductClientError};
use crate::domain::product::Product;

/// Product service client over HTTP/JSON.
///
/// - `GET  {base}/api/products/{id}`: 404 or an empty body means "no such product"
/// - `PUT  {base}/api/products/{id}/stock?quantity={q}`
///
/// The caller's `Authorization` header, when one is in scope, is forwarded on
/// both calls.
#[derive(Debug, Clone)]
pub struct HttpProductClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProductClient {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, id: i64) -> String {
        format!("{}/api/products/{}", self.base_url, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match credentials::current() {
            Some(credential) => request.header(AUTHORIZATION, credential),
            None => request,
        }
    }
}

fn transport(e: reqwest::Error) -> ProductClientError {
    ProductClientError::Transport(e.to_string())
}

#[async_trait]
impl ProductClient for HttpProductClient {
    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, ProductClientError> {
        let url = self.product_url(id);
        log::debug!("GET {}", url);

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProductClientError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        if body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ProductClientError::Decode(e.to_string()))
    }

    async fn decrement_stock(&self, id: i64, quantity: i32) -> Result<(), ProductClientError> {
        let url = format!("{}/stock", self.product_url(id));
        log::debug!("PUT {}?quantity={}", url, quantity);

        let response = self
            .authorize(self.http.put(&url).query(&[("quantity", quantity)]))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProductClientError::Status {
                status: status.as_u16(),
            })
        }
    }
}
