// src/client.rs
//
// =============================================================================
// CNCMARKET: REST CLIENT (v 0.3 )
// =============================================================================
//
// The marketplace backend over HTTP/JSON.
//
// Responsibilities:
// 1. Implement `CatalogBackend` (search, filters, detail) for the loader.
// 2. Expose the rest of the API surface used by the CLI: auth, dealer
//    authoring, admin moderation, downloads and trial licenses.
// 3. Attach the session's bearer token to every request.

use crate::backend::CatalogBackend;
use crate::config::ClientConfig;
use crate::core::{
    AuthUser, FilterCriteria, FilterOptions, License, LoginRequest, Product, ProductDraft,
    ProductId, PublicationStatus, SearchPage, SearchRequest, UserId,
};
use crate::error::BackendError;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

type ApiResult<T> = std::result::Result<T, BackendError>;

pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Builds a client from configuration.
    pub fn new(config: &ClientConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> ApiResult<Response> {
        let response = self.authorize(req).send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(BackendError::from_status(status, body))
        }
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let response = self.send(req).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    // --- Auth ---

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<AuthUser> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.json(self.client.post(self.url("/auth/login")).json(&body))
            .await
    }

    // --- Products ---

    pub async fn all_products(&self) -> ApiResult<Vec<Product>> {
        self.json(self.client.get(self.url("/products"))).await
    }

    pub async fn my_products(&self) -> ApiResult<Vec<Product>> {
        self.json(self.client.get(self.url("/products/my"))).await
    }

    pub async fn create_product(&self, draft: &ProductDraft) -> ApiResult<Product> {
        self.json(self.client.post(self.url("/products")).json(draft))
            .await
    }

    pub async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> ApiResult<Product> {
        self.json(
            self.client
                .put(self.url(&format!("/products/{}", id)))
                .json(draft),
        )
        .await
    }

    pub async fn update_status(
        &self,
        id: ProductId,
        status: PublicationStatus,
    ) -> ApiResult<Product> {
        let url = self.url(&format!("/products/{}/status", id));
        self.json(self.client.patch(url).query(&[("status", status.as_wire())]))
            .await
    }

    pub async fn record_download(&self, id: ProductId) -> ApiResult<()> {
        self.send(self.client.post(self.url(&format!("/products/{}/download", id))))
            .await?;
        Ok(())
    }

    pub async fn delete_product(&self, id: ProductId) -> ApiResult<()> {
        self.send(self.client.delete(self.url(&format!("/products/{}", id))))
            .await?;
        Ok(())
    }

    // --- Licenses ---

    pub async fn issue_trial(&self, user: UserId, product: ProductId) -> ApiResult<License> {
        let req = self.client.post(self.url("/licenses/trial")).query(&[
            ("userId", user.0.to_string()),
            ("productId", product.0.to_string()),
        ]);
        self.json(req).await
    }

    pub async fn user_licenses(&self, user: UserId) -> ApiResult<Vec<License>> {
        self.json(self.client.get(self.url(&format!("/licenses/user/{}", user))))
            .await
    }
}

#[async_trait]
impl CatalogBackend for HttpBackend {
    async fn search(
        &self,
        criteria: &FilterCriteria,
        page: usize,
        size: usize,
    ) -> ApiResult<SearchPage> {
        let body = SearchRequest {
            criteria,
            page,
            size,
        };
        self.json(self.client.post(self.url("/products/search")).json(&body))
            .await
    }

    async fn filters(&self) -> ApiResult<FilterOptions> {
        self.json(self.client.get(self.url("/products/filters")))
            .await
    }

    async fn product(&self, id: ProductId) -> ApiResult<Product> {
        self.json(self.client.get(self.url(&format!("/products/{}", id))))
            .await
    }
}
