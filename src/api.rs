//! HTTP client for the portfolio backend.
//!
//! `PortfolioApi` is the seam the list manager and overview loader are
//! written against; `ApiClient` is the reqwest implementation.

use crate::error::ApiError;
use crate::history::PortfolioHistoryDay;
use crate::portfolio::{Portfolio, PortfolioDraft, PortfolioId};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[async_trait]
pub trait PortfolioApi: Send + Sync {
    /// `GET /portfolio-summary`
    async fn portfolio_summary(&self) -> Result<Vec<Portfolio>, ApiError>;

    /// `GET /portfolio-history`
    async fn portfolio_history(&self) -> Result<Vec<PortfolioHistoryDay>, ApiError>;

    /// `GET /portfolio`
    async fn list_portfolios(&self) -> Result<Vec<Portfolio>, ApiError>;

    /// `POST /portfolio`
    async fn create_portfolio(&self, draft: &PortfolioDraft) -> Result<Portfolio, ApiError>;

    /// `PUT /portfolio/{id}`
    async fn update_portfolio(
        &self,
        id: &PortfolioId,
        draft: &PortfolioDraft,
    ) -> Result<Portfolio, ApiError>;

    /// `DELETE /portfolio/{id}`
    async fn delete_portfolio(&self, id: &PortfolioId) -> Result<(), ApiError>;

    /// `POST /portfolio/{id}/archive`
    async fn archive_portfolio(&self, id: &PortfolioId) -> Result<(), ApiError>;

    /// `POST /portfolio/{id}/unarchive`
    async fn unarchive_portfolio(&self, id: &PortfolioId) -> Result<(), ApiError>;
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.endpoint(path);
        tracing::debug!(%method, %url, "api request");
        self.client.request(method, url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?.error_for_status()?;
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PortfolioApi for ApiClient {
    async fn portfolio_summary(&self) -> Result<Vec<Portfolio>, ApiError> {
        self.fetch(self.request(Method::GET, "portfolio-summary"))
            .await
    }

    async fn portfolio_history(&self) -> Result<Vec<PortfolioHistoryDay>, ApiError> {
        self.fetch(self.request(Method::GET, "portfolio-history"))
            .await
    }

    async fn list_portfolios(&self) -> Result<Vec<Portfolio>, ApiError> {
        self.fetch(self.request(Method::GET, "portfolio")).await
    }

    async fn create_portfolio(&self, draft: &PortfolioDraft) -> Result<Portfolio, ApiError> {
        self.fetch(self.request(Method::POST, "portfolio").json(draft))
            .await
    }

    async fn update_portfolio(
        &self,
        id: &PortfolioId,
        draft: &PortfolioDraft,
    ) -> Result<Portfolio, ApiError> {
        self.fetch(
            self.request(Method::PUT, &format!("portfolio/{id}"))
                .json(draft),
        )
        .await
    }

    async fn delete_portfolio(&self, id: &PortfolioId) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("portfolio/{id}")))
            .await?;
        Ok(())
    }

    async fn archive_portfolio(&self, id: &PortfolioId) -> Result<(), ApiError> {
        self.send(self.request(Method::POST, &format!("portfolio/{id}/archive")))
            .await?;
        Ok(())
    }

    async fn unarchive_portfolio(&self, id: &PortfolioId) -> Result<(), ApiError> {
        self.send(self.request(Method::POST, &format!("portfolio/{id}/unarchive")))
            .await?;
        Ok(())
    }
}
