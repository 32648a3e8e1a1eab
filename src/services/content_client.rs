use crate::config::network::REQUEST_TIMEOUT;
use crate::error::{DaoError, DaoResult};
use crate::workers::ContentFetcher;
use async_trait::async_trait;
use reqwest::Client;

/// Fetches app content (background scripts) from gateways and HTTP hosts
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    client: Client,
}

impl HttpContentFetcher {
    pub fn new() -> DaoResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DaoError::operation("client_creation", e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_text(&self, url: &str) -> DaoResult<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DaoError::operation(
                "fetch",
                format!("HTTP {}: {}", response.status(), url),
            ));
        }

        Ok(response.text().await?)
    }
}
