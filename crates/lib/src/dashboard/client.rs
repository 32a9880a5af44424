//! Dashboard client: `GET /dashboard?level=<level>`.

use super::model::DashboardData;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("dashboard request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("dashboard api error: {0}")]
    Api(String),
    #[error("dashboard response not decodable: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct DashboardClient {
    base_url: String,
    client: reqwest::Client,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the precomputed summary for `level`. Non-2xx and undecodable bodies are errors.
    pub async fn fetch(&self, level: &str) -> Result<DashboardData, DashboardError> {
        let url = format!("{}/dashboard", self.base_url);
        log::info!("fetching dashboard level={}", level);
        let res = self
            .client
            .get(&url)
            .query(&[("level", level)])
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(DashboardError::Api(format!("{} {}", status, body)));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
