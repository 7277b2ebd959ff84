//! Follow-up request status updates on the science marshal.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::MarshalConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait StatusUpdater: Send + Sync {
    async fn update_status(&self, request_id: &str, status: &str) -> Result<()>;
}

/// `Complete YYYYMMDD HH_MM_SS`, in the observatory's local time.
pub fn status_string(at: NaiveDateTime) -> String {
    format!("Complete {}", at.format("%Y%m%d %H_%M_%S"))
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    new_status: &'a str,
    followup_request_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Marshal client with retry on connection-level failures.
pub struct MarshalClient {
    client: Client,
    url: String,
    token: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl MarshalClient {
    pub fn new(config: &MarshalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.status_url.clone(),
            token: config.token.clone(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    async fn make_request(&self, body: &StatusRequest<'_>) -> Result<()> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {token}"));
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {
                let text = response.text().await?;
                let parsed: StatusResponse = serde_json::from_str(&text)
                    .map_err(|e| Error::Decode(format!("status response: {e}")))?;
                if parsed.status == "success" {
                    Ok(())
                } else {
                    Err(Error::Http(format!(
                        "status update refused: {}",
                        parsed.message.unwrap_or(parsed.status)
                    )))
                }
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::Http(format!("{} {}", status.as_u16(), text)))
            }
        }
    }

    fn calculate_backoff(&self, retry_count: u32) -> u64 {
        self.retry_delay_ms * 2u64.pow(retry_count - 1)
    }
}

#[async_trait]
impl StatusUpdater for MarshalClient {
    async fn update_status(&self, request_id: &str, status: &str) -> Result<()> {
        let body = StatusRequest {
            new_status: status,
            followup_request_id: request_id,
        };

        let mut retry_count = 0;
        loop {
            match self.make_request(&body).await {
                Ok(()) => {
                    info!("Request {} status set to {:?}", request_id, status);
                    return Ok(());
                }
                Err(e) => {
                    if retry_count >= self.max_retries || !e.is_transient() {
                        return Err(e);
                    }
                    retry_count += 1;
                    let delay = self.calculate_backoff(retry_count);
                    debug!("Status update failed ({}), retrying in {}ms", e, delay);
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}
