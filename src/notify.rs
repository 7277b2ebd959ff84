//! Chat notifications with preview images.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SlackConfig;
use crate::error::{Error, Result};
use crate::frame::file_name_of;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub image: PathBuf,
    pub caption: String,
    pub title: String,
    pub channel: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push_image(&self, notification: &Notification) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack `files.upload` client.
pub struct SlackNotifier {
    client: Client,
    token: String,
    api_url: String,
}

impl SlackNotifier {
    pub fn new(token: String, api_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            token,
            api_url,
        })
    }

    /// `None` when no token is configured.
    pub fn from_config(config: &SlackConfig) -> Result<Option<Self>> {
        match config.token.as_deref() {
            Some(token) if !token.is_empty() => {
                Self::new(token.to_string(), config.api_url.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn decode_response(body: &str) -> Result<()> {
    let response: UploadResponse =
        serde_json::from_str(body).map_err(|e| Error::Decode(format!("upload response: {e}")))?;
    if response.ok {
        Ok(())
    } else {
        Err(Error::Http(format!(
            "upload rejected: {}",
            response.error.unwrap_or_else(|| "unknown error".into())
        )))
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn push_image(&self, notification: &Notification) -> Result<()> {
        let data = tokio::fs::read(&notification.image).await?;
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(data)
                    .file_name(file_name_of(&notification.image))
                    .mime_str("image/png")?,
            )
            .text("channels", notification.channel.clone())
            .text("title", notification.title.clone())
            .text("initial_comment", notification.caption.clone());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("{} from {}", status.as_u16(), self.api_url)));
        }
        let body = response.text().await?;
        debug!("Upload response: {}", body);
        decode_response(&body)?;
        info!("Pushed {} to #{}", notification.image.display(), notification.channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_response() {
        assert!(decode_response(r#"{"ok": true, "file": {}}"#).is_ok());
        assert!(matches!(
            decode_response(r#"{"ok": false, "error": "not_in_channel"}"#),
            Err(Error::Http(msg)) if msg.contains("not_in_channel")
        ));
        assert!(matches!(
            decode_response("<html>gateway</html>"),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_from_config_requires_token() {
        let mut config = SlackConfig::default();
        assert!(SlackNotifier::from_config(&config).unwrap().is_none());
        config.token = Some(String::new());
        assert!(SlackNotifier::from_config(&config).unwrap().is_none());
        config.token = Some("xoxb-1".into());
        assert!(SlackNotifier::from_config(&config).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_image_is_io_error() {
        let notifier =
            SlackNotifier::new("xoxb-1".into(), "http://127.0.0.1:9/upload".into()).unwrap();
        let err = notifier
            .push_image(&Notification {
                image: PathBuf::from("/nonexistent/preview.png"),
                caption: String::new(),
                title: "t".into(),
                channel: "c".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
