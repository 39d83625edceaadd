use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::{PipelineError, Result};

/// Plain HTTP access used for subtitle/caption payloads and direct media files.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a text resource. A non-success status maps to [`PipelineError::CaptionDownload`].
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Whether the resource answers with a success status.
    async fn probe(&self, url: &str) -> bool;

    /// Stream a resource into `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`Transport`] backed by `reqwest`
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "Downloading text resource");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::CaptionDownload {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;
        Ok(body)
    }

    async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url, error = %e, "Probe failed");
                false
            }
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::debug!(url, path = %dest.display(), "Downloading file");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Fetch(format!("Request for {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(PipelineError::Fetch(format!(
                "HTTP {} while downloading {}",
                response.status(),
                url
            ))
            .into());
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| PipelineError::Fetch(format!("Download of {} interrupted: {}", url, e)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}
