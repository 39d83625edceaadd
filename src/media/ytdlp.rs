use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{FetchOptions, FetchTool};
use crate::{PipelineError, Result};

/// [`FetchTool`] implemented by shelling out to yt-dlp
pub struct YtDlp {
    yt_dlp_path: String,
}

impl YtDlp {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl FetchTool for YtDlp {
    async fn run(&self, url: &str, options: &FetchOptions) -> Result<String> {
        let args = options.to_args();
        tracing::debug!(url, ?args, "Running yt-dlp");

        let output = Command::new(&self.yt_dlp_path)
            .args(&args)
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::Fetch(format!("Failed to launch {}: {}", self.yt_dlp_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Fetch(format!("yt-dlp failed for {}: {}", url, error.trim())).into());
        }

        String::from_utf8(output.stdout)
            .map_err(|e| PipelineError::Fetch(format!("yt-dlp produced non UTF-8 output: {}", e)).into())
    }
}
