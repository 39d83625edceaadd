use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{commit, staging_file};
use crate::{PipelineError, Result};

/// External audio/video conversion engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Drop the video stream of `input` and write MP3 audio to `output`.
    /// Failures must surface as [`PipelineError::Transcode`].
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Convert a local container to `<same stem>.mp3` next to it.
/// A failed encode leaves no file at the output path.
pub async fn to_audio(transcoder: &dyn Transcoder, input: &Path) -> Result<PathBuf> {
    let output = input.with_extension("mp3");
    tracing::info!(input = %input.display(), output = %output.display(), "Transcoding to mp3");

    let staging = staging_file(&output)?;
    transcoder.extract_audio(input, staging.path()).await?;
    commit(staging, &output)?;
    Ok(output)
}

/// [`Transcoder`] backed by the ffmpeg binary
pub struct Ffmpeg {
    ffmpeg_path: String,
}

impl Ffmpeg {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        tracing::debug!("Converting {} to MP3", input.display());

        let result = Command::new(&self.ffmpeg_path)
            .args([
                "-i", &input.to_string_lossy(),
                "-vn", // No video
                "-acodec", "libmp3lame",
                "-ab", "128k",
                "-ar", "44100",
                "-y", // Overwrite output file
                &output.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| PipelineError::Transcode(format!("Failed to launch {}: {}", self.ffmpeg_path, e)))?;

        if !result.status.success() {
            let error = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::Transcode(format!(
                "ffmpeg failed on {}: {}",
                input.display(),
                error.trim()
            ))
            .into());
        }

        Ok(())
    }
}
