use anyhow::{Context, Result};
use aws_sdk_transcribe::types::{TranscriptionJob, TranscriptionJobStatus};
use aws_sdk_transcribe::Client as TranscribeClient;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

/// AWS Transcribe transcript document, reduced to the parts we read
#[derive(Debug, Deserialize)]
struct AwsTranscript {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    transcripts: Vec<TranscriptText>,
}

#[derive(Debug, Deserialize)]
struct TranscriptText {
    transcript: String,
}

/// Pull the full transcript text out of a transcript document.
/// Multiple alternatives are joined with a space.
pub fn transcript_text(document: &str) -> Result<String> {
    let parsed: AwsTranscript =
        serde_json::from_str(document).context("Failed to parse transcript JSON")?;

    Ok(parsed
        .results
        .transcripts
        .into_iter()
        .map(|t| t.transcript)
        .collect::<Vec<_>>()
        .join(" "))
}

/// Backoff between status checks: 5s, growing by 2s per check, capped at 30s
fn poll_interval(check_count: u64) -> Duration {
    Duration::from_secs(std::cmp::min(5 + check_count.saturating_sub(1) * 2, 30))
}

/// Transcription job processor
pub struct TranscriptionProcessor {
    client: TranscribeClient,
    job_id: String,
    show_progress: bool,
}

impl TranscriptionProcessor {
    pub fn new(client: TranscribeClient, job_id: String) -> Self {
        Self {
            client,
            job_id,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn spinner(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            progress.set_style(style);
        }
        progress
    }

    /// Poll the job until it finishes and return its transcript text
    pub async fn wait_for_completion(&self) -> Result<String> {
        let progress = self.spinner();
        progress.set_message("Starting transcription job...");

        let start_time = std::time::Instant::now();
        let mut check_count = 0;

        let job = loop {
            check_count += 1;

            let job = self.get_transcription_job().await?;

            match job.transcription_job_status() {
                Some(TranscriptionJobStatus::InProgress) | Some(TranscriptionJobStatus::Queued) => {
                    progress.set_message(format!(
                        "Transcribing... ({}s elapsed, check #{})",
                        start_time.elapsed().as_secs(),
                        check_count
                    ));
                    sleep(poll_interval(check_count)).await;
                }
                Some(TranscriptionJobStatus::Completed) => {
                    progress.finish_with_message("Transcription completed!");
                    break job;
                }
                Some(TranscriptionJobStatus::Failed) => {
                    progress.finish_with_message("Transcription failed");

                    let failure_reason = job.failure_reason().unwrap_or("Unknown error");
                    anyhow::bail!("Transcription job failed: {}", failure_reason);
                }
                _ => {
                    progress.finish_with_message("Transcription status unknown");
                    anyhow::bail!("Unexpected transcription job status");
                }
            }
        };

        tracing::info!(
            job = %self.job_id,
            elapsed_secs = start_time.elapsed().as_secs(),
            "Transcription job completed"
        );

        let transcript_uri = job
            .transcript()
            .and_then(|t| t.transcript_file_uri())
            .ok_or_else(|| anyhow::anyhow!("No transcript URI found"))?;

        let document = self.download_transcript(transcript_uri).await?;
        transcript_text(&document)
    }

    /// Get transcription job details
    async fn get_transcription_job(&self) -> Result<TranscriptionJob> {
        let response = self
            .client
            .get_transcription_job()
            .transcription_job_name(&self.job_id)
            .send()
            .await
            .context("Failed to get transcription job status")?;

        response
            .transcription_job()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Transcription job not found"))
    }

    /// Download transcript document from its pre-signed URI
    async fn download_transcript(&self, uri: &str) -> Result<String> {
        let response = reqwest::get(uri)
            .await
            .context("Failed to download transcript")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download transcript: HTTP {}", response.status());
        }

        response
            .text()
            .await
            .context("Failed to read transcript content")
    }
}
