use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_transcribe::types::{LanguageCode, Media, MediaFormat};
use aws_sdk_transcribe::Client as TranscribeClient;
use uuid::Uuid;

use crate::config::AwsConfig;
use crate::Result;

pub mod processor;

/// Host speech-to-text capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe MP3 audio bytes. An empty string means nothing was recognized.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// [`SpeechToText`] backed by AWS Transcribe, staging audio through S3
pub struct AwsTranscriber {
    s3_client: S3Client,
    transcribe_client: TranscribeClient,
    bucket: String,
    key_prefix: String,
    language: Option<String>,
    show_progress: bool,
}

impl AwsTranscriber {
    /// Build clients from the ambient AWS credential chain.
    /// Returns `None` when no bucket is configured.
    pub async fn from_config(config: &AwsConfig, show_progress: bool) -> Option<Self> {
        if config.s3_bucket.is_empty() {
            return None;
        }

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(config.region())
            .load()
            .await;

        Some(Self {
            s3_client: S3Client::new(&aws_config),
            transcribe_client: TranscribeClient::new(&aws_config),
            bucket: config.s3_bucket.clone(),
            key_prefix: config.s3_key_prefix.clone().unwrap_or_default(),
            language: config.language.clone(),
            show_progress,
        })
    }

    /// Upload audio to S3
    async fn upload(&self, audio: Vec<u8>) -> Result<String> {
        let key = format!(
            "{}audio_{}_{}.mp3",
            self.key_prefix,
            Uuid::new_v4(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        );

        tracing::info!("Uploading audio to S3: s3://{}/{}", self.bucket, key);

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(audio))
            .content_type("audio/mpeg")
            .send()
            .await
            .context("Failed to upload audio to S3")?;

        Ok(key)
    }

    /// Start an AWS Transcribe job over the uploaded object
    async fn start_job(&self, key: &str) -> Result<String> {
        let job_name = format!("vidscribe_{}", Uuid::new_v4());
        let media_uri = format!("s3://{}/{}", self.bucket, key);

        tracing::info!("Starting transcription job: {}", job_name);

        let media = Media::builder().media_file_uri(media_uri).build();
        let mut job_builder = self
            .transcribe_client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media_format(MediaFormat::Mp3)
            .media(media);

        match self.language.as_deref() {
            Some(lang) => {
                tracing::info!("Using specified language: {}", lang);
                job_builder = job_builder.language_code(LanguageCode::from(lang));
            }
            None => {
                tracing::info!("Using automatic language detection");
                job_builder = job_builder.identify_language(true);
            }
        }

        job_builder
            .send()
            .await
            .context("Failed to start transcription job")?;

        Ok(job_name)
    }

    async fn cleanup(&self, key: &str) {
        tracing::debug!("Cleaning up S3 object: {}", key);

        if let Err(e) = self
            .s3_client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            tracing::warn!(key, error = %e, "Failed to clean up S3 object");
        }
    }
}

#[async_trait]
impl SpeechToText for AwsTranscriber {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let key = self.upload(audio).await?;

        let outcome = async {
            let job_name = self.start_job(&key).await?;
            processor::TranscriptionProcessor::new(self.transcribe_client.clone(), job_name)
                .with_progress(self.show_progress)
                .wait_for_completion()
                .await
        }
        .await;

        self.cleanup(&key).await;
        outcome
    }

    fn name(&self) -> &'static str {
        "aws-transcribe"
    }
}
