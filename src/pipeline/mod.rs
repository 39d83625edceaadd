use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub mod queue;

pub use queue::{JobHandle, JobQueue, UrlProcessor};

use crate::cache::{CacheGateway, CacheStore, FileCache, TranscriptRecord};
use crate::config::Config;
use crate::identity::content_id_for_url;
use crate::media::{FetchSettings, FetchTool, Ffmpeg, MediaFetcher, Transcoder, YtDlp};
use crate::transcribe::{AwsTranscriber, SpeechToText};
use crate::transcript::TranscriptResolver;
use crate::transport::{HttpTransport, Transport};
use crate::Result;

/// External capabilities the pipeline is wired to.
///
/// `speech` is optional: without it, videos that need audio transcription fail with
/// [`crate::PipelineError::TranscriptionUnavailable`].
#[derive(Clone)]
pub struct Collaborators {
    pub fetch_tool: Arc<dyn FetchTool>,
    pub transport: Arc<dyn Transport>,
    pub transcoder: Arc<dyn Transcoder>,
    pub speech: Option<Arc<dyn SpeechToText>>,
    pub cache: Arc<dyn CacheStore>,
}

/// Non-capability settings of a pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub work_dir: PathBuf,
    pub cache_namespace: String,
    pub fetch: FetchSettings,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            work_dir: config.media.work_dir(),
            cache_namespace: config.cache.namespace.clone(),
            fetch: FetchSettings {
                verbose: config.media.verbose_fetch,
                check_certificates: config.media.check_certificates,
                prefer_free_formats: config.media.prefer_free_formats,
                subtitle_language: config.media.subtitle_language.clone(),
            },
        }
    }
}

/// URL -> transcript record, memoized per content identifier
pub struct TranscriptPipeline {
    cache: CacheGateway,
    fetcher: Arc<MediaFetcher>,
    resolver: TranscriptResolver,
}

impl TranscriptPipeline {
    /// Wire a pipeline from explicit collaborators. Creates the work directory if absent.
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Result<Self> {
        fs_err::create_dir_all(&settings.work_dir).context("Failed to create work directory")?;

        let language = settings.fetch.subtitle_language.clone();
        let fetcher = Arc::new(MediaFetcher::new(
            collaborators.fetch_tool,
            collaborators.transport.clone(),
            collaborators.transcoder,
            settings.work_dir,
            settings.fetch,
        ));
        let resolver = TranscriptResolver::new(
            collaborators.transport,
            fetcher.clone(),
            collaborators.speech,
            language,
        );

        Ok(Self {
            cache: CacheGateway::new(collaborators.cache, settings.cache_namespace),
            fetcher,
            resolver,
        })
    }

    /// Wire the production collaborators: yt-dlp, ffmpeg, reqwest, an on-disk record
    /// cache and, when a bucket is configured, AWS Transcribe.
    pub async fn from_config(config: &Config, show_progress: bool) -> Result<Self> {
        let speech = AwsTranscriber::from_config(&config.aws, show_progress)
            .await
            .map(|t| Arc::new(t) as Arc<dyn SpeechToText>);
        if speech.is_none() {
            tracing::warn!("No S3 bucket configured, audio transcription fallback is disabled");
        }

        let collaborators = Collaborators {
            fetch_tool: Arc::new(YtDlp::new(config.media.yt_dlp_path.clone())),
            transport: Arc::new(HttpTransport::new()),
            transcoder: Arc::new(Ffmpeg::new(config.media.ffmpeg_path.clone())),
            speech,
            cache: Arc::new(FileCache::new(config.cache.dir())?),
        };

        Self::new(collaborators, PipelineSettings::from_config(config))
    }

    pub fn fetcher(&self) -> &MediaFetcher {
        &self.fetcher
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    /// Resolve `url` to its transcript record, running the full pipeline only on a cache miss.
    pub async fn resolve(&self, url: &str) -> Result<TranscriptRecord> {
        let id = content_id_for_url(url);

        if let Some(record) = self.cache.get(&id).await? {
            tracing::info!(url, %id, "Cache hit");
            return Ok(record);
        }
        tracing::info!(url, %id, "Cache miss, running pipeline");

        let info = self.fetcher.fetch_metadata(url).await?;
        let transcript = self.resolver.resolve(url, &info).await?;

        let record = TranscriptRecord {
            id: id.clone(),
            url: url.to_string(),
            title: info.title().to_string(),
            source: info.source().to_string(),
            description: info.description().to_string(),
            text: transcript.text,
        };

        self.cache.set(&id, &record).await?;
        tracing::info!(url, %id, source = %transcript.source, "Transcript record stored");

        Ok(record)
    }
}

#[async_trait]
impl UrlProcessor for TranscriptPipeline {
    async fn process(&self, url: &str) -> Result<TranscriptRecord> {
        self.resolve(url).await
    }
}
