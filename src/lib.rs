//! vidscribe - turn a video URL into a cached transcript record
//!
//! The pipeline resolves video metadata, picks the best available transcript source
//! (manual subtitles, automatic captions, or speech-to-text over extracted audio) and
//! memoizes the resulting [`TranscriptRecord`] in a host-provided cache store.
//! Submissions are serialized through a FIFO [`JobQueue`].

pub mod cache;
pub mod cli;
pub mod config;
pub mod identity;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod transcribe;
pub mod transcript;
pub mod transport;
pub mod utils;

pub use cache::{CacheGateway, CacheStore, FileCache, MemoryCache, TranscriptRecord};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use identity::{content_id_for_url, identify, ContentIdentifier};
pub use media::{FetchOptions, FetchTool, MediaFetcher, Transcoder, VideoInfo};
pub use pipeline::{Collaborators, JobQueue, TranscriptPipeline};
pub use transcribe::SpeechToText;
pub use transcript::TranscriptResolver;
pub use transport::Transport;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Failure taxonomy of the transcript pipeline.
///
/// These travel as the root cause inside [`anyhow::Error`]; use [`PipelineError::kind_of`]
/// to classify an error returned by any pipeline operation.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Media fetch failed: {0}")]
    Fetch(String),

    #[error("Audio extraction failed: {0}")]
    Transcode(String),

    #[error("Caption download failed: HTTP {status} for {url}")]
    CaptionDownload { url: String, status: u16 },

    #[error("Caption payload could not be parsed: {0}")]
    CaptionParse(String),

    #[error("No speech-to-text capability is configured")]
    TranscriptionUnavailable,

    #[error("Pipeline failed: {0}")]
    Unknown(String),
}

/// Coarse classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Transcode,
    CaptionDownload,
    CaptionParse,
    TranscriptionUnavailable,
    Unknown,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Fetch(_) => ErrorKind::Fetch,
            PipelineError::Transcode(_) => ErrorKind::Transcode,
            PipelineError::CaptionDownload { .. } => ErrorKind::CaptionDownload,
            PipelineError::CaptionParse(_) => ErrorKind::CaptionParse,
            PipelineError::TranscriptionUnavailable => ErrorKind::TranscriptionUnavailable,
            PipelineError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Classify any error produced by the pipeline. Errors that did not originate
    /// from a [`PipelineError`] are reported as [`ErrorKind::Unknown`].
    pub fn kind_of(err: &anyhow::Error) -> ErrorKind {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<PipelineError>())
            .map(PipelineError::kind)
            .unwrap_or(ErrorKind::Unknown)
    }
}
