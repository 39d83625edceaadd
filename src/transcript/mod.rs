//! Transcript acquisition.
//!
//! Sources are tried in a fixed order and the first applicable one wins:
//! manual subtitles, automatic captions, the music short-circuit, then speech-to-text
//! over locally produced audio. Only the absence of subtitle/caption metadata moves
//! the resolver down the list; a failed subtitle or caption download is an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod parsers;

pub use parsers::{parse_captions, parse_srt};

use crate::media::{select_track_url, MediaFetcher, TrackDescriptor, VideoInfo};
use crate::transcribe::SpeechToText;
use crate::transport::Transport;
use crate::{PipelineError, Result};

pub const NO_LYRICS: &str = "No lyrics available.";
pub const CAPTION_PARSE_FAILED: &str = "Error: Unable to parse captions";
pub const EMPTY_TRANSCRIPTION: &str = "No transcript available.";

const MUSIC_CATEGORY: &str = "Music";

/// Where the transcript text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    ManualSubtitles,
    AutomaticCaptions,
    MusicShortCircuit,
    AudioTranscription,
}

impl fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptSource::ManualSubtitles => write!(f, "manual subtitles"),
            TranscriptSource::AutomaticCaptions => write!(f, "automatic captions"),
            TranscriptSource::MusicShortCircuit => write!(f, "music short-circuit"),
            TranscriptSource::AudioTranscription => write!(f, "audio transcription"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub source: TranscriptSource,
    pub text: String,
}

/// A track counts as present only if one of its renditions can be downloaded.
fn has_rendition(tracks: Option<&[TrackDescriptor]>) -> bool {
    tracks.is_some_and(|t| select_track_url(t, "").is_some())
}

pub struct TranscriptResolver {
    transport: Arc<dyn Transport>,
    fetcher: Arc<MediaFetcher>,
    speech: Option<Arc<dyn SpeechToText>>,
    language: String,
}

impl TranscriptResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        fetcher: Arc<MediaFetcher>,
        speech: Option<Arc<dyn SpeechToText>>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            fetcher,
            speech,
            language: language.into(),
        }
    }

    /// Decide which source applies to `info` without touching the network.
    pub fn select_source(&self, info: &VideoInfo) -> TranscriptSource {
        if has_rendition(info.subtitle_track(&self.language)) {
            TranscriptSource::ManualSubtitles
        } else if has_rendition(info.caption_track(&self.language)) {
            TranscriptSource::AutomaticCaptions
        } else if info.has_category(MUSIC_CATEGORY) {
            TranscriptSource::MusicShortCircuit
        } else {
            TranscriptSource::AudioTranscription
        }
    }

    /// Produce transcript text for the video at `url` described by `info`.
    pub async fn resolve(&self, url: &str, info: &VideoInfo) -> Result<Transcript> {
        let source = self.select_source(info);
        tracing::info!(url, %source, "Resolving transcript");

        let text = match source {
            TranscriptSource::ManualSubtitles => self.from_subtitles(info).await?,
            TranscriptSource::AutomaticCaptions => self.from_captions(info).await?,
            TranscriptSource::MusicShortCircuit => NO_LYRICS.to_string(),
            TranscriptSource::AudioTranscription => self.from_audio(url).await?,
        };

        Ok(Transcript { source, text })
    }

    async fn from_subtitles(&self, info: &VideoInfo) -> Result<String> {
        let track_url = info
            .subtitle_track(&self.language)
            .and_then(|t| select_track_url(t, "srt"))
            .ok_or_else(|| PipelineError::Unknown("Subtitle track vanished".to_string()))?;

        let payload = self.transport.get_text(track_url).await?;
        Ok(parse_srt(&payload))
    }

    async fn from_captions(&self, info: &VideoInfo) -> Result<String> {
        let track_url = info
            .caption_track(&self.language)
            .and_then(|t| select_track_url(t, "json3"))
            .ok_or_else(|| PipelineError::Unknown("Caption track vanished".to_string()))?;

        let payload = self.transport.get_text(track_url).await?;
        match parse_captions(&payload) {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(url = track_url, error = %e, "Caption payload unreadable");
                Ok(CAPTION_PARSE_FAILED.to_string())
            }
        }
    }

    async fn from_audio(&self, url: &str) -> Result<String> {
        let speech = self
            .speech
            .as_ref()
            .ok_or(PipelineError::TranscriptionUnavailable)?;

        let audio_path = self.fetcher.fetch_audio(url).await?;
        let audio = tokio::fs::read(&audio_path)
            .await
            .map_err(|e| PipelineError::Fetch(format!("Cannot read {}: {}", audio_path.display(), e)))?;

        tracing::info!(url, bytes = audio.len(), backend = speech.name(), "Transcribing audio");
        let text = speech.transcribe(audio).await?;
        if text.trim().is_empty() {
            return Ok(EMPTY_TRANSCRIPTION.to_string());
        }
        Ok(text)
    }
}
