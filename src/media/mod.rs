use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub mod direct;
pub mod transcoder;
pub mod ytdlp;

pub use transcoder::{Ffmpeg, Transcoder};
pub use ytdlp::YtDlp;

use crate::identity::{content_id_for_url, ContentIdentifier};
use crate::transport::Transport;
use crate::{PipelineError, Result};

/// One downloadable subtitle or caption rendition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    #[serde(default)]
    pub ext: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// Language code -> available renditions
pub type TrackMap = HashMap<String, Vec<TrackDescriptor>>;

/// Metadata reported by the fetch tool for a single video
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default)]
    pub uploader: Option<String>,

    #[serde(default)]
    pub categories: Option<Vec<String>>,

    #[serde(default)]
    pub subtitles: Option<TrackMap>,

    #[serde(default)]
    pub automatic_captions: Option<TrackMap>,

    #[serde(default)]
    pub webpage_url: Option<String>,

    #[serde(default)]
    pub original_url: Option<String>,
}

impl VideoInfo {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Channel name, falling back to the uploader
    pub fn source(&self) -> &str {
        self.channel
            .as_deref()
            .or(self.uploader.as_deref())
            .unwrap_or_default()
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories
            .as_ref()
            .is_some_and(|c| c.iter().any(|c| c == category))
    }

    /// Manual subtitle track for `lang`, if the video lists one.
    pub fn subtitle_track(&self, lang: &str) -> Option<&[TrackDescriptor]> {
        self.subtitles.as_ref()?.get(lang).map(Vec::as_slice)
    }

    /// Automatic caption track for `lang`, if the video lists one.
    pub fn caption_track(&self, lang: &str) -> Option<&[TrackDescriptor]> {
        self.automatic_captions.as_ref()?.get(lang).map(Vec::as_slice)
    }

    /// URL the video can be re-fetched from
    pub fn source_url(&self) -> Option<&str> {
        self.webpage_url.as_deref().or(self.original_url.as_deref())
    }
}

/// Pick the rendition to download: the first one with extension `preferred_ext`,
/// otherwise the first one carrying a URL.
pub fn select_track_url<'a>(tracks: &'a [TrackDescriptor], preferred_ext: &str) -> Option<&'a str> {
    tracks
        .iter()
        .find(|t| t.ext.as_deref() == Some(preferred_ext) && t.url.is_some())
        .or_else(|| tracks.iter().find(|t| t.url.is_some()))
        .and_then(|t| t.url.as_deref())
}

/// Options understood by the external fetch tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub verbose: bool,
    pub output: Option<PathBuf>,
    pub write_info_json: bool,
    pub format: Option<String>,
    pub extract_audio: bool,
    pub audio_format: Option<String>,
    pub skip_download: bool,
    pub dump_single_json: bool,
    pub sub_langs: Option<String>,
    pub write_subs: bool,
    pub write_auto_subs: bool,
    pub no_check_certificates: bool,
    pub prefer_free_formats: bool,
}

impl FetchOptions {
    /// Render as yt-dlp command-line arguments (URL not included)
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.verbose {
            args.push("--verbose".to_string());
        }
        if let Some(output) = &self.output {
            args.push("--output".to_string());
            args.push(output.to_string_lossy().into_owned());
        }
        if self.write_info_json {
            args.push("--write-info-json".to_string());
        }
        if let Some(format) = &self.format {
            args.push("--format".to_string());
            args.push(format.clone());
        }
        if self.extract_audio {
            args.push("--extract-audio".to_string());
        }
        if let Some(audio_format) = &self.audio_format {
            args.push("--audio-format".to_string());
            args.push(audio_format.clone());
        }
        if self.skip_download {
            args.push("--skip-download".to_string());
        }
        if self.dump_single_json {
            args.push("--dump-single-json".to_string());
        }
        if let Some(langs) = &self.sub_langs {
            args.push("--sub-langs".to_string());
            args.push(langs.clone());
        }
        if self.write_subs {
            args.push("--write-subs".to_string());
        }
        if self.write_auto_subs {
            args.push("--write-auto-subs".to_string());
        }
        if self.no_check_certificates {
            args.push("--no-check-certificates".to_string());
        }
        if self.prefer_free_formats {
            args.push("--prefer-free-formats".to_string());
        }
        args
    }
}

/// External video-fetch tool: network retrieval and metadata extraction
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FetchTool: Send + Sync {
    /// Run the tool against `url`, returning its standard output.
    /// Failures must surface as [`PipelineError::Fetch`].
    async fn run(&self, url: &str, options: &FetchOptions) -> Result<String>;
}

/// Knobs forwarded to every fetch-tool invocation
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub verbose: bool,
    pub check_certificates: bool,
    pub prefer_free_formats: bool,
    pub subtitle_language: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            check_certificates: true,
            prefer_free_formats: false,
            subtitle_language: "en".to_string(),
        }
    }
}

/// Scratch file beside `dest` that keeps `dest`'s extension.
/// Dropped without [`commit`] it is removed, so partial writes never land on `dest`.
pub(crate) fn staging_file(dest: &Path) -> Result<NamedTempFile> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let suffix = dest
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create staging file in {}", dir.display()))
}

/// Move a fully written staging file onto its final artifact path.
pub(crate) fn commit(staging: NamedTempFile, dest: &Path) -> Result<()> {
    staging
        .persist(dest)
        .with_context(|| format!("Failed to move finished artifact to {}", dest.display()))?;
    Ok(())
}

const DEFAULT_VIDEO_FORMAT: &str = "best[ext=mp4]/best";
const BEST_VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
const AUDIO_FORMAT: &str = "mp3";

/// Media Fetcher Adapter: metadata and local media artifacts keyed by content identifier.
///
/// Every download first checks for `<work_dir>/<id>.<ext>` and reuses it when present.
pub struct MediaFetcher {
    tool: Arc<dyn FetchTool>,
    transport: Arc<dyn Transport>,
    transcoder: Arc<dyn Transcoder>,
    work_dir: PathBuf,
    settings: FetchSettings,
}

impl MediaFetcher {
    pub fn new(
        tool: Arc<dyn FetchTool>,
        transport: Arc<dyn Transport>,
        transcoder: Arc<dyn Transcoder>,
        work_dir: impl Into<PathBuf>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            tool,
            transport,
            transcoder,
            work_dir: work_dir.into(),
            settings,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Deterministic local path for an artifact of `id`
    pub fn artifact_path(&self, id: &ContentIdentifier, ext: &str) -> PathBuf {
        self.work_dir.join(format!("{}.{}", id, ext))
    }

    fn base_options(&self) -> FetchOptions {
        FetchOptions {
            verbose: self.settings.verbose,
            no_check_certificates: !self.settings.check_certificates,
            prefer_free_formats: self.settings.prefer_free_formats,
            ..Default::default()
        }
    }

    /// Fetch structured metadata for `url`.
    ///
    /// Direct `.mp4` links that answer a probe get a synthesized record instead of
    /// going through the fetch tool; unreachable ones fall through to the tool.
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoInfo> {
        if direct::is_direct_mp4(url) {
            if self.transport.probe(url).await {
                tracing::info!(url, "Direct mp4 link, synthesizing metadata");
                return Ok(direct::synthesize_info(url));
            }
            tracing::warn!(url, "Direct mp4 link unreachable, falling back to fetch tool");
        }

        tracing::info!(url, "Fetching video metadata");
        let options = FetchOptions {
            skip_download: true,
            dump_single_json: true,
            write_subs: true,
            write_auto_subs: true,
            sub_langs: Some(self.settings.subtitle_language.clone()),
            ..self.base_options()
        };
        let stdout = self.tool.run(url, &options).await?;

        let mut info: VideoInfo = serde_json::from_str(stdout.trim())
            .map_err(|e| PipelineError::Fetch(format!("Unreadable metadata for {}: {}", url, e)))?;
        if info.original_url.is_none() {
            info.original_url = Some(url.to_string());
        }

        Ok(info)
    }

    /// Local mp4 for `url` at default quality.
    pub async fn fetch_media_container(&self, url: &str) -> Result<PathBuf> {
        let id = content_id_for_url(url);
        let path = self.artifact_path(&id, "mp4");
        if path.exists() {
            tracing::debug!(url, path = %path.display(), "Reusing local media container");
            return Ok(path);
        }

        if direct::is_direct_mp4(url) {
            tracing::info!(url, path = %path.display(), "Downloading direct media container");
            let staging = staging_file(&path)?;
            self.transport.download(url, staging.path()).await?;
            commit(staging, &path)?;
            return Ok(path);
        }

        tracing::info!(url, path = %path.display(), "Fetching media container");
        let options = FetchOptions {
            output: Some(path.clone()),
            format: Some(DEFAULT_VIDEO_FORMAT.to_string()),
            ..self.base_options()
        };
        self.run_to_file(url, &options, &path).await
    }

    /// Local mp4 holding the best available video+audio combination.
    ///
    /// The artifact is keyed by the URL the video was submitted with, so it shares
    /// `<id>.mp4` with [`MediaFetcher::fetch_media_container`] and [`MediaFetcher::fetch_audio`]
    /// even when the tool reports a normalized page URL.
    pub async fn fetch_best_quality_video(&self, info: &VideoInfo) -> Result<PathBuf> {
        let url = info
            .source_url()
            .ok_or_else(|| PipelineError::Fetch("Video metadata carries no source URL".to_string()))?;
        let id = content_id_for_url(info.original_url.as_deref().unwrap_or(url));
        let path = self.artifact_path(&id, "mp4");
        if path.exists() {
            tracing::debug!(url, path = %path.display(), "Reusing local media container");
            return Ok(path);
        }

        tracing::info!(url, path = %path.display(), "Fetching best quality video");
        let options = FetchOptions {
            output: Some(path.clone()),
            format: Some(BEST_VIDEO_FORMAT.to_string()),
            ..self.base_options()
        };
        self.run_to_file(url, &options, &path).await
    }

    /// Local mp3 for `url`, produced as cheaply as the artifacts on disk allow:
    /// an existing mp3 is returned as is, an existing mp4 is transcoded, a direct
    /// mp4 link is downloaded to a temporary directory and transcoded, and anything
    /// else has its audio extracted by the fetch tool.
    pub async fn fetch_audio(&self, url: &str) -> Result<PathBuf> {
        let id = content_id_for_url(url);
        let mp3 = self.artifact_path(&id, AUDIO_FORMAT);
        if mp3.exists() {
            tracing::debug!(url, path = %mp3.display(), "Reusing local audio");
            return Ok(mp3);
        }

        let mp4 = self.artifact_path(&id, "mp4");
        if mp4.exists() {
            return transcoder::to_audio(self.transcoder.as_ref(), &mp4).await;
        }

        if direct::is_direct_mp4(url) {
            return self.convert_direct(url, &mp3).await;
        }

        tracing::info!(url, path = %mp3.display(), "Extracting audio with fetch tool");
        let template = self.work_dir.join(format!("{}.%(ext)s", id));
        let options = FetchOptions {
            output: Some(template),
            format: Some("bestaudio/best".to_string()),
            extract_audio: true,
            audio_format: Some(AUDIO_FORMAT.to_string()),
            ..self.base_options()
        };
        self.run_to_file(url, &options, &mp3).await
    }

    /// Download a raw mp4 into a scratch directory and transcode it to `mp3`.
    /// The scratch directory is removed whether or not conversion succeeds, and
    /// `mp3` only appears once encoding finished.
    async fn convert_direct(&self, url: &str, mp3: &Path) -> Result<PathBuf> {
        let scratch = tempfile::TempDir::new()?;
        let container = scratch.path().join("source.mp4");

        tracing::info!(url, "Downloading direct media for conversion");
        let outcome = async {
            self.transport.download(url, &container).await?;
            let staging = staging_file(mp3)?;
            self.transcoder.extract_audio(&container, staging.path()).await?;
            commit(staging, mp3)
        }
        .await;

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "Failed to remove scratch directory");
        }
        outcome.map(|()| mp3.to_path_buf())
    }

    async fn run_to_file(&self, url: &str, options: &FetchOptions, expected: &Path) -> Result<PathBuf> {
        self.tool.run(url, options).await?;
        if !expected.exists() {
            return Err(PipelineError::Fetch(format!(
                "Fetch tool reported success but {} was not written",
                expected.display()
            ))
            .into());
        }
        Ok(expected.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::transcoder::MockTranscoder;
    use crate::transport::MockTransport;
    use mockall::predicate::*;

    fn fetcher(tool: MockFetchTool, transport: MockTransport, dir: &Path) -> MediaFetcher {
        MediaFetcher::new(
            Arc::new(tool),
            Arc::new(transport),
            Arc::new(MockTranscoder::new()),
            dir,
            FetchSettings::default(),
        )
    }

    #[test]
    fn test_fetch_options_to_args() {
        let options = FetchOptions {
            skip_download: true,
            dump_single_json: true,
            sub_langs: Some("en".to_string()),
            write_subs: true,
            no_check_certificates: true,
            ..Default::default()
        };
        assert_eq!(
            options.to_args(),
            vec![
                "--skip-download",
                "--dump-single-json",
                "--sub-langs",
                "en",
                "--write-subs",
                "--no-check-certificates",
            ]
        );
    }

    #[test]
    fn test_video_info_parses_tool_json() {
        let json = r#"{
            "id": "abc",
            "title": "A talk",
            "description": null,
            "uploader": "Someone",
            "categories": ["Education"],
            "subtitles": {"en": [{"ext": "vtt", "url": "https://s/1.vtt"}, {"ext": "srt", "url": "https://s/1.srt"}]},
            "automatic_captions": {},
            "webpage_url": "https://www.youtube.com/watch?v=abc"
        }"#;
        let info: VideoInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.title(), "A talk");
        assert_eq!(info.description(), "");
        assert_eq!(info.source(), "Someone");
        assert!(info.has_category("Education"));
        assert!(info.caption_track("en").is_none());

        let track = info.subtitle_track("en").unwrap();
        assert_eq!(select_track_url(track, "srt"), Some("https://s/1.srt"));
        assert_eq!(select_track_url(track, "json3"), Some("https://s/1.vtt"));
    }

    #[tokio::test]
    async fn test_fetch_metadata_maps_tool_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut tool = MockFetchTool::new();
        tool.expect_run()
            .withf(|url, opts| url == "https://www.youtube.com/watch?v=x" && opts.dump_single_json && opts.skip_download)
            .times(1)
            .returning(|_, _| Ok(r#"{"title": "T", "channel": "C"}"#.to_string()));

        let fetcher = fetcher(tool, MockTransport::new(), dir.path());
        let info = fetcher.fetch_metadata("https://www.youtube.com/watch?v=x").await.unwrap();
        assert_eq!(info.title(), "T");
        assert_eq!(info.source(), "C");
        assert_eq!(info.source_url(), Some("https://www.youtube.com/watch?v=x"));
    }

    #[tokio::test]
    async fn test_fetch_metadata_bad_json_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tool = MockFetchTool::new();
        tool.expect_run().returning(|_, _| Ok("not json".to_string()));

        let fetcher = fetcher(tool, MockTransport::new(), dir.path());
        let err = fetcher.fetch_metadata("https://example.com/v").await.unwrap_err();
        assert_eq!(PipelineError::kind_of(&err), crate::ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn test_direct_mp4_metadata_skips_tool_when_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let mut tool = MockFetchTool::new();
        tool.expect_run().times(0);
        let mut transport = MockTransport::new();
        transport
            .expect_probe()
            .with(eq("https://cdn.example.com/talks/my%20talk.mp4"))
            .times(1)
            .returning(|_| true);

        let fetcher = fetcher(tool, transport, dir.path());
        let info = fetcher
            .fetch_metadata("https://cdn.example.com/talks/my%20talk.mp4")
            .await
            .unwrap();
        assert_eq!(info.title(), "my talk.mp4");
        assert_eq!(info.description(), "");
        assert_eq!(info.source(), "");
    }

    #[tokio::test]
    async fn test_direct_mp4_metadata_falls_back_when_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let mut tool = MockFetchTool::new();
        tool.expect_run()
            .times(1)
            .returning(|_, _| Ok(r#"{"title": "From tool"}"#.to_string()));
        let mut transport = MockTransport::new();
        transport.expect_probe().times(1).returning(|_| false);

        let fetcher = fetcher(tool, transport, dir.path());
        let info = fetcher.fetch_metadata("https://cdn.example.com/a.mp4").await.unwrap();
        assert_eq!(info.title(), "From tool");
    }

    #[tokio::test]
    async fn test_fetch_media_container_reuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

        let mut tool = MockFetchTool::new();
        tool.expect_run().times(1).returning(|_, opts| {
            let out = opts.output.clone().unwrap();
            fs_err::write(out, b"video")?;
            Ok(String::new())
        });

        let fetcher = fetcher(tool, MockTransport::new(), dir.path());
        let first = fetcher.fetch_media_container(url).await.unwrap();
        let second = fetcher.fetch_media_container(url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("b071d4faecd552e3.mp4"));
    }

    #[tokio::test]
    async fn test_fetch_best_quality_video_requests_best_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut tool = MockFetchTool::new();
        tool.expect_run()
            .withf(|_, opts| opts.format.as_deref() == Some(BEST_VIDEO_FORMAT))
            .times(1)
            .returning(|_, opts| {
                fs_err::write(opts.output.clone().unwrap(), b"video")?;
                Ok(String::new())
            });

        let fetcher = fetcher(tool, MockTransport::new(), dir.path());
        let info = VideoInfo {
            webpage_url: Some("https://vimeo.com/1".to_string()),
            ..Default::default()
        };
        let path = fetcher.fetch_best_quality_video(&info).await.unwrap();
        assert!(path.exists());
        fetcher.fetch_best_quality_video(&info).await.unwrap();
    }

    #[tokio::test]
    async fn test_best_quality_video_shares_container_path_with_submitted_url() {
        let dir = tempfile::tempdir().unwrap();
        let submitted = "https://player.vimeo.com/video/1";
        let mut tool = MockFetchTool::new();
        tool.expect_run()
            .withf(|url, _| url == "https://vimeo.com/1")
            .times(1)
            .returning(|_, opts| {
                fs_err::write(opts.output.clone().unwrap(), b"video")?;
                Ok(String::new())
            });

        let fetcher = fetcher(tool, MockTransport::new(), dir.path());
        let info = VideoInfo {
            webpage_url: Some("https://vimeo.com/1".to_string()),
            original_url: Some(submitted.to_string()),
            ..Default::default()
        };
        let best = fetcher.fetch_best_quality_video(&info).await.unwrap();
        assert_eq!(best, fetcher.artifact_path(&content_id_for_url(submitted), "mp4"));
        assert_eq!(fetcher.fetch_media_container(submitted).await.unwrap(), best);
    }

    #[tokio::test]
    async fn test_interrupted_direct_download_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://cdn.example.com/clip.mp4";

        let mut broken = MockTransport::new();
        broken.expect_download().times(1).returning(|url, dest| {
            fs_err::write(dest, b"12 bytes....")?;
            Err(PipelineError::Fetch(format!("Download of {} interrupted", url)).into())
        });
        let err = fetcher(MockFetchTool::new(), broken, dir.path())
            .fetch_media_container(url)
            .await
            .unwrap_err();
        assert_eq!(PipelineError::kind_of(&err), crate::ErrorKind::Fetch);

        let leftovers: Vec<_> = fs_err::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "partial download must not survive");

        let mut healthy = MockTransport::new();
        healthy.expect_download().times(1).returning(|_, dest| {
            fs_err::write(dest, b"complete video")?;
            Ok(())
        });
        let path = fetcher(MockFetchTool::new(), healthy, dir.path())
            .fetch_media_container(url)
            .await
            .unwrap();
        assert_eq!(fs_err::read(path).unwrap(), b"complete video");
    }

    #[tokio::test]
    async fn test_tool_success_without_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tool = MockFetchTool::new();
        tool.expect_run().returning(|_, _| Ok(String::new()));

        let fetcher = fetcher(tool, MockTransport::new(), dir.path());
        let err = fetcher.fetch_media_container("https://vimeo.com/1").await.unwrap_err();
        assert_eq!(PipelineError::kind_of(&err), crate::ErrorKind::Fetch);
    }
}
