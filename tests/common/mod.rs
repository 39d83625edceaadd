#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use vidscribe::cache::MemoryCache;
use vidscribe::media::{FetchOptions, FetchSettings, FetchTool, Transcoder};
use vidscribe::pipeline::{Collaborators, PipelineSettings, TranscriptPipeline};
use vidscribe::transcribe::SpeechToText;
use vidscribe::transport::Transport;
use vidscribe::{PipelineError, Result};

/// Fetch tool answering metadata from a table and "downloading" by writing placeholder files.
#[derive(Default)]
pub struct FakeFetchTool {
    metadata: HashMap<String, String>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, FetchOptions)>>,
}

impl FakeFetchTool {
    pub fn with_metadata(mut self, url: &str, json: &str) -> Self {
        self.metadata.insert(url.to_string(), json.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, FetchOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|(url, _)| url).collect()
    }
}

#[async_trait]
impl FetchTool for FakeFetchTool {
    async fn run(&self, url: &str, options: &FetchOptions) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        if self.failing.contains(url) {
            return Err(PipelineError::Fetch(format!("unsupported site: {}", url)).into());
        }

        if options.dump_single_json {
            return self
                .metadata
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::Error::from(PipelineError::Fetch(format!("no metadata for {}", url))));
        }

        if let Some(output) = &options.output {
            let ext = options.audio_format.as_deref().unwrap_or("mp4");
            let path = output.to_string_lossy().replace("%(ext)s", ext);
            fs_err::write(path, format!("media for {}", url))?;
        }
        Ok(String::new())
    }
}

/// Transport serving canned text bodies
#[derive(Default)]
pub struct FakeTransport {
    bodies: HashMap<String, String>,
    reachable: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    pub fn reachable(mut self, url: &str) -> Self {
        self.reachable.insert(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.bodies.get(url).cloned().ok_or_else(|| {
            anyhow::Error::from(PipelineError::CaptionDownload {
                url: url.to_string(),
                status: 404,
            })
        })
    }

    async fn probe(&self, url: &str) -> bool {
        self.reachable.contains(url)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.requests.lock().unwrap().push(url.to_string());
        fs_err::write(dest, b"raw mp4")?;
        Ok(())
    }
}

/// Transcoder that writes a fake mp3 and remembers its inputs.
/// A failing one writes half an mp3 before reporting the error.
#[derive(Default)]
pub struct FakeTranscoder {
    failing: bool,
    inputs: Mutex<Vec<PathBuf>>,
}

impl FakeTranscoder {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        self.inputs.lock().unwrap().push(input.to_path_buf());
        if !input.exists() {
            return Err(PipelineError::Transcode(format!("{} missing", input.display())).into());
        }
        if self.failing {
            fs_err::write(output, b"ID3 trunc")?;
            return Err(PipelineError::Transcode("encoder exited with status 1".to_string()).into());
        }
        fs_err::write(output, b"ID3 fake audio")?;
        Ok(())
    }
}

/// Speech-to-text returning a fixed transcript
pub struct FakeSpeech {
    text: String,
    calls: Mutex<usize>,
}

impl FakeSpeech {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        assert!(!audio.is_empty());
        *self.calls.lock().unwrap() += 1;
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct Harness {
    pub tool: Arc<FakeFetchTool>,
    pub transport: Arc<FakeTransport>,
    pub transcoder: Arc<FakeTranscoder>,
    pub speech: Option<Arc<FakeSpeech>>,
    pub cache: Arc<MemoryCache>,
    pub work_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(tool: FakeFetchTool, transport: FakeTransport, speech: Option<FakeSpeech>) -> Self {
        Self::with_transcoder(tool, transport, FakeTranscoder::default(), speech)
    }

    pub fn with_transcoder(
        tool: FakeFetchTool,
        transport: FakeTransport,
        transcoder: FakeTranscoder,
        speech: Option<FakeSpeech>,
    ) -> Self {
        Self {
            tool: Arc::new(tool),
            transport: Arc::new(transport),
            transcoder: Arc::new(transcoder),
            speech: speech.map(Arc::new),
            cache: Arc::new(MemoryCache::new()),
            work_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn pipeline(&self) -> TranscriptPipeline {
        let collaborators = Collaborators {
            fetch_tool: self.tool.clone(),
            transport: self.transport.clone(),
            transcoder: self.transcoder.clone(),
            speech: self
                .speech
                .clone()
                .map(|s| s as Arc<dyn SpeechToText>),
            cache: self.cache.clone(),
        };
        let settings = PipelineSettings {
            work_dir: self.work_dir.path().join("media"),
            cache_namespace: "test/transcripts".to_string(),
            fetch: FetchSettings::default(),
        };
        TranscriptPipeline::new(collaborators, settings).unwrap()
    }
}

pub fn metadata_json(title: &str, categories: &[&str]) -> String {
    serde_json::json!({
        "title": title,
        "description": format!("About {}", title),
        "channel": "Test Channel",
        "categories": categories,
    })
    .to_string()
}
