use anyhow::{Context, Result};
use aws_types::region::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "vidscribe";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Media retrieval settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Transcript record cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Job queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// AWS Transcribe speech-to-text backend
    #[serde(default)]
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory for `<id>.mp4` / `<id>.mp3` artifacts
    pub work_dir: Option<PathBuf>,

    pub yt_dlp_path: String,

    pub ffmpeg_path: String,

    /// Pass `--verbose` to the fetch tool
    pub verbose_fetch: bool,

    pub check_certificates: bool,

    pub prefer_free_formats: bool,

    /// Language key looked up in subtitle and caption maps
    pub subtitle_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory of the on-disk record store
    pub dir: Option<PathBuf>,

    /// Key prefix for transcript records
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Per-job timeout in seconds; unset means jobs may run indefinitely
    pub job_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,

    /// S3 bucket for temporary audio storage; empty disables speech-to-text
    pub s3_bucket: String,

    /// Optional S3 key prefix
    pub s3_key_prefix: Option<String>,

    /// Transcription language (auto-detect if not specified)
    pub language: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            verbose_fetch: false,
            check_certificates: true,
            prefer_free_formats: false,
            subtitle_language: "en".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            namespace: "vidscribe/transcripts".to_string(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            s3_bucket: String::new(),
            s3_key_prefix: Some("vidscribe/".to_string()),
            language: None,
        }
    }
}

impl AwsConfig {
    pub fn region(&self) -> Region {
        Region::new(self.region.clone())
    }
}

fn default_data_dir(leaf: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(leaf)
}

impl MediaConfig {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| default_data_dir("media"))
    }
}

impl CacheConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| default_data_dir("records"))
    }
}

impl QueueConfig {
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join(APP_DIR).join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let namespace = &self.cache.namespace;
        if namespace.is_empty() {
            anyhow::bail!("Cache namespace must not be empty");
        }
        if namespace.starts_with('/') || namespace.ends_with('/') {
            anyhow::bail!("Cache namespace must not start or end with '/': {}", namespace);
        }
        if self.media.subtitle_language.is_empty() {
            anyhow::bail!("Subtitle language must not be empty");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Work Dir: {}", self.media.work_dir().display());
        println!("  yt-dlp: {}", self.media.yt_dlp_path);
        println!("  ffmpeg: {}", self.media.ffmpeg_path);
        println!("  Subtitle Language: {}", self.media.subtitle_language);
        println!("  Cache Dir: {}", self.cache.dir().display());
        println!("  Cache Namespace: {}", self.cache.namespace);
        match self.queue.job_timeout_secs {
            Some(secs) => println!("  Job Timeout: {}s", secs),
            None => println!("  Job Timeout: none"),
        }
        if self.aws.s3_bucket.is_empty() {
            println!("  Speech-to-text: disabled (no S3 bucket)");
        } else {
            println!("  AWS Region: {}", self.aws.region);
            println!("  S3 Bucket: {}", self.aws.s3_bucket);
            if let Some(prefix) = &self.aws.s3_key_prefix {
                println!("  S3 Prefix: {}", prefix);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = Config::from_yaml("queue:\n  job_timeout_secs: 90\naws:\n  s3_bucket: media-bucket\n").unwrap();
        assert_eq!(config.queue.job_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.aws.s3_bucket, "media-bucket");
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.cache.namespace, "vidscribe/transcripts");
        assert_eq!(config.media.subtitle_language, "en");
    }

    #[test]
    fn test_rejects_bad_namespace() {
        assert!(Config::from_yaml("cache:\n  namespace: \"\"\n").is_err());
        assert!(Config::from_yaml("cache:\n  namespace: /abs\n").is_err());
    }

    #[test]
    fn test_default_roundtrips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let config = Config::from_yaml(&yaml).unwrap();
        assert!(config.aws.s3_bucket.is_empty());
        assert_eq!(config.media.yt_dlp_path, "yt-dlp");
    }
}
