//! Application-level configuration loading: slide layout, storage backend and worker tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/quiz.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_CONDUCTOR_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
/// Where the quiz records are kept.
pub enum StorageConfig {
    /// Records are lost when the process exits.
    Memory,
    /// JSON snapshot on disk, reloaded at startup.
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// File extensions used to classify question media.
pub struct MediaTypes {
    pub audio: Vec<String>,
    pub image: Vec<String>,
    pub video: Vec<String>,
}

impl Default for MediaTypes {
    fn default() -> Self {
        let list = |exts: &[&str]| exts.iter().map(|ext| ext.to_string()).collect();
        Self {
            audio: list(&["mp3", "m4a", "ogg", "wav"]),
            image: list(&["jpg", "jpeg", "png", "gif", "webp"]),
            video: list(&["mp4", "mov", "webm"]),
        }
    }
}

/// How a media file is shown on a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Text,
    Audio,
    Image,
    Video,
}

impl MediaKind {
    /// Code used by the slide renderer.
    pub fn code(self) -> &'static str {
        match self {
            MediaKind::Text => "T",
            MediaKind::Audio => "A",
            MediaKind::Image => "P",
            MediaKind::Video => "V",
        }
    }

    /// Images and videos need a slide of their own.
    pub fn needs_own_slide(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

impl MediaTypes {
    /// Classify a file by its extension; unknown extensions are shown as text.
    pub fn kind_of(&self, file: &str) -> MediaKind {
        let Some((_, ext)) = file.rsplit_once('.') else {
            return MediaKind::Text;
        };
        let ext = ext.to_ascii_lowercase();
        if self.image.contains(&ext) {
            MediaKind::Image
        } else if self.video.contains(&ext) {
            MediaKind::Video
        } else if self.audio.contains(&ext) {
            MediaKind::Audio
        } else {
            MediaKind::Text
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub slide_items: usize,
    /// Teams listed on the leaderboard; 0 lists every team.
    pub top_teams: u32,
    /// Teams submit answers online and the quizmaster follows their responses.
    pub online: bool,
    pub storage: StorageConfig,
    pub gate_timeout: Option<Duration>,
    pub worker_queue: usize,
    pub upload_wait: Duration,
    pub media: MediaTypes,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        slide_items = app_config.slide_items,
                        storage = ?app_config.storage,
                        "loaded quiz configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    slide_items: usize,
    top_teams: u32,
    online: bool,
    storage: StorageConfig,
    #[serde_as(as = "Option<DurationSeconds<u64>>", no_default)]
    gate_timeout_secs: Option<Duration>,
    worker_queue: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    upload_wait_secs: Duration,
    media: MediaTypes,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            slide_items: 10,
            top_teams: 0,
            online: true,
            storage: StorageConfig::Memory,
            gate_timeout_secs: Some(Duration::from_secs(5)),
            worker_queue: 16,
            upload_wait_secs: Duration::from_secs(30),
            media: MediaTypes::default(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            // a single item per slide leaves no room for headings
            slide_items: value.slide_items.max(2),
            top_teams: value.top_teams,
            online: value.online,
            storage: value.storage,
            gate_timeout: value.gate_timeout_secs,
            worker_queue: value.worker_queue.max(1),
            upload_wait: value.upload_wait_secs,
            media: value.media,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "slide_items": 6, "storage": { "backend": "file", "path": "data/q.json" } }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.slide_items, 6);
        assert_eq!(
            config.storage,
            StorageConfig::File {
                path: PathBuf::from("data/q.json")
            }
        );
        assert!(config.online);
        assert_eq!(config.gate_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.upload_wait, Duration::from_secs(30));
    }

    #[test]
    fn durations_in_seconds() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "gate_timeout_secs": null, "upload_wait_secs": 2 }"#)
                .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.gate_timeout, None);
        assert_eq!(config.upload_wait, Duration::from_secs(2));
    }

    #[test]
    fn media_kind_by_extension() {
        let media = MediaTypes::default();
        assert_eq!(media.kind_of("map.PNG"), MediaKind::Image);
        assert_eq!(media.kind_of("clip.mp4"), MediaKind::Video);
        assert_eq!(media.kind_of("theme.mp3"), MediaKind::Audio);
        assert_eq!(media.kind_of("notes"), MediaKind::Text);
        assert!(MediaKind::Image.needs_own_slide());
        assert!(!MediaKind::Audio.needs_own_slide());
    }
}
