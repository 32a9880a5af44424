//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.ipeth/config.json`) and environment.
//! Every section has defaults pointing at the deployed services, so an empty `{}` is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Audio/text conversion service.
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Tutor chat service and identity behavior.
    #[serde(default)]
    pub tutor: TutorConfig,

    /// Analytics dashboard service.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// External recorder used for microphone capture.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Local key-value state (tutor identity).
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionConfig {
    /// Base URL for /upload-url and /agent. Overridden by IPETH_TRANSCRIPTION_URL env.
    #[serde(default = "default_transcription_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorConfig {
    /// Full chat endpoint URL. Overridden by IPETH_TUTOR_URL env.
    #[serde(default = "default_tutor_url")]
    pub chat_url: String,

    /// When true, a server-rejected identity is also removed from local state. Default: false (the token is kept).
    #[serde(default)]
    pub forget_rejected_identity: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Base URL for /dashboard. Overridden by IPETH_DASHBOARD_URL env.
    #[serde(default = "default_dashboard_url")]
    pub base_url: String,

    /// Aggregation level passed as `?level=` (default "universidad").
    #[serde(default = "default_dashboard_level")]
    pub level: String,
}

/// Recorder process settings. The recorder must write WebM/Opus to stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Recorder binary (default "ffmpeg").
    #[serde(default = "default_capture_program")]
    pub program: String,

    /// ffmpeg input format (`-f`): "pulse", "alsa", "avfoundation", "dshow".
    #[serde(default = "default_capture_input_format")]
    pub input_format: String,

    /// ffmpeg input device (`-i`), e.g. "default" or ":0".
    #[serde(default = "default_capture_device")]
    pub device: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConfig {
    /// State file path. Relative paths are resolved against the config file's parent. Default: `state.json` next to the config.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_transcription_url() -> String {
    "https://2buirz5z2l.execute-api.us-east-1.amazonaws.com".to_string()
}

fn default_tutor_url() -> String {
    "https://8oc6ik9r54.execute-api.us-east-1.amazonaws.com/Prod/chat".to_string()
}

fn default_dashboard_url() -> String {
    "https://8oc6ik9r54.execute-api.us-east-1.amazonaws.com/Prod".to_string()
}

fn default_dashboard_level() -> String {
    "universidad".to_string()
}

fn default_capture_program() -> String {
    "ffmpeg".to_string()
}

fn default_capture_input_format() -> String {
    if cfg!(target_os = "macos") {
        "avfoundation".to_string()
    } else if cfg!(windows) {
        "dshow".to_string()
    } else {
        "pulse".to_string()
    }
}

fn default_capture_device() -> String {
    if cfg!(target_os = "macos") {
        ":0".to_string()
    } else {
        "default".to_string()
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_transcription_url(),
        }
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            chat_url: default_tutor_url(),
            forget_rejected_identity: false,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_dashboard_url(),
            level: default_dashboard_level(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: default_capture_program(),
            input_format: default_capture_input_format(),
            device: default_capture_device(),
        }
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Resolve the transcription base URL: env IPETH_TRANSCRIPTION_URL overrides config.
pub fn resolve_transcription_url(config: &Config) -> String {
    normalize_url(
        &env_override("IPETH_TRANSCRIPTION_URL").unwrap_or_else(|| config.transcription.base_url.clone()),
    )
}

/// Resolve the tutor chat URL: env IPETH_TUTOR_URL overrides config.
pub fn resolve_tutor_url(config: &Config) -> String {
    normalize_url(&env_override("IPETH_TUTOR_URL").unwrap_or_else(|| config.tutor.chat_url.clone()))
}

/// Resolve the dashboard base URL: env IPETH_DASHBOARD_URL overrides config.
pub fn resolve_dashboard_url(config: &Config) -> String {
    normalize_url(
        &env_override("IPETH_DASHBOARD_URL").unwrap_or_else(|| config.dashboard.base_url.clone()),
    )
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("IPETH_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".ipeth").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Resolve the state file: `state.path` if set (relative paths resolved against the config file's parent), otherwise `state.json` next to the config.
pub fn resolve_state_path(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.state.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_parent.join(p)
            }
        }
        _ => config_parent.join("state.json"),
    }
}

/// Directory where finished microphone clips are kept: `recordings/` next to the config.
pub fn resolve_clip_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("recordings")
}

/// Load config from the given path, or the default path (or IPETH_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
