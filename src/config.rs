//! Configuration types for the avatar backend.

use crate::credentials::SecretRef;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, loadable from a TOML file with every section
/// optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MitraConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Gemini dialogue generation settings.
    pub dialogue: DialogueConfig,
    /// Google Speech-to-Text settings.
    pub stt: SttConfig,
    /// Text-to-speech dispatch settings.
    pub tts: TtsConfig,
    /// Lip-sync (viseme extraction) settings.
    pub lipsync: LipSyncConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// Bearer-token reference for the Google Cloud STT/TTS REST APIs.
    pub google_token: SecretRef,
}

impl Default for MitraConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            dialogue: DialogueConfig::default(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
            lipsync: LipSyncConfig::default(),
            cache: CacheConfig::default(),
            google_token: SecretRef::Env {
                var: "GOOGLE_ACCESS_TOKEN".to_owned(),
            },
        }
    }
}

impl MitraConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::MitraError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| crate::MitraError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3002,
        }
    }
}

/// Dialogue (LLM) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Gemini API base URL. Overridable for tests and proxies.
    pub api_url: String,
    /// Model identifier for avatar responses.
    pub model: String,
    /// Model identifier for chat summaries.
    pub summary_model: String,
    /// API key reference (resolved at startup).
    pub api_key: SecretRef,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Pexels stock-photo API key; when unset, topical images come from the
    /// AI image service or a placeholder.
    pub pexels_api_key: SecretRef,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_owned(),
            model: "gemini-2.5-flash".to_owned(),
            summary_model: "gemini-2.5-flash".to_owned(),
            api_key: SecretRef::Env {
                var: "GEMINI_API_KEY".to_owned(),
            },
            timeout_secs: 30,
            pexels_api_key: SecretRef::None,
        }
    }
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Google Speech API base URL.
    pub api_url: String,
    /// Sample rate the browser clip is down-mixed to before recognition.
    pub sample_rate_hz: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_url: "https://speech.googleapis.com".to_owned(),
            sample_rate_hz: 16_000,
            timeout_secs: 30,
        }
    }
}

/// Text-to-speech dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Google Cloud TTS API base URL.
    pub api_url: String,
    /// Per-utterance synthesis attempts. Historically used to ride out
    /// rate-limit errors; retries are immediate by default.
    pub max_retries: u32,
    /// Delay between retries in milliseconds. Deliberately 0 (immediate
    /// retry), not exponential backoff; treat as a tunable.
    pub retry_delay_ms: u64,
    /// Advisory threshold: below this fraction of native-script characters
    /// a warning is logged. Never changes voice selection.
    pub script_warn_threshold: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Root directory of local FastPitch + HiFi-GAN models
    /// (`<root>/<language>/fastpitch/best_model.pth` etc.).
    pub neural_models_dir: PathBuf,
    /// Allow the neural and online engines to voice Hindi/Telugu when no
    /// cloud credentials are configured. Off by default: without it a
    /// locked-language request fails instead of degrading.
    pub enable_fallback_engines: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://texttospeech.googleapis.com".to_owned(),
            max_retries: 10,
            retry_delay_ms: 0,
            script_warn_threshold: 0.5,
            timeout_secs: 30,
            neural_models_dir: PathBuf::from("models"),
            enable_fallback_engines: false,
        }
    }
}

/// Lip-sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    /// Path to the rhubarb binary. When relative, resolved against PATH and
    /// the working directory.
    pub rhubarb_path: PathBuf,
    /// Upper bound for one rhubarb run in seconds. An unbounded hang here
    /// would stall the whole reply.
    pub timeout_secs: u64,
    /// Upper bound for one ffmpeg transcode in seconds.
    pub transcode_timeout_secs: u64,
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            rhubarb_path: PathBuf::from("rhubarb"),
            timeout_secs: 60,
            transcode_timeout_secs: 30,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
    /// Sweep interval for expired entries in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: MitraConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3002);
        assert_eq!(config.tts.max_retries, 10);
        assert_eq!(config.tts.retry_delay_ms, 0);
        assert!(!config.tts.enable_fallback_engines);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: MitraConfig = toml::from_str(
            r#"
[tts]
max_retries = 3
"#,
        )
        .unwrap();
        assert_eq!(config.tts.max_retries, 3);
        assert!((config.tts.script_warn_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.server.port, 3002);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = MitraConfig::load(std::path::Path::new("/definitely/not/here.toml"))
            .expect_err("should fail");
        assert!(matches!(err, crate::MitraError::Config(_)));
    }
}
