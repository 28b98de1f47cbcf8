//! Local FastPitch + HiFi-GAN synthesis for Hindi and Telugu.
//!
//! Drives a Python synthesis script against locally downloaded model
//! checkpoints. Only attempted when the checkpoints for the language are
//! actually on disk; a missing model directory is a clean "unavailable"
//! rather than an error.

use crate::error::{MitraError, Result};
use crate::language::Language;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const SYNTH_SCRIPT: &str = include_str!("synthesize_tts.py");

/// Resolved checkpoint paths for one language's model pair.
#[derive(Debug, Clone)]
struct ModelPaths {
    fastpitch: PathBuf,
    fastpitch_config: PathBuf,
    hifigan: PathBuf,
    hifigan_config: PathBuf,
}

impl ModelPaths {
    fn for_language(models_dir: &Path, language: Language) -> Self {
        let base = models_dir.join(language.to_string());
        Self {
            fastpitch: base.join("fastpitch/best_model.pth"),
            fastpitch_config: base.join("fastpitch/config.json"),
            hifigan: base.join("hifigan/best_model.pth"),
            hifigan_config: base.join("hifigan/config.json"),
        }
    }

    fn present(&self) -> bool {
        self.fastpitch.is_file() && self.hifigan.is_file()
    }
}

/// Neural model TTS engine.
#[derive(Debug, Clone)]
pub struct NeuralTts {
    models_dir: PathBuf,
    timeout: Duration,
}

impl NeuralTts {
    pub fn new(models_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            models_dir: models_dir.into(),
            timeout,
        }
    }

    /// Whether model checkpoints for the language are on disk.
    pub fn is_available(&self, language: Language) -> bool {
        ModelPaths::for_language(&self.models_dir, language).present()
    }

    /// Synthesize text, returning WAV bytes.
    pub async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let paths = ModelPaths::for_language(&self.models_dir, language);
        if !paths.present() {
            return Err(MitraError::Tts(format!(
                "no neural model checkpoints for {language} under {}",
                self.models_dir.display()
            )));
        }

        let python = find_python()?;
        let workdir = tempfile::tempdir()?;
        let script_path = workdir.path().join("synthesize_tts.py");
        tokio::fs::write(&script_path, SYNTH_SCRIPT).await?;
        let out_path = workdir.path().join("speech.wav");

        info!(%language, "running neural TTS synthesis");
        let child = Command::new(&python)
            .arg(&script_path)
            .args(["--text", text])
            .args(["--model_path", &paths.fastpitch.to_string_lossy()])
            .args(["--config_path", &paths.fastpitch_config.to_string_lossy()])
            .args(["--vocoder_path", &paths.hifigan.to_string_lossy()])
            .args([
                "--vocoder_config_path",
                &paths.hifigan_config.to_string_lossy(),
            ])
            .args(["--out_path", &out_path.to_string_lossy()])
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                warn!(%language, "neural TTS synthesis timed out");
                MitraError::Tts(format!(
                    "neural TTS timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| MitraError::Tts(format!("failed to spawn {python}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MitraError::Tts(format!(
                "synthesis script exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let audio = tokio::fs::read(&out_path).await.map_err(|_| {
            MitraError::Tts("synthesis script produced no output file".to_string())
        })?;
        debug!(bytes = audio.len(), "neural TTS synthesis complete");
        Ok(audio)
    }
}

fn find_python() -> Result<String> {
    for candidate in ["python3", "python"] {
        if which::which(candidate).is_ok() {
            return Ok(candidate.to_string());
        }
    }
    Err(MitraError::Tts("python not found on PATH".to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn unavailable_without_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let engine = NeuralTts::new(dir.path(), Duration::from_secs(30));
        assert!(!engine.is_available(Language::Hindi));
        assert!(!engine.is_available(Language::Telugu));
    }

    #[test]
    fn available_when_both_checkpoints_exist() {
        let dir = tempfile::tempdir().unwrap();
        for part in ["fastpitch", "hifigan"] {
            let model_dir = dir.path().join("telugu").join(part);
            std::fs::create_dir_all(&model_dir).unwrap();
            std::fs::write(model_dir.join("best_model.pth"), b"stub").unwrap();
        }
        let engine = NeuralTts::new(dir.path(), Duration::from_secs(30));
        assert!(engine.is_available(Language::Telugu));
        assert!(!engine.is_available(Language::Hindi));
    }

    #[tokio::test]
    async fn synthesize_errors_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let engine = NeuralTts::new(dir.path(), Duration::from_secs(1));
        let err = engine.synthesize("నమస్కారం", Language::Telugu).await.unwrap_err();
        assert!(matches!(err, MitraError::Tts(_)));
    }
}
