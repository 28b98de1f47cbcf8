//! Text-to-speech routing across synthesis engines.
//!
//! English goes to the platform synthesizer. Hindi and Telugu are locked to
//! locale-pinned voices: Google Cloud TTS when credentials are configured,
//! otherwise local neural models and then the keyless online endpoint. A
//! configured cloud engine that fails is never silently replaced, since the
//! fallbacks cannot guarantee the locale lock the cloud voice provides.

pub mod google;
pub mod neural;
pub mod online;
pub mod system;

use crate::config::TtsConfig;
use crate::credentials::GoogleCredentials;
use crate::error::{MitraError, Result};
use crate::language::{Language, TtsEngine};
use crate::reply::AudioFormat;
use std::time::Duration;
use tracing::{info, warn};

pub use google::{GoogleTts, GoogleTtsConfig, VoiceInfo};
pub use neural::NeuralTts;
pub use online::OnlineTts;
pub use system::{SystemTts, silent_wav_placeholder};

/// Result of one successful synthesis.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub audio: Vec<u8>,
    pub format: AudioFormat,
    pub engine: TtsEngine,
}

/// Decide which engines to attempt, in order.
///
/// For voice-locked languages a configured cloud engine is the only
/// candidate: its failures must surface rather than degrade into an
/// engine that could voice the text in the wrong language. Without cloud
/// credentials the neural and online engines are candidates only when
/// fallbacks are explicitly enabled; otherwise the plan is empty and the
/// request fails instead of degrading.
pub fn plan_engines(
    language: Language,
    cloud_configured: bool,
    neural_available: bool,
    fallbacks_enabled: bool,
) -> Vec<TtsEngine> {
    language
        .tts_engines()
        .iter()
        .copied()
        .filter(|engine| match engine {
            TtsEngine::GoogleCloud => cloud_configured,
            TtsEngine::NeuralModel => {
                !cloud_configured && fallbacks_enabled && neural_available
            }
            TtsEngine::OnlineTranslate => !cloud_configured && fallbacks_enabled,
            TtsEngine::System => true,
        })
        .collect()
}

/// Language-aware TTS dispatcher with retry.
#[derive(Debug, Clone)]
pub struct TtsRouter {
    config: TtsConfig,
    google: Option<GoogleTts>,
    neural: NeuralTts,
    online: OnlineTts,
    system: SystemTts,
}

impl TtsRouter {
    pub fn new(config: TtsConfig, credentials: Option<GoogleCredentials>) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let google = credentials.map(|creds| {
            GoogleTts::new(GoogleTtsConfig::new(config.api_url.clone(), timeout), creds)
        });
        let neural = NeuralTts::new(config.neural_models_dir.clone(), timeout);
        let online = OnlineTts::new(timeout);
        Self {
            config,
            google,
            neural,
            online,
            system: SystemTts::new(),
        }
    }

    /// Swap in a pre-built Google client (used by tests with a mock server).
    pub fn with_google(mut self, google: GoogleTts) -> Self {
        self.google = Some(google);
        self
    }

    /// Whether a cloud TTS client is configured.
    pub fn cloud_configured(&self) -> bool {
        self.google.is_some()
    }

    /// Synthesize one utterance, retrying the engine chain on failure.
    pub async fn synthesize(&self, text: &str, language: Language) -> Result<Synthesis> {
        if language.requires_voice_lock() {
            let fraction = language.script_fraction(text);
            if fraction < self.config.script_warn_threshold {
                // Advisory only. The voice stays locked to the locale even
                // for transliterated or mixed text.
                warn!(
                    %language,
                    script_fraction = fraction,
                    "text is mostly outside the expected script"
                );
            }
        }

        let engines = plan_engines(
            language,
            self.google.is_some(),
            self.neural.is_available(language),
            self.config.enable_fallback_engines,
        );
        if engines.is_empty() {
            return Err(MitraError::Tts(format!(
                "no synthesis engine available for {language}"
            )));
        }

        let mut last_err = MitraError::Tts("synthesis not attempted".to_string());
        for attempt in 0..=self.config.max_retries {
            for &engine in &engines {
                match self.try_engine(engine, text, language).await {
                    Ok(synthesis) => {
                        if attempt > 0 {
                            info!(%language, ?engine, attempt, "synthesis succeeded after retry");
                        }
                        return Ok(synthesis);
                    }
                    Err(e) => {
                        warn!(%language, ?engine, attempt, error = %e, "synthesis attempt failed");
                        last_err = e;
                    }
                }
            }
            // Only rate-limit-class failures are worth another pass; other
            // errors are deterministic and propagate straight away.
            if !last_err.is_rate_limit() {
                return Err(last_err);
            }
            if attempt < self.config.max_retries && self.config.retry_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }
        Err(last_err)
    }

    async fn try_engine(
        &self,
        engine: TtsEngine,
        text: &str,
        language: Language,
    ) -> Result<Synthesis> {
        let (audio, format) = match engine {
            TtsEngine::GoogleCloud => {
                let Some(google) = &self.google else {
                    return Err(MitraError::Tts("cloud TTS not configured".to_string()));
                };
                (google.synthesize(text, language).await?, AudioFormat::Mp3)
            }
            TtsEngine::NeuralModel => {
                (self.neural.synthesize(text, language).await?, AudioFormat::Wav)
            }
            TtsEngine::OnlineTranslate => {
                (self.online.synthesize(text, language).await?, AudioFormat::Mp3)
            }
            TtsEngine::System => self.system.synthesize(text).await?,
        };
        if audio.is_empty() {
            return Err(MitraError::EmptyAudioContent {
                locale: language.locale_code().to_string(),
            });
        }
        Ok(Synthesis {
            audio,
            format,
            engine,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn english_uses_system_only() {
        assert_eq!(
            plan_engines(Language::English, true, true, true),
            vec![TtsEngine::System]
        );
        assert_eq!(
            plan_engines(Language::English, false, false, false),
            vec![TtsEngine::System]
        );
    }

    #[test]
    fn locked_language_with_cloud_uses_cloud_only() {
        // A failing configured cloud engine must propagate, never degrade.
        assert_eq!(
            plan_engines(Language::Hindi, true, true, true),
            vec![TtsEngine::GoogleCloud]
        );
    }

    #[test]
    fn locked_language_without_cloud_has_no_engines_by_default() {
        for language in [Language::Hindi, Language::Telugu] {
            for neural in [true, false] {
                assert!(
                    plan_engines(language, false, neural, false).is_empty(),
                    "{language} must fail without cloud credentials"
                );
            }
        }
    }

    #[test]
    fn enabled_fallbacks_try_neural_then_online() {
        assert_eq!(
            plan_engines(Language::Telugu, false, true, true),
            vec![TtsEngine::NeuralModel, TtsEngine::OnlineTranslate]
        );
        assert_eq!(
            plan_engines(Language::Telugu, false, false, true),
            vec![TtsEngine::OnlineTranslate]
        );
    }

    #[test]
    fn locked_language_never_plans_system_engine() {
        for language in [Language::Hindi, Language::Telugu] {
            for cloud in [true, false] {
                for neural in [true, false] {
                    for fallbacks in [true, false] {
                        assert!(
                            !plan_engines(language, cloud, neural, fallbacks)
                                .contains(&TtsEngine::System),
                            "{language} must never reach the system engine"
                        );
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn synthesize_fails_for_locked_language_without_credentials() {
        let router = TtsRouter::new(TtsConfig::default(), None);
        let err = router
            .synthesize("नमस्ते", Language::Hindi)
            .await
            .unwrap_err();
        assert!(matches!(err, MitraError::Tts(_)));
    }
}
