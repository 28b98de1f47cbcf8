//! Google Cloud Text-to-Speech client.
//!
//! Handles the locale-locked voice path for Hindi and Telugu. The voice is
//! always pinned explicitly (`languageCode` and `voice.name` both set) so
//! the API can never fall back to an English voice for mixed-script input.

use crate::credentials::GoogleCredentials;
use crate::error::{MitraError, Result};
use crate::language::Language;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Configuration ──────────────────────────────────────────────

/// Configuration for the Google TTS client.
#[derive(Debug, Clone)]
pub struct GoogleTtsConfig {
    /// Base URL for the API (defaults to `https://texttospeech.googleapis.com`).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl GoogleTtsConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ── Wire Types ─────────────────────────────────────────────────

/// One voice as reported by the `voices` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    pub name: String,
    #[serde(default)]
    pub language_codes: Vec<String>,
    #[serde(default)]
    pub ssml_gender: String,
    #[serde(default)]
    pub natural_sample_rate_hertz: u32,
}

#[derive(Debug, Deserialize)]
struct ListVoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

// ── Text Sanitization ──────────────────────────────────────────

/// Strip characters that confuse the synthesizer while preserving script
/// characters. Zero-width marks and control characters go, whitespace runs
/// collapse to single spaces.
pub fn sanitize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| {
            !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}') && (!c.is_control() || *c == '\n')
        })
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Voice Selection ────────────────────────────────────────────

/// Pick a voice for the language from the provider's reported list.
///
/// Only voices whose name carries the locale prefix are eligible; the raw
/// list can contain other locales. Preference order: the pinned per-language
/// voice, then any Standard voice of the expected gender, then the first
/// eligible voice.
pub fn select_voice(voices: &[VoiceInfo], language: Language) -> Result<VoiceInfo> {
    let locale = language.locale_code();
    let prefix = format!("{locale}-");

    let eligible: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| v.name.starts_with(&prefix))
        .collect();
    if eligible.is_empty() {
        return Err(MitraError::NoVoicesAvailable {
            locale: locale.to_string(),
        });
    }

    let preferred = language.preferred_voice();
    let selected = eligible
        .iter()
        .find(|v| v.name == preferred)
        .or_else(|| {
            eligible
                .iter()
                .find(|v| v.name.contains("Standard") && v.ssml_gender == "MALE")
        })
        .or_else(|| eligible.first())
        .copied();

    let Some(voice) = selected else {
        return Err(MitraError::NoVoicesAvailable {
            locale: locale.to_string(),
        });
    };

    // Re-check the prefix on the final pick. A bug upstream in the filter
    // would otherwise ship English-voiced audio labeled as Hindi or Telugu.
    if !voice.name.starts_with(&prefix) {
        return Err(MitraError::VoiceMismatch {
            voice: voice.name.clone(),
            locale: locale.to_string(),
        });
    }

    Ok(voice.clone())
}

// ── Client ─────────────────────────────────────────────────────

/// HTTP client for the Google Cloud TTS REST API.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    config: GoogleTtsConfig,
    credentials: GoogleCredentials,
    client: reqwest::Client,
}

impl GoogleTts {
    pub fn new(config: GoogleTtsConfig, credentials: GoogleCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            credentials,
            client,
        }
    }

    /// List voices the provider offers for a locale.
    pub async fn list_voices(&self, locale: &str) -> Result<Vec<VoiceInfo>> {
        let url = format!(
            "{}/v1/voices?languageCode={}",
            self.config.base_url,
            urlencoding::encode(locale)
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.credentials.access_token())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MitraError::Tts(format!(
                "voices list failed: HTTP {status}: {}",
                truncate(&body, 300)
            )));
        }

        let parsed: ListVoicesResponse = response.json().await?;
        debug!(locale, count = parsed.voices.len(), "listed TTS voices");
        Ok(parsed.voices)
    }

    /// Synthesize `text` with a locale-locked voice, returning MP3 bytes.
    pub async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let locale = language.locale_code();
        let voices = self.list_voices(locale).await?;
        let voice = select_voice(&voices, language)?;
        info!(locale, voice = %voice.name, "selected TTS voice");

        let clean = sanitize_text(text);
        let body = serde_json::json!({
            "input": { "text": clean },
            "voice": {
                // Both fields pinned: languageCode alone lets the API pick
                // a voice, and an unpinned pick can cross locales.
                "languageCode": locale,
                "name": voice.name,
                "ssmlGender": voice.ssml_gender,
            },
            "audioConfig": {
                "audioEncoding": "MP3",
                "speakingRate": 1.0,
                "pitch": 0.0,
            },
        });

        let url = format!("{}/v1/text:synthesize", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.credentials.access_token())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(locale, %status, "TTS synthesis request failed");
            return Err(MitraError::Tts(format!(
                "synthesis failed: HTTP {status}: {}",
                truncate(&body, 300)
            )));
        }

        let parsed: SynthesizeResponse = response.json().await?;
        if parsed.audio_content.is_empty() {
            return Err(MitraError::EmptyAudioContent {
                locale: locale.to_string(),
            });
        }

        let audio = BASE64
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| MitraError::Tts(format!("audio content is not valid base64: {e}")))?;
        if audio.is_empty() {
            return Err(MitraError::EmptyAudioContent {
                locale: locale.to_string(),
            });
        }

        debug!(locale, bytes = audio.len(), "TTS synthesis complete");
        Ok(audio)
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn voice(name: &str, gender: &str) -> VoiceInfo {
        VoiceInfo {
            name: name.to_string(),
            language_codes: Vec::new(),
            ssml_gender: gender.to_string(),
            natural_sample_rate_hertz: 24_000,
        }
    }

    // ── Voice Selection ────────────────────────────────────────

    #[test]
    fn select_prefers_pinned_voice() {
        let voices = vec![
            voice("hi-IN-Standard-A", "FEMALE"),
            voice("hi-IN-Standard-B", "MALE"),
            voice("hi-IN-Wavenet-C", "MALE"),
        ];
        let picked = select_voice(&voices, Language::Hindi).unwrap();
        assert_eq!(picked.name, "hi-IN-Standard-B");
    }

    #[test]
    fn select_falls_back_to_standard_male() {
        let voices = vec![
            voice("te-IN-Wavenet-A", "FEMALE"),
            voice("te-IN-Standard-D", "MALE"),
        ];
        let picked = select_voice(&voices, Language::Telugu).unwrap();
        assert_eq!(picked.name, "te-IN-Standard-D");
    }

    #[test]
    fn select_falls_back_to_first_eligible() {
        let voices = vec![voice("te-IN-Wavenet-A", "FEMALE")];
        let picked = select_voice(&voices, Language::Telugu).unwrap();
        assert_eq!(picked.name, "te-IN-Wavenet-A");
    }

    #[test]
    fn select_ignores_other_locales() {
        let voices = vec![
            voice("en-US-Standard-B", "MALE"),
            voice("hi-IN-Standard-A", "FEMALE"),
        ];
        let picked = select_voice(&voices, Language::Hindi).unwrap();
        assert_eq!(picked.name, "hi-IN-Standard-A");
    }

    #[test]
    fn select_errors_when_no_locale_voices() {
        let voices = vec![voice("en-US-Standard-B", "MALE")];
        let err = select_voice(&voices, Language::Telugu).unwrap_err();
        assert!(matches!(
            err,
            MitraError::NoVoicesAvailable { locale } if locale == "te-IN"
        ));
    }

    #[test]
    fn select_errors_on_empty_list() {
        let err = select_voice(&[], Language::Hindi).unwrap_err();
        assert!(matches!(err, MitraError::NoVoicesAvailable { .. }));
    }

    // ── Text Sanitization ──────────────────────────────────────

    #[test]
    fn sanitize_strips_zero_width_and_controls() {
        let input = "नमस्ते\u{200B} दुनिया\u{0007}!\nकैसे  हो";
        assert_eq!(sanitize_text(input), "नमस्ते दुनिया! कैसे हो");
    }

    #[test]
    fn sanitize_preserves_script_characters() {
        let input = "  తెలుగు   వాక్యం  ";
        assert_eq!(sanitize_text(input), "తెలుగు వాక్యం");
    }

    #[test]
    fn sanitize_collapses_newlines_to_spaces() {
        assert_eq!(sanitize_text("one\n\ntwo\nthree"), "one two three");
    }

    // ── Wire Types ─────────────────────────────────────────────

    #[test]
    fn voice_info_parses_camel_case() {
        let json = r#"{
            "languageCodes": ["hi-IN"],
            "name": "hi-IN-Standard-B",
            "ssmlGender": "MALE",
            "naturalSampleRateHertz": 24000
        }"#;
        let v: VoiceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(v.name, "hi-IN-Standard-B");
        assert_eq!(v.language_codes, vec!["hi-IN"]);
        assert_eq!(v.ssml_gender, "MALE");
    }
}
