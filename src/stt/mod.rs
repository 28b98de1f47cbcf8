//! Speech-to-text via the Google Cloud Speech v1 REST API.
//!
//! Transcription never fails the request: every transport, auth, or codec
//! problem is logged and surfaces to the handler as an empty transcript,
//! which upstream turns into a "couldn't understand" reply.

use crate::config::SttConfig;
use crate::credentials::GoogleCredentials;
use crate::language::Language;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizeAlternative {
    #[serde(default)]
    transcript: String,
}

/// Google Cloud speech recognizer.
#[derive(Debug, Clone)]
pub struct SpeechRecognizer {
    api_url: String,
    sample_rate_hz: u32,
    credentials: Option<GoogleCredentials>,
    client: reqwest::Client,
}

impl SpeechRecognizer {
    pub fn new(config: &SttConfig, credentials: Option<GoogleCredentials>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            api_url: config.api_url.clone(),
            sample_rate_hz: config.sample_rate_hz,
            credentials,
            client,
        }
    }

    /// Override the endpoint (used by tests with a mock server).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Transcribe browser-recorded audio. Empty string means "no result".
    pub async fn transcribe(&self, audio: &[u8], language: Language) -> String {
        if audio.is_empty() {
            return String::new();
        }
        let Some(credentials) = &self.credentials else {
            warn!("no Google credentials configured, skipping transcription");
            return String::new();
        };

        let workdir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "could not create STT temp dir");
                return String::new();
            }
        };

        let wav = match self.prepare_wav(audio, workdir.path()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "could not prepare audio for transcription");
                return String::new();
            }
        };

        let transcript = match self.recognize(&wav, language, credentials).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "transcription request failed");
                return String::new();
            }
        };

        check_script(&transcript, language);
        info!(%language, chars = transcript.len(), "transcription complete");
        transcript
    }

    /// Write the uploaded audio and convert it to 16 kHz mono LINEAR16.
    ///
    /// Browsers upload webm/opus; when ffmpeg is unavailable the raw bytes
    /// go through unconverted and the API gets to make of them what it can.
    async fn prepare_wav(&self, audio: &[u8], workdir: &Path) -> std::io::Result<Vec<u8>> {
        let input = workdir.join("recording.webm");
        tokio::fs::write(&input, audio).await?;

        let wav = workdir.join("recording.wav");
        let result = Command::new("ffmpeg")
            .args([
                "-y",
                "-i",
                &input.to_string_lossy(),
                "-ar",
                &self.sample_rate_hz.to_string(),
                "-ac",
                "1",
                &wav.to_string_lossy(),
            ])
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => tokio::fs::read(&wav).await,
            Ok(output) => {
                warn!(
                    status = %output.status,
                    "ffmpeg conversion failed, sending raw audio"
                );
                Ok(audio.to_vec())
            }
            Err(e) => {
                warn!(error = %e, "ffmpeg unavailable, sending raw audio");
                Ok(audio.to_vec())
            }
        }
    }

    async fn recognize(
        &self,
        wav: &[u8],
        language: Language,
        credentials: &GoogleCredentials,
    ) -> crate::error::Result<String> {
        let body = serde_json::json!({
            "config": {
                "encoding": "LINEAR16",
                "sampleRateHertz": self.sample_rate_hz,
                "languageCode": language.locale_code(),
                "alternativeLanguageCodes": language.alt_locale_codes(),
                "enableAutomaticPunctuation": true,
            },
            "audio": {
                "content": BASE64.encode(wav),
            },
        });

        let url = format!("{}/v1/speech:recognize", self.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(credentials.access_token())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::error::MitraError::Stt(format!(
                "recognize failed: HTTP {status}: {}",
                body.chars().take(300).collect::<String>()
            )));
        }

        let parsed: RecognizeResponse = response.json().await?;
        let transcript = join_transcripts(&parsed);
        debug!(results = parsed.results.len(), "STT response parsed");
        Ok(transcript)
    }
}

fn join_transcripts(response: &RecognizeResponse) -> String {
    response
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Advisory script check on the transcript. Warns when a Hindi or Telugu
/// transcript carries no characters of the expected script; the transcript
/// is still returned unchanged.
fn check_script(transcript: &str, language: Language) {
    if transcript.is_empty() || !language.requires_voice_lock() {
        return;
    }
    if language.script_fraction(transcript) == 0.0 {
        warn!(
            %language,
            "transcript has no characters in the expected script"
        );
    }
}
