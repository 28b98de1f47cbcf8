//! Error types for the response-assembly pipeline.

/// Top-level error type for the avatar backend.
#[derive(Debug, thiserror::Error)]
pub enum MitraError {
    /// Dialogue generation error (Gemini request or decode failure).
    #[error("dialogue error: {0}")]
    Dialogue(String),

    /// LLM quota / rate-limit exhaustion (HTTP 429 class).
    ///
    /// Handlers convert this into the canned "high demand" reply instead of
    /// surfacing an error status.
    #[error("LLM quota exhausted")]
    Quota,

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// The TTS provider reported no voices for the requested locale.
    #[error("no voices available for locale {locale}")]
    NoVoicesAvailable { locale: String },

    /// Selected voice does not belong to the requested locale.
    ///
    /// Letting this through would produce English-voiced audio mislabeled as
    /// the requested language.
    #[error("voice '{voice}' does not match locale {locale}")]
    VoiceMismatch { voice: String, locale: String },

    /// The TTS provider returned a response without audio bytes.
    #[error("no audio content returned for locale {locale}")]
    EmptyAudioContent { locale: String },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Credential resolution error.
    #[error("credential error: {0}")]
    Credentials(String),

    /// Lip-sync assembly error.
    #[error("lip-sync error: {0}")]
    LipSync(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MitraError {
    /// Errors worth an immediate retry in the TTS dispatch loop.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::Quota => true,
            Self::Tts(msg) => msg.contains("429"),
            Self::Http(e) => e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS),
            _ => false,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MitraError>;
