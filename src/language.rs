//! Supported spoken languages and their provider dispatch table.
//!
//! Every stage of one request (STT hint, LLM response-language instruction,
//! TTS voice selection, lip-sync input) is driven by the same [`Language`]
//! value. Keeping the set closed replaces the scattered string comparisons
//! of ad hoc implementations with a single dispatch table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// The closed set of supported spoken languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Telugu,
}

/// TTS engines a language is allowed to use, in preference order.
///
/// Hindi and Telugu structurally omit [`TtsEngine::System`]: falling back to
/// the platform voice would silently produce English-accented audio for
/// those languages, so the candidate list simply never contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsEngine {
    /// Google Cloud Text-to-Speech (locale-locked Standard voices).
    GoogleCloud,
    /// Local FastPitch + HiFi-GAN models driven through a python script.
    NeuralModel,
    /// Free translate.google.com endpoint (best effort, no credentials).
    OnlineTranslate,
    /// Platform speech engine (`say`, PowerShell SpeechSynthesizer, espeak).
    System,
}

impl Language {
    /// Parse a language name or short code. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" | "en" | "en-us" => Some(Self::English),
            "hindi" | "hi" | "hi-in" => Some(Self::Hindi),
            "telugu" | "te" | "te-in" => Some(Self::Telugu),
            _ => None,
        }
    }

    /// Primary provider locale code (STT and TTS).
    pub fn locale_code(self) -> &'static str {
        match self {
            Self::English => "en-US",
            Self::Hindi => "hi-IN",
            Self::Telugu => "te-IN",
        }
    }

    /// Alternative locale codes offered to the STT API after the primary.
    pub fn alt_locale_codes(self) -> &'static [&'static str] {
        match self {
            Self::English => &["en"],
            Self::Hindi => &["hi"],
            Self::Telugu => &["te"],
        }
    }

    /// Two-letter code used by the online translate TTS endpoint.
    pub fn short_code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Telugu => "te",
        }
    }

    /// Preferred cloud voice: a fixed male Standard voice per locale.
    pub fn preferred_voice(self) -> &'static str {
        match self {
            Self::English => "en-US-Standard-D",
            Self::Hindi => "hi-IN-Standard-B",
            Self::Telugu => "te-IN-Standard-B",
        }
    }

    /// Unicode block of the language's native script, when it has one
    /// distinct from Latin. Used for advisory-only validation.
    pub fn script_range(self) -> Option<RangeInclusive<char>> {
        match self {
            Self::English => None,
            Self::Hindi => Some('\u{0900}'..='\u{097F}'),
            Self::Telugu => Some('\u{0C00}'..='\u{0C7F}'),
        }
    }

    /// Ordered TTS engine candidates for this language.
    ///
    /// For Hindi/Telugu the cloud engine is mandatory-first; the neural and
    /// online engines are consulted only when cloud credentials are
    /// structurally absent (see `tts::TtsRouter`).
    pub fn tts_engines(self) -> &'static [TtsEngine] {
        match self {
            Self::English => &[TtsEngine::System],
            Self::Hindi | Self::Telugu => &[
                TtsEngine::GoogleCloud,
                TtsEngine::NeuralModel,
                TtsEngine::OnlineTranslate,
            ],
        }
    }

    /// Whether a failed cloud synthesis must abort the whole reply rather
    /// than degrade to a placeholder.
    pub fn requires_voice_lock(self) -> bool {
        matches!(self, Self::Hindi | Self::Telugu)
    }

    /// Fraction of non-whitespace characters in `text` that fall inside the
    /// language's native script range. Returns 1.0 for English (no range).
    pub fn script_fraction(self, text: &str) -> f32 {
        let Some(range) = self.script_range() else {
            return 1.0;
        };
        let mut total = 0usize;
        let mut in_script = 0usize;
        for c in text.chars() {
            if c.is_whitespace() {
                continue;
            }
            total += 1;
            if range.contains(&c) {
                in_script += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        in_script as f32 / total as f32
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::English => "english",
            Self::Hindi => "hindi",
            Self::Telugu => "telugu",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn parse_accepts_names_and_short_codes() {
        assert_eq!(Language::parse("Hindi"), Some(Language::Hindi));
        assert_eq!(Language::parse("te"), Some(Language::Telugu));
        assert_eq!(Language::parse(" en "), Some(Language::English));
        assert_eq!(Language::parse("klingon"), None);
    }

    #[test]
    fn hindi_and_telugu_never_list_the_system_engine() {
        for lang in [Language::Hindi, Language::Telugu] {
            assert!(!lang.tts_engines().contains(&TtsEngine::System));
            assert_eq!(lang.tts_engines()[0], TtsEngine::GoogleCloud);
        }
    }

    #[test]
    fn english_uses_only_the_system_engine() {
        assert_eq!(Language::English.tts_engines(), &[TtsEngine::System]);
        assert!(!Language::English.requires_voice_lock());
    }

    #[test]
    fn script_fraction_measures_native_characters() {
        let frac = Language::Telugu.script_fraction("నమస్కారం hello");
        assert!(frac > 0.5 && frac < 1.0, "got {frac}");
        assert_eq!(Language::Hindi.script_fraction("plain english"), 0.0);
        assert_eq!(Language::English.script_fraction("anything"), 1.0);
    }
}
