//! Keyless online synthesis via the Google Translate TTS endpoint.
//!
//! Last-resort fallback for Hindi and Telugu when no cloud credentials are
//! configured. The endpoint caps request length, so long text is split into
//! word-boundary chunks and the chunk files are concatenated with ffmpeg.

use crate::error::{MitraError, Result};
use crate::language::Language;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Per-request character cap accepted by the translate endpoint.
const MAX_CHUNK_CHARS: usize = 200;

/// Free translate-TTS fallback engine.
#[derive(Debug, Clone)]
pub struct OnlineTts {
    base_url: String,
    client: reqwest::Client,
}

impl OnlineTts {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url("https://translate.google.com", timeout)
    }

    /// Override the endpoint (used by tests with a mock server).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Synthesize text, returning MP3 bytes.
    pub async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(MitraError::Tts("no text to synthesize".to_string()));
        }

        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            parts.push(self.fetch_chunk(chunk, language).await?);
        }

        if parts.len() == 1 {
            let Some(only) = parts.into_iter().next() else {
                return Err(MitraError::Tts("no audio chunks produced".to_string()));
            };
            return Ok(only);
        }

        match concat_mp3_chunks(&parts).await {
            Ok(joined) => Ok(joined),
            Err(e) => {
                // Without ffmpeg a truncated reply beats no reply.
                warn!(error = %e, "chunk concat failed, using first chunk only");
                parts
                    .into_iter()
                    .next()
                    .ok_or_else(|| MitraError::Tts("no audio chunks produced".to_string()))
            }
        }
    }

    async fn fetch_chunk(&self, chunk: &str, language: Language) -> Result<Vec<u8>> {
        let url = format!(
            "{}/translate_tts?ie=UTF-8&tl={}&client=tw-ob&q={}",
            self.base_url,
            language.short_code(),
            urlencoding::encode(chunk)
        );
        debug!(chars = chunk.len(), "fetching online TTS chunk");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(MitraError::Tts(format!(
                "online TTS returned HTTP {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(MitraError::Tts("online TTS returned empty audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

/// Split text into chunks of at most `max_chars`, breaking on whitespace.
///
/// A single word longer than the cap becomes its own chunk rather than
/// being split mid-word.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Concatenate MP3 chunk files with `ffmpeg -f concat`.
async fn concat_mp3_chunks(parts: &[Vec<u8>]) -> Result<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let mut list = String::new();
    for (i, part) in parts.iter().enumerate() {
        let path = dir.path().join(format!("chunk_{i}.mp3"));
        tokio::fs::write(&path, part).await?;
        list.push_str(&format!("file '{}'\n", path.display()));
    }
    let list_path = dir.path().join("chunks.txt");
    tokio::fs::write(&list_path, list).await?;

    let out = dir.path().join("joined.mp3");
    run_ffmpeg_concat(&list_path, &out).await?;
    Ok(tokio::fs::read(&out).await?)
}

async fn run_ffmpeg_concat(list_path: &Path, out: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args([
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            &list_path.to_string_lossy(),
            "-c",
            "copy",
            "-y",
            &out.to_string_lossy(),
        ])
        .output()
        .await
        .map_err(|e| MitraError::Tts(format!("failed to spawn ffmpeg: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MitraError::Tts(format!(
            "ffmpeg concat exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_into_chunks("नमस्ते दुनिया", 200);
        assert_eq!(chunks, vec!["नमस्ते दुनिया"]);
    }

    #[test]
    fn long_text_splits_on_word_boundaries() {
        let word = "हिंदी ";
        let text = word.repeat(80);
        let chunks = split_into_chunks(&text, 200);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, text.trim());
    }

    #[test]
    fn oversized_word_gets_its_own_chunk() {
        let long_word = "x".repeat(250);
        let chunks = split_into_chunks(&format!("short {long_word} tail"), 200);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], long_word);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_into_chunks("   ", 200).is_empty());
    }
}
