//! Platform speech synthesis for English.
//!
//! Uses whatever synthesizer the host OS ships: `say` on macOS, the .NET
//! `SpeechSynthesizer` via PowerShell on Windows, `espeak` elsewhere. Output
//! is transcoded to MP3 with ffmpeg when available; otherwise the native
//! format is returned as-is.

use crate::error::{MitraError, Result};
use crate::reply::AudioFormat;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// English-only system TTS engine.
#[derive(Debug, Clone, Default)]
pub struct SystemTts;

impl SystemTts {
    pub fn new() -> Self {
        Self
    }

    /// Synthesize English text with the platform synthesizer.
    pub async fn synthesize(&self, text: &str) -> Result<(Vec<u8>, AudioFormat)> {
        let workdir = tempfile::tempdir()?;

        if cfg!(target_os = "macos") {
            self.synthesize_macos(text, workdir.path()).await
        } else if cfg!(target_os = "windows") {
            self.synthesize_windows(text, workdir.path()).await
        } else {
            self.synthesize_espeak(text, workdir.path()).await
        }
    }

    async fn synthesize_macos(&self, text: &str, dir: &Path) -> Result<(Vec<u8>, AudioFormat)> {
        let aiff = dir.join("speech.aiff");
        run_tool("say", &["-o", &aiff.to_string_lossy(), text]).await?;
        match transcode_to_mp3(&aiff, dir).await {
            Ok(bytes) => Ok((bytes, AudioFormat::Mp3)),
            Err(e) => {
                // Without ffmpeg the raw AIFF still plays in most clients.
                warn!(error = %e, "ffmpeg transcode failed, returning native audio");
                Ok((tokio::fs::read(&aiff).await?, AudioFormat::Mp3))
            }
        }
    }

    async fn synthesize_windows(&self, text: &str, dir: &Path) -> Result<(Vec<u8>, AudioFormat)> {
        let wav = dir.join("speech.wav");
        let escaped = text.replace('`', "``").replace('"', "`\"").replace('$', "`$");
        let script = format!(
            r#"Add-Type -AssemblyName System.Speech
$synth = New-Object System.Speech.Synthesis.SpeechSynthesizer
$synth.Rate = 0
$synth.Volume = 100
$synth.SetOutputToWaveFile("{}")
$synth.Speak("{escaped}")
$synth.Dispose()"#,
            wav.display()
        );
        let script_path = dir.join("tts.ps1");
        tokio::fs::write(&script_path, script).await?;
        run_tool(
            "powershell",
            &[
                "-ExecutionPolicy",
                "Bypass",
                "-File",
                &script_path.to_string_lossy(),
            ],
        )
        .await?;
        Ok((tokio::fs::read(&wav).await?, AudioFormat::Wav))
    }

    async fn synthesize_espeak(&self, text: &str, dir: &Path) -> Result<(Vec<u8>, AudioFormat)> {
        which::which("espeak")
            .map_err(|_| MitraError::Tts("espeak not found on PATH".to_string()))?;

        let wav = dir.join("speech.wav");
        run_tool("espeak", &["-w", &wav.to_string_lossy(), text]).await?;
        match transcode_to_mp3(&wav, dir).await {
            Ok(bytes) => Ok((bytes, AudioFormat::Mp3)),
            Err(e) => {
                warn!(error = %e, "ffmpeg transcode failed, returning WAV");
                Ok((tokio::fs::read(&wav).await?, AudioFormat::Wav))
            }
        }
    }
}

async fn run_tool(program: &str, args: &[&str]) -> Result<()> {
    debug!(program, "running system TTS tool");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| MitraError::Tts(format!("failed to spawn {program}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MitraError::Tts(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

async fn transcode_to_mp3(input: &Path, dir: &Path) -> Result<Vec<u8>> {
    let mp3 = dir.join("speech.mp3");
    run_tool(
        "ffmpeg",
        &[
            "-i",
            &input.to_string_lossy(),
            "-y",
            &mp3.to_string_lossy(),
        ],
    )
    .await?;
    Ok(tokio::fs::read(&mp3).await?)
}

/// Minimal valid silent WAV, used when English synthesis fails entirely.
///
/// 8 kHz mono 16-bit with zero samples, matching the 44-byte header-only
/// file clients already know how to play.
pub fn silent_wav_placeholder() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    match hound::WavWriter::new(&mut cursor, spec) {
        Ok(writer) => {
            let _ = writer.finalize();
        }
        Err(e) => warn!(error = %e, "failed to build placeholder WAV"),
    }
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn placeholder_is_a_valid_empty_wav() {
        let bytes = silent_wav_placeholder();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
        assert_eq!(reader.spec().channels, 1);
    }
}
