//! Viseme extraction with rhubarb.
//!
//! Produces a [`MouthCueTimeline`] for an audio file. Extraction is strictly
//! best-effort: every failure mode degrades to a synthetic or fixed
//! placeholder timeline, because a reply with flat lips is still a reply
//! while a failed one is not. Audio synthesis errors are handled upstream;
//! this module never errors.

use crate::config::LipSyncConfig;
use crate::reply::{AudioFormat, MouthCue, MouthCueTimeline};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Values used by the synthetic fallback timeline. Real rhubarb output uses
/// the full A..H/X alphabet; the fallback sticks to common shapes.
const FALLBACK_SHAPES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

/// Byte-rate heuristic for estimating duration from file size.
const BYTES_PER_SECOND: f64 = 44_100.0;

/// Rhubarb-based viseme extractor with layered fallbacks.
#[derive(Debug, Clone)]
pub struct LipSyncExtractor {
    rhubarb_path: PathBuf,
    timeout: Duration,
    transcode_timeout: Duration,
}

impl LipSyncExtractor {
    pub fn new(config: &LipSyncConfig) -> Self {
        Self {
            rhubarb_path: config.rhubarb_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            transcode_timeout: Duration::from_secs(config.transcode_timeout_secs),
        }
    }

    /// Extract mouth cues for the audio file, degrading on any failure.
    pub async fn extract(
        &self,
        audio_path: &Path,
        format: AudioFormat,
        workdir: &Path,
    ) -> MouthCueTimeline {
        let wav_path = match self.ensure_wav(audio_path, format, workdir).await {
            Some(path) => path,
            None => {
                warn!("no usable wav for viseme extraction, using fixed placeholder");
                return MouthCueTimeline::placeholder();
            }
        };

        if which::which(&self.rhubarb_path).is_err() {
            warn!(
                rhubarb = %self.rhubarb_path.display(),
                "rhubarb not found, using synthetic timeline"
            );
            return self.synthetic_or_placeholder(&wav_path).await;
        }

        // The default recognizer is more accurate; the phonetic one is the
        // faster retry when it fails or runs long.
        let out_path = workdir.join("mouth_cues.json");
        for recognizer in [None, Some("phonetic")] {
            match self.run_rhubarb(&wav_path, &out_path, recognizer).await {
                Ok(()) => match read_timeline(&out_path).await {
                    Some(timeline) => {
                        debug!(cues = timeline.mouth_cues.len(), "rhubarb extraction complete");
                        return timeline;
                    }
                    None => {
                        warn!(?recognizer, "rhubarb produced unusable output");
                    }
                },
                Err(e) => {
                    warn!(?recognizer, error = %e, "rhubarb run failed");
                }
            }
        }

        self.synthetic_or_placeholder(&wav_path).await
    }

    /// Return a wav path for the audio, transcoding when needed.
    async fn ensure_wav(
        &self,
        audio_path: &Path,
        format: AudioFormat,
        workdir: &Path,
    ) -> Option<PathBuf> {
        if !audio_path.is_file() {
            return None;
        }
        if format == AudioFormat::Wav {
            return Some(audio_path.to_path_buf());
        }

        let wav_path = workdir.join("lipsync_input.wav");
        let run = Command::new("ffmpeg")
            .args([
                "-y",
                "-i",
                &audio_path.to_string_lossy(),
                "-ar",
                "16000",
                "-ac",
                "1",
                &wav_path.to_string_lossy(),
            ])
            .output();
        match tokio::time::timeout(self.transcode_timeout, run).await {
            Ok(Ok(output)) if output.status.success() => Some(wav_path),
            Ok(Ok(output)) => {
                warn!(
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "ffmpeg transcode for lip sync failed"
                );
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "could not spawn ffmpeg for lip sync");
                None
            }
            Err(_) => {
                warn!("ffmpeg transcode for lip sync timed out");
                None
            }
        }
    }

    async fn run_rhubarb(
        &self,
        wav_path: &Path,
        out_path: &Path,
        recognizer: Option<&str>,
    ) -> std::io::Result<()> {
        let mut cmd = Command::new(&self.rhubarb_path);
        cmd.args(["-f", "json", "-o"])
            .arg(out_path)
            .arg(wav_path);
        if let Some(r) = recognizer {
            cmd.args(["-r", r]);
        }

        info!(wav = %wav_path.display(), ?recognizer, "running rhubarb");
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "rhubarb timed out")
            })??;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "rhubarb exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn synthetic_or_placeholder(&self, wav_path: &Path) -> MouthCueTimeline {
        match tokio::fs::metadata(wav_path).await {
            Ok(meta) => synthetic_timeline(meta.len()),
            Err(_) => MouthCueTimeline::placeholder(),
        }
    }
}

/// Randomized timeline sized to the audio's estimated duration.
///
/// Duration is estimated from file size; segments are capped at 0.2 s and
/// the timeline at 20 cues so very long audio does not flood the client.
pub fn synthetic_timeline(byte_len: u64) -> MouthCueTimeline {
    let duration = byte_len as f64 / BYTES_PER_SECOND;
    if duration <= 0.0 {
        return MouthCueTimeline::placeholder();
    }

    let segment = (duration / 10.0).min(0.2);
    let mut rng = rand::thread_rng();
    let mut cues = Vec::new();
    let mut current = 0.0;
    while current < duration && cues.len() < 20 {
        let shape = FALLBACK_SHAPES[rng.gen_range(0..FALLBACK_SHAPES.len())];
        cues.push(MouthCue {
            start: current,
            end: (current + segment).min(duration),
            value: shape.to_string(),
        });
        current += segment;
    }
    MouthCueTimeline { mouth_cues: cues }
}

/// Read and validate rhubarb's JSON output. `None` means "fall back".
async fn read_timeline(path: &Path) -> Option<MouthCueTimeline> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    parse_rhubarb_output(&content)
}

/// Parse rhubarb JSON output, requiring at least one cue.
pub fn parse_rhubarb_output(json: &str) -> Option<MouthCueTimeline> {
    if json.trim().is_empty() {
        return None;
    }
    let timeline: MouthCueTimeline = serde_json::from_str(json).ok()?;
    if timeline.mouth_cues.is_empty() {
        return None;
    }
    Some(timeline)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    // ── Synthetic Timeline ─────────────────────────────────────

    #[test]
    fn synthetic_timeline_tracks_estimated_duration() {
        // ~2 seconds of audio by the size heuristic.
        let timeline = synthetic_timeline(88_200);
        assert!(!timeline.mouth_cues.is_empty());
        assert!(timeline.mouth_cues.len() <= 20);
        assert!(timeline.is_monotonic());

        let last = timeline.mouth_cues.last().unwrap();
        assert!(last.end <= 2.0 + f64::EPSILON);
        for cue in &timeline.mouth_cues {
            assert!(cue.end - cue.start <= 0.2 + f64::EPSILON);
            assert!(FALLBACK_SHAPES.contains(&cue.value.as_str()));
        }
    }

    #[test]
    fn synthetic_timeline_caps_cue_count_for_long_audio() {
        // ~60 seconds would need 300 segments; the cap holds it at 20.
        let timeline = synthetic_timeline(60 * 44_100);
        assert_eq!(timeline.mouth_cues.len(), 20);
    }

    #[test]
    fn synthetic_timeline_of_empty_file_is_fixed_placeholder() {
        assert_eq!(synthetic_timeline(0), MouthCueTimeline::placeholder());
    }

    // ── Rhubarb Output Parsing ─────────────────────────────────

    #[test]
    fn parses_rhubarb_json() {
        let json = r#"{
            "metadata": { "soundFile": "speech.wav", "duration": 1.2 },
            "mouthCues": [
                { "start": 0.00, "end": 0.35, "value": "X" },
                { "start": 0.35, "end": 0.80, "value": "B" },
                { "start": 0.80, "end": 1.20, "value": "A" }
            ]
        }"#;
        let timeline = parse_rhubarb_output(json).unwrap();
        assert_eq!(timeline.mouth_cues.len(), 3);
        assert_eq!(timeline.mouth_cues[0].value, "X");
        assert!(timeline.is_monotonic());
    }

    #[test]
    fn rejects_empty_or_cueless_output() {
        assert!(parse_rhubarb_output("").is_none());
        assert!(parse_rhubarb_output("   ").is_none());
        assert!(parse_rhubarb_output(r#"{"mouthCues": []}"#).is_none());
        assert!(parse_rhubarb_output("not json").is_none());
    }

    // ── Extractor Fallbacks ────────────────────────────────────

    #[tokio::test]
    async fn missing_audio_yields_fixed_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = LipSyncExtractor::new(&LipSyncConfig::default());
        let timeline = extractor
            .extract(&dir.path().join("absent.mp3"), AudioFormat::Mp3, dir.path())
            .await;
        assert_eq!(timeline, MouthCueTimeline::placeholder());
    }

    #[tokio::test]
    async fn missing_rhubarb_yields_synthetic_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("speech.wav");
        std::fs::write(&wav, vec![0u8; 44_100]).unwrap();

        let config = LipSyncConfig {
            rhubarb_path: dir.path().join("no-such-rhubarb"),
            ..LipSyncConfig::default()
        };
        let timeline = LipSyncExtractor::new(&config)
            .extract(&wav, AudioFormat::Wav, dir.path())
            .await;
        assert!(!timeline.mouth_cues.is_empty());
        assert!(timeline.is_monotonic());
    }
}
