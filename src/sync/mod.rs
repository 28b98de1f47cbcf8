//! Response synchronization: attach audio and mouth cues to each utterance.
//!
//! Runs synthesis and viseme extraction for every utterance of a reply
//! concurrently, joining on index so the client receives utterances in the
//! order the model produced them. All scratch files live in a per-request
//! temp directory named by a fresh uuid, so concurrent requests can never
//! collide and cleanup is RAII on every exit path.

use crate::error::{MitraError, Result};
use crate::language::Language;
use crate::lipsync::LipSyncExtractor;
use crate::reply::{AudioFormat, MouthCueTimeline, Reply, Utterance};
use crate::tts::{TtsRouter, silent_wav_placeholder};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::future::join_all;
use std::path::Path;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Attaches synthesized audio and lip-sync timelines to replies.
#[derive(Debug, Clone)]
pub struct ResponseSynchronizer {
    tts: TtsRouter,
    lipsync: LipSyncExtractor,
}

impl ResponseSynchronizer {
    pub fn new(tts: TtsRouter, lipsync: LipSyncExtractor) -> Self {
        Self { tts, lipsync }
    }

    /// Fill in audio, audio format and mouth cues for every utterance.
    ///
    /// English degrades per-utterance to a silent placeholder; Hindi and
    /// Telugu propagate the first synthesis failure, since serving them
    /// unvoiced or wrongly voiced would break the language guarantee.
    pub async fn synchronize(&self, reply: Reply, language: Language) -> Result<Reply> {
        let request_dir = tempfile::Builder::new()
            .prefix(&format!("mitra-{}", Uuid::new_v4()))
            .tempdir()?;

        let Reply {
            messages: pending,
            images,
            user_message,
        } = reply;

        let jobs = pending.into_iter().enumerate().map(|(index, utterance)| {
            let workdir = request_dir.path().join(format!("utterance_{index}"));
            async move {
                let voiced = self.process_utterance(utterance, language, &workdir).await;
                (index, voiced)
            }
        });

        let mut results = join_all(jobs).await;
        results.sort_by_key(|(index, _)| *index);

        let mut messages = Vec::with_capacity(results.len());
        for (_, result) in results {
            messages.push(result?);
        }

        if language.requires_voice_lock() {
            // Should be unreachable: the per-utterance path either voices
            // the utterance or errors. Flag loudly if it ever regresses.
            for (index, utterance) in messages.iter().enumerate() {
                if utterance.audio.is_empty() {
                    error!(index, %language, "voiced reply is missing audio");
                }
            }
        }

        info!(%language, utterances = messages.len(), "reply synchronized");
        Ok(Reply {
            messages,
            images,
            user_message,
        })
    }

    async fn process_utterance(
        &self,
        mut utterance: Utterance,
        language: Language,
        workdir: &Path,
    ) -> Result<Utterance> {
        tokio::fs::create_dir_all(workdir).await?;

        // Audio strictly first: the viseme timeline is derived from the
        // exact bytes the client will play.
        let (audio, format) = match self.tts.synthesize(&utterance.text, language).await {
            Ok(synthesis) => (synthesis.audio, synthesis.format),
            Err(e) if language.requires_voice_lock() => {
                error!(%language, error = %e, "synthesis failed for voice-locked language");
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "English synthesis failed, using silent placeholder");
                utterance.audio = BASE64.encode(silent_wav_placeholder());
                utterance.audio_format = AudioFormat::Wav;
                utterance.lipsync = MouthCueTimeline::placeholder();
                return Ok(utterance);
            }
        };

        let extension = match format {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        };
        let audio_path = workdir.join(format!("speech.{extension}"));
        tokio::fs::write(&audio_path, &audio).await?;

        utterance.lipsync = self.lipsync.extract(&audio_path, format, workdir).await;
        utterance.audio = BASE64.encode(&audio);
        utterance.audio_format = format;
        Ok(utterance)
    }
}
