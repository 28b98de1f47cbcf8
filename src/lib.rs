//! Mitra: conversational digital-human backend.
//!
//! This crate turns a typed question or a browser audio clip into a fully
//! voiced avatar reply:
//! Question → LLM (Gemini) → emotion-tagged utterances → TTS → lip-sync cues
//!
//! # Architecture
//!
//! The pipeline is built from independent services injected into the HTTP
//! layer:
//! - **Dialogue**: Generates structured replies via the Gemini REST API
//! - **STT**: Transcribes browser clips using Google Cloud Speech
//! - **TTS**: Dispatches per language across cloud, neural, online, and
//!   system engines
//! - **Lip-sync**: Extracts mouth-cue timelines with rhubarb, degrading to
//!   synthetic timelines rather than failing
//! - **Sync**: Runs TTS and lip-sync per utterance and reassembles the reply
//! - **Cache**: Remembers recent replies per language with a TTL sweep

pub mod cache;
pub mod config;
pub mod credentials;
pub mod dialogue;
pub mod error;
pub mod language;
pub mod lipsync;
pub mod reply;
pub mod server;
pub mod stt;
pub mod sync;
pub mod tts;

pub use cache::ResponseCache;
pub use config::MitraConfig;
pub use credentials::{GoogleCredentials, SecretRef};
pub use dialogue::DialogueGenerator;
pub use error::{MitraError, Result};
pub use language::Language;
pub use lipsync::LipSyncExtractor;
pub use reply::{MouthCue, Reply, TopicalImage, Utterance};
pub use server::{AppState, router};
pub use stt::SpeechRecognizer;
pub use sync::ResponseSynchronizer;
pub use tts::TtsRouter;
