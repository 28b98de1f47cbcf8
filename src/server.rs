//! HTTP surface of the avatar backend.
//!
//! Thin axum handlers over the injected services. Error policy: quota
//! exhaustion answers HTTP 200 with the canned "high demand" reply so the
//! avatar keeps talking; hard pipeline failures answer 500 but the body
//! still carries one apologetic utterance the client can voice.

use crate::cache::ResponseCache;
use crate::dialogue::{ChatMessage, DialogueGenerator};
use crate::error::MitraError;
use crate::language::Language;
use crate::reply::{Reply, Utterance};
use crate::stt::SpeechRecognizer;
use crate::sync::ResponseSynchronizer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Transcript produced by a speech backend that is only a stub; treated the
/// same as an empty transcript.
const STUB_TRANSCRIPT: &str = "This is a test transcription from Azure STT.";

#[derive(Clone)]
pub struct AppState {
    pub dialogue: Arc<DialogueGenerator>,
    pub stt: Arc<SpeechRecognizer>,
    pub synchronizer: Arc<ResponseSynchronizer>,
    pub cache: ResponseCache,
}

#[derive(Debug, serde::Deserialize)]
struct TtsRequest {
    message: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct StsRequest {
    audio: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest {
    #[serde(default)]
    chat_history: Option<Vec<ChatMessage>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/voices", get(voices))
        .route("/tts", post(text_to_reply))
        .route("/sts", post(speech_to_reply))
        .route("/summary", post(summarize))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    "Avatar Backend is running"
}

async fn voices() -> impl IntoResponse {
    Json(serde_json::json!([
        { "id": "default", "name": "Default Voice" },
        { "id": "male", "name": "Male Voice" },
        { "id": "female", "name": "Female Voice" }
    ]))
}

async fn text_to_reply(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> (StatusCode, Json<Reply>) {
    let language = parse_language(request.language.as_deref());
    info!(%language, "received /tts request");
    respond(&state, &request.message, language, None).await
}

async fn speech_to_reply(
    State(state): State<AppState>,
    Json(request): Json<StsRequest>,
) -> (StatusCode, Json<Reply>) {
    let language = parse_language(request.language.as_deref());
    info!(%language, "received /sts request");

    let audio = match BASE64.decode(request.audio.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            warn!("sts request carried zero bytes of audio");
            return (StatusCode::BAD_REQUEST, Json(no_audio_reply()));
        }
        Err(e) => {
            warn!(error = %e, "sts request audio is not valid base64");
            return (StatusCode::BAD_REQUEST, Json(no_audio_reply()));
        }
    };

    let transcript = state.stt.transcribe(&audio, language).await;
    if transcript.trim().is_empty() || transcript == STUB_TRANSCRIPT {
        // Nothing usable was heard; answer directly without spending an
        // LLM call or poisoning the cache.
        info!("no usable transcript, returning clarification reply");
        return (StatusCode::OK, Json(Reply::could_not_understand()));
    }

    let question = transcript.clone();
    respond(&state, &question, language, Some(transcript)).await
}

/// Shared text-in pipeline behind /tts and /sts.
async fn respond(
    state: &AppState,
    question: &str,
    language: Language,
    user_message: Option<String>,
) -> (StatusCode, Json<Reply>) {
    if let Some(mut cached) = state.cache.get(language, question) {
        info!(%language, "serving cached reply");
        cached.user_message = user_message;
        return (StatusCode::OK, Json(cached));
    }

    let reply = match state.dialogue.generate(question, language).await {
        Ok(reply) => reply,
        Err(MitraError::Quota) => {
            return (StatusCode::OK, Json(Reply::quota_exhausted()));
        }
        Err(e) => {
            error!(error = %e, "dialogue generation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(Reply::apology()));
        }
    };

    match state.synchronizer.synchronize(reply, language).await {
        Ok(mut voiced) => {
            state.cache.put(language, question, voiced.clone());
            voiced.user_message = user_message;
            (StatusCode::OK, Json(voiced))
        }
        Err(MitraError::Quota) => (StatusCode::OK, Json(Reply::quota_exhausted())),
        Err(e) => {
            error!(error = %e, %language, "reply synchronization failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Reply::apology()))
        }
    }
}

async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(history) = request.chat_history else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid chat history provided"})),
        );
    };
    if history.is_empty() {
        return (
            StatusCode::OK,
            Json(serde_json::json!({"summary": "The conversation is empty."})),
        );
    }

    info!(messages = history.len(), "received /summary request");
    match state.dialogue.summarize(&history).await {
        Ok(summary) => (StatusCode::OK, Json(serde_json::json!({"summary": summary}))),
        Err(e) => {
            error!(error = %e, "summary generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to generate summary"})),
            )
        }
    }
}

fn parse_language(raw: Option<&str>) -> Language {
    match raw {
        Some(s) => Language::parse(s).unwrap_or_else(|| {
            warn!(language = s, "unknown language, defaulting to english");
            Language::default()
        }),
        None => Language::default(),
    }
}

fn no_audio_reply() -> Reply {
    Reply::from_messages(vec![Utterance::new(
        "I didn't receive any audio. Please try recording again.",
        crate::reply::FacialExpression::Default,
        crate::reply::Animation::ThoughtfulHeadShake,
    )])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn unknown_language_defaults_to_english() {
        assert_eq!(parse_language(Some("klingon")), Language::English);
        assert_eq!(parse_language(None), Language::English);
        assert_eq!(parse_language(Some("telugu")), Language::Telugu);
        assert_eq!(parse_language(Some("hi")), Language::Hindi);
    }

    #[test]
    fn summary_request_accepts_camel_case_history() {
        let request: SummaryRequest = serde_json::from_str(
            r#"{"chatHistory": [{"sender": "user", "text": "hello"}]}"#,
        )
        .unwrap();
        assert_eq!(request.chat_history.unwrap().len(), 1);
    }

    #[test]
    fn missing_history_field_deserializes_to_none() {
        let request: SummaryRequest = serde_json::from_str("{}").unwrap();
        assert!(request.chat_history.is_none());
    }
}
