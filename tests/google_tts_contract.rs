//! Google Cloud TTS contract tests.
//!
//! Verify the wire format of the locale-locked synthesis path against a
//! mock server: voice listing, voice pinning in the synthesis request, and
//! hard failure propagation when the configured cloud engine errors.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mitra::config::TtsConfig;
use mitra::credentials::GoogleCredentials;
use mitra::error::MitraError;
use mitra::language::{Language, TtsEngine};
use mitra::reply::AudioFormat;
use mitra::tts::{GoogleTts, GoogleTtsConfig, TtsRouter};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cloud_router(server: &MockServer) -> TtsRouter {
    let google = GoogleTts::new(
        GoogleTtsConfig::new(server.uri(), Duration::from_secs(5)),
        GoogleCredentials::from_token("cloud-token"),
    );
    TtsRouter::new(TtsConfig::default(), None).with_google(google)
}

fn hindi_voices() -> serde_json::Value {
    json!({
        "voices": [
            {
                "name": "hi-IN-Standard-A",
                "languageCodes": ["hi-IN"],
                "ssmlGender": "FEMALE",
                "naturalSampleRateHertz": 24000
            },
            {
                "name": "hi-IN-Standard-B",
                "languageCodes": ["hi-IN"],
                "ssmlGender": "MALE",
                "naturalSampleRateHertz": 24000
            }
        ]
    })
}

#[tokio::test]
async fn hindi_synthesis_pins_locale_and_voice_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/voices"))
        .and(query_param("languageCode", "hi-IN"))
        .and(header("authorization", "Bearer cloud-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hindi_voices()))
        .expect(1)
        .mount(&server)
        .await;

    // Both languageCode and voice.name must be pinned in the request; an
    // unpinned request lets the API cross locales.
    Mock::given(method("POST"))
        .and(path("/v1/text:synthesize"))
        .and(body_partial_json(json!({
            "input": { "text": "नमस्ते दुनिया" },
            "voice": {
                "languageCode": "hi-IN",
                "name": "hi-IN-Standard-B",
                "ssmlGender": "MALE"
            },
            "audioConfig": { "audioEncoding": "MP3" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "audioContent": BASE64.encode(b"hindi mp3 bytes")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let synthesis = cloud_router(&server)
        .synthesize("नमस्ते दुनिया", Language::Hindi)
        .await
        .unwrap();

    assert_eq!(synthesis.audio, b"hindi mp3 bytes");
    assert_eq!(synthesis.format, AudioFormat::Mp3);
    assert_eq!(synthesis.engine, TtsEngine::GoogleCloud);
}

#[tokio::test]
async fn configured_cloud_failure_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/voices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hindi_voices()))
        .mount(&server)
        .await;

    // A deterministic server error: no fallback engine may step in and
    // the retry loop must not spin on it.
    Mock::given(method("POST"))
        .and(path("/v1/text:synthesize"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = cloud_router(&server)
        .synthesize("नमस्ते", Language::Hindi)
        .await
        .unwrap_err();

    assert!(matches!(err, MitraError::Tts(_)), "got {err:?}");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn missing_locale_voices_abort_synthesis() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/voices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "voices": [
                {
                    "name": "en-US-Standard-B",
                    "languageCodes": ["en-US"],
                    "ssmlGender": "MALE",
                    "naturalSampleRateHertz": 24000
                }
            ]
        })))
        .mount(&server)
        .await;

    let err = cloud_router(&server)
        .synthesize("నమస్కారం", Language::Telugu)
        .await
        .unwrap_err();

    assert!(
        matches!(err, MitraError::NoVoicesAvailable { ref locale } if locale == "te-IN"),
        "got {err:?}"
    );
}
