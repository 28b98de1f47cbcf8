//! Reply data model: the multimedia envelope returned to the avatar client.
//!
//! A [`Reply`] is an ordered list of [`Utterance`]s. The dialogue generator
//! creates utterances with text, expression, and animation only; the
//! synchronizer later attaches audio and a mouth-cue timeline in place.

use serde::{Deserialize, Serialize};

/// Facial expression tag driving the avatar's morph targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacialExpression {
    Smile,
    Sad,
    Angry,
    Surprised,
    FunnyFace,
    #[default]
    Default,
}

/// Body animation clip name on the client rig.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Animation {
    Idle,
    #[default]
    TalkingOne,
    TalkingThree,
    SadIdle,
    Defeated,
    Angry,
    Surprised,
    DismissingGesture,
    ThoughtfulHeadShake,
}

/// Container format of an utterance's audio payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    #[default]
    Wav,
}

/// One timestamped mouth-shape interval in a lip-sync timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f64,
    pub end: f64,
    pub value: String,
}

/// Ordered, non-overlapping mouth cues for one utterance's audio.
///
/// An empty list is valid and means "no lip movement data"; the client
/// treats it as a closed mouth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouthCueTimeline {
    pub mouth_cues: Vec<MouthCue>,
}

impl MouthCueTimeline {
    /// The fixed three-cue fallback used whenever real alignment data could
    /// not be produced.
    pub fn placeholder() -> Self {
        Self {
            mouth_cues: vec![
                MouthCue {
                    start: 0.0,
                    end: 0.5,
                    value: "A".to_owned(),
                },
                MouthCue {
                    start: 0.5,
                    end: 1.0,
                    value: "B".to_owned(),
                },
                MouthCue {
                    start: 1.0,
                    end: 1.5,
                    value: "C".to_owned(),
                },
            ],
        }
    }

    /// Cues are sorted by start and adjacent cues never overlap.
    pub fn is_monotonic(&self) -> bool {
        self.mouth_cues.iter().all(|c| c.end > c.start && c.start >= 0.0)
            && self
                .mouth_cues
                .windows(2)
                .all(|w| w[0].end <= w[1].start + 1e-9)
    }
}

/// One unit of spoken output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub text: String,
    #[serde(default)]
    pub facial_expression: FacialExpression,
    #[serde(default)]
    pub animation: Animation,
    /// Base64-encoded audio, attached by the synchronizer. Empty string when
    /// synthesis failed on a soft-degrade path.
    #[serde(default)]
    pub audio: String,
    #[serde(default)]
    pub audio_format: AudioFormat,
    #[serde(default)]
    pub lipsync: MouthCueTimeline,
}

impl Utterance {
    pub fn new(
        text: impl Into<String>,
        facial_expression: FacialExpression,
        animation: Animation,
    ) -> Self {
        Self {
            text: text.into(),
            facial_expression,
            animation,
            audio: String::new(),
            audio_format: AudioFormat::default(),
            lipsync: MouthCueTimeline::default(),
        }
    }
}

/// A topical image attached to a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicalImage {
    pub url: String,
    pub label: String,
    pub photographer: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// The complete multimedia response to one user utterance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub messages: Vec<Utterance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<TopicalImage>>,
    /// Transcript of the user's speech, set on voice-originated replies so
    /// the client can log it as the user's chat-history entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

impl Reply {
    pub fn from_messages(messages: Vec<Utterance>) -> Self {
        Self {
            messages,
            images: None,
            user_message: None,
        }
    }

    /// Decode an LLM response body into a reply, falling back to a single
    /// default utterance wrapping the raw text when the JSON does not match
    /// the expected shape. A decoded reply with zero messages also falls
    /// back: an empty reply is invalid.
    pub fn decode_or_degrade(raw: &str) -> Self {
        let stripped = strip_code_fences(raw);
        match serde_json::from_str::<Reply>(stripped) {
            Ok(reply) if !reply.messages.is_empty() => {
                // Discard any audio/lipsync fields the model invented.
                let messages = reply
                    .messages
                    .into_iter()
                    .take(3)
                    .map(|m| Utterance::new(m.text, m.facial_expression, m.animation))
                    .collect();
                Self::from_messages(messages)
            }
            _ => {
                let text = if raw.trim().is_empty() {
                    "Hello! I'm your AI assistant, ready to help with any topic you'd like to discuss."
                        .to_owned()
                } else {
                    raw.trim().to_owned()
                };
                Self::from_messages(vec![Utterance::new(
                    text,
                    FacialExpression::Default,
                    Animation::TalkingOne,
                )])
            }
        }
    }

    /// Canned two-utterance reply returned when the LLM quota is exhausted.
    pub fn quota_exhausted() -> Self {
        Self::from_messages(vec![
            Utterance::new(
                "I'm experiencing high demand right now. Please try again in a few minutes.",
                FacialExpression::Sad,
                Animation::SadIdle,
            ),
            Utterance::new(
                "My AI quota is temporarily exhausted. Please check back soon!",
                FacialExpression::Default,
                Animation::Idle,
            ),
        ])
    }

    /// Reply used when voice input produced no usable transcript.
    pub fn could_not_understand() -> Self {
        Self::from_messages(vec![Utterance::new(
            "I couldn't quite catch that. Could you say it again?",
            FacialExpression::Default,
            Animation::ThoughtfulHeadShake,
        )])
    }

    /// Best-effort apologetic utterance carried in error response bodies so
    /// the client can always render something on the avatar.
    pub fn apology() -> Self {
        Self::from_messages(vec![Utterance::new(
            "I'm sorry, something went wrong on my end. Please try again.",
            FacialExpression::Sad,
            Animation::SadIdle,
        )])
    }

    /// Concatenated utterance text, used for image keyword matching.
    pub fn combined_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Gemini sometimes wraps its JSON in ```json fences despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn utterance_serializes_with_camel_case_wire_names() {
        let u = Utterance::new("hi", FacialExpression::FunnyFace, Animation::TalkingThree);
        let json = serde_json::to_value(&u).unwrap();
        assert_eq!(json["facialExpression"], "funnyFace");
        assert_eq!(json["animation"], "TalkingThree");
        assert_eq!(json["audioFormat"], "wav");
        assert!(json["lipsync"]["mouthCues"].as_array().unwrap().is_empty());
    }

    #[test]
    fn decode_accepts_valid_llm_json() {
        let raw = r#"{"messages":[{"text":"Hello","facialExpression":"smile","animation":"TalkingOne"}]}"#;
        let reply = Reply::decode_or_degrade(raw);
        assert_eq!(reply.messages.len(), 1);
        assert_eq!(reply.messages[0].facial_expression, FacialExpression::Smile);
        assert!(reply.messages[0].audio.is_empty());
    }

    #[test]
    fn decode_strips_markdown_fences() {
        let raw = "```json\n{\"messages\":[{\"text\":\"x\"}]}\n```";
        let reply = Reply::decode_or_degrade(raw);
        assert_eq!(reply.messages[0].text, "x");
    }

    #[test]
    fn decode_caps_messages_at_three() {
        let raw = r#"{"messages":[{"text":"1"},{"text":"2"},{"text":"3"},{"text":"4"}]}"#;
        assert_eq!(Reply::decode_or_degrade(raw).messages.len(), 3);
    }

    #[test]
    fn malformed_json_degrades_to_single_utterance() {
        let reply = Reply::decode_or_degrade("The moon is made of rock.");
        assert_eq!(reply.messages.len(), 1);
        assert_eq!(reply.messages[0].text, "The moon is made of rock.");
        assert_eq!(reply.messages[0].animation, Animation::TalkingOne);
    }

    #[test]
    fn empty_messages_array_is_invalid_and_degrades() {
        let reply = Reply::decode_or_degrade(r#"{"messages":[]}"#);
        assert_eq!(reply.messages.len(), 1);
    }

    #[test]
    fn quota_reply_matches_the_canned_pair() {
        let reply = Reply::quota_exhausted();
        assert_eq!(reply.messages.len(), 2);
        assert_eq!(reply.messages[0].facial_expression, FacialExpression::Sad);
        assert_eq!(reply.messages[0].animation, Animation::SadIdle);
        assert_eq!(reply.messages[1].facial_expression, FacialExpression::Default);
        assert_eq!(reply.messages[1].animation, Animation::Idle);
    }

    #[test]
    fn placeholder_timeline_is_monotonic() {
        let t = MouthCueTimeline::placeholder();
        assert_eq!(t.mouth_cues.len(), 3);
        assert!(t.is_monotonic());
    }

    #[test]
    fn overlapping_cues_fail_monotonicity() {
        let t = MouthCueTimeline {
            mouth_cues: vec![
                MouthCue {
                    start: 0.0,
                    end: 0.6,
                    value: "A".to_owned(),
                },
                MouthCue {
                    start: 0.5,
                    end: 1.0,
                    value: "B".to_owned(),
                },
            ],
        };
        assert!(!t.is_monotonic());
    }
}
