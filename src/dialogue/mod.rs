//! Structured dialogue generation against the Gemini REST API.
//!
//! Asks the model for a JSON array of at most three expression-tagged
//! utterances and degrades malformed output instead of erroring: a reply the
//! avatar can speak always beats a parse failure. Quota exhaustion is the
//! one error that propagates, so the handler can answer with the canned
//! "high demand" reply.

pub mod images;

use crate::config::DialogueConfig;
use crate::error::{MitraError, Result};
use crate::language::Language;
use crate::reply::Reply;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use images::ImageFinder;

/// Instructional prompt sent ahead of every question.
const PROMPT_TEMPLATE: &str = r#"You are an intelligent and expressive AI assistant with extensive knowledge across all subjects.
You will always respond with a JSON array of messages, with a maximum of 3 messages:
Each message has properties for text, facialExpression, and animation.
The different facial expressions are: smile, sad, angry, surprised, funnyFace, and default.
The different animations are: Idle, TalkingOne, TalkingThree, SadIdle, Defeated, Angry, Surprised, DismissingGesture and ThoughtfulHeadShake.

Adapt your expressions and tone based on the content of your response:
- Use "smile" for positive, friendly, or encouraging content
- Use "sad" for sympathetic, disappointed, or negative content
- Use "angry" for frustrated, upset, or critical content
- Use "surprised" for unexpected, shocking, or amazing content
- Use "funnyFace" for humorous, playful, or light-hearted content
- Use "default" for neutral, factual, or balanced content

Choose animations that match the emotional tone and content:
- "TalkingOne" for normal conversation
- "TalkingThree" for enthusiastic or energetic discussion
- "ThoughtfulHeadShake" for contemplative or analytical content
- "Surprised" for unexpected revelations
- "Angry" for strong disagreement or criticism
- "SadIdle" for empathetic or somber topics
- "DismissingGesture" for dismissive or skeptical responses

Respond in valid JSON format with the following structure:
{
  "messages": [
    {
      "text": "Text to be spoken by the AI",
      "facialExpression": "Facial expression to be used by the AI",
      "animation": "Animation to be used by the AI"
    }
  ]
}

Return only valid JSON with plain text values, no markdown formatting or extra text."#;

const SUMMARY_TEMPLATE: &str = r#"You are an intelligent and expressive AI assistant. Your task is to create a concise, informative summary of the conversation between a user and an AI assistant.

Please follow these guidelines:
1. Provide a clear overview of the main topics discussed
2. Highlight any important decisions, agreements, or conclusions reached
3. Mention any questions asked and answers provided
4. Keep the summary concise but comprehensive
5. Use natural language and avoid technical jargon when possible"#;

/// One entry of client-side chat history, as posted to /summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini-backed dialogue generator.
#[derive(Debug, Clone)]
pub struct DialogueGenerator {
    api_url: String,
    model: String,
    summary_model: String,
    api_key: String,
    images: ImageFinder,
    client: reqwest::Client,
}

impl DialogueGenerator {
    pub fn new(config: &DialogueConfig, api_key: String, pexels_api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            summary_model: config.summary_model.clone(),
            api_key,
            images: ImageFinder::new(pexels_api_key),
            client,
        }
    }

    /// Override the endpoint (used by tests with a mock server).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Generate an expression-tagged reply to the question, with topical
    /// images attached.
    pub async fn generate(&self, question: &str, language: Language) -> Result<Reply> {
        let prompt = build_prompt(question, language);
        let raw = match self.generate_content(&self.model, &prompt).await {
            Ok(text) => text,
            Err(MitraError::Quota) => return Err(MitraError::Quota),
            Err(e) => {
                // A transport hiccup still has to produce a speakable reply.
                warn!(error = %e, "dialogue generation failed, using fallback reply");
                String::new()
            }
        };

        let mut reply = Reply::decode_or_degrade(&raw);
        info!(
            %language,
            utterances = reply.messages.len(),
            "dialogue reply decoded"
        );

        let answer = reply.combined_text();
        reply.images = Some(self.images.find(question, &answer).await);
        Ok(reply)
    }

    /// Summarize a chat history into natural prose.
    pub async fn summarize(&self, history: &[ChatMessage]) -> Result<String> {
        let prompt = build_summary_prompt(history);
        let summary = self.generate_content(&self.summary_model, &prompt).await?;
        debug!(chars = summary.len(), "chat summary generated");
        Ok(summary)
    }

    async fn generate_content(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_url,
            model,
            urlencoding::encode(&self.api_key)
        );
        let body = serde_json::json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("LLM quota exhausted");
            return Err(MitraError::Quota);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MitraError::Dialogue(format!(
                "generateContent failed: HTTP {status}: {}",
                body.chars().take(300).collect::<String>()
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(MitraError::Dialogue("model returned no text".to_string()));
        }
        Ok(text)
    }
}

/// Assemble the full prompt for a question, appending the language
/// instruction for Hindi and Telugu so the reply arrives in native script.
fn build_prompt(question: &str, language: Language) -> String {
    let mut prompt = String::from(PROMPT_TEMPLATE);
    match language {
        Language::English => {}
        Language::Hindi => {
            prompt.push_str(
                "\n\nIMPORTANT: Respond entirely in Hindi, written in Devanagari script.",
            );
        }
        Language::Telugu => {
            prompt.push_str(
                "\n\nIMPORTANT: Respond entirely in Telugu, written in Telugu script.",
            );
        }
    }
    prompt.push_str("\n\nHuman: ");
    prompt.push_str(question);
    prompt.push_str("\nAI:");
    prompt
}

fn build_summary_prompt(history: &[ChatMessage]) -> String {
    let formatted: Vec<String> = history
        .iter()
        .map(|msg| {
            let sender = match msg.sender.as_str() {
                "user" => "User",
                "ai" => "AI Assistant",
                _ => "System",
            };
            format!("{sender}: {}", msg.text)
        })
        .collect();
    format!(
        "{SUMMARY_TEMPLATE}\n\nConversation History:\n{}\n\nPlease provide a summary of this conversation in a natural, readable format.",
        formatted.join("\n")
    )
}
