use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use medcopilot_core::config::AnswerSettings;
use medcopilot_core::{AnswerSynthesizer, SynthesizedAnswer};

use crate::error::{RemoteError, Result};

pub const SYSTEM_PROMPT: &str = "You are a medical research and clinical decision support assistant.";
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

fn answer_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(RemoteError::EmptyResponse)
}

/// Chat-completions client for Groq's OpenAI-compatible API.
///
/// Never returns an error: a missing key, transport failures and every model
/// failing all come back as a diagnostic answer.
pub struct GroqSynthesizer {
    client: std::result::Result<Client, String>,
    api_key: Option<String>,
    base_url: String,
    models: Vec<String>,
    temperature: f32,
}

impl GroqSynthesizer {
    pub fn new(api_key: Option<String>, settings: &AnswerSettings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| e.to_string());
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            models: settings.models.clone(),
            temperature: settings.temperature,
        }
    }

    /// Key from settings, else from `GROQ_API_KEY`.
    pub fn from_settings(settings: &AnswerSettings) -> Self {
        let api_key = settings.api_key.clone().or_else(|| std::env::var(API_KEY_ENV).ok());
        Self::new(api_key, settings)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn complete(&self, client: &Client, api_key: &str, model: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: self.temperature,
        };
        let response: ChatResponse = client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;
        answer_text(response)
    }
}

impl AnswerSynthesizer for GroqSynthesizer {
    fn answer(&self, prompt: &str) -> SynthesizedAnswer {
        let Some(api_key) = self.api_key.as_deref() else {
            return SynthesizedAnswer::diagnostic(format!(
                "❌ External AI not configured. Set {} or answer.api_key.",
                API_KEY_ENV
            ));
        };
        let client = match &self.client {
            Ok(client) => client,
            Err(e) => return SynthesizedAnswer::diagnostic(format!("❌ External AI Error: {}", e)),
        };

        let mut last_error = None;
        for model in &self.models {
            match self.complete(client, api_key, model, prompt) {
                Ok(answer) => {
                    tracing::debug!("Answer from {}", model);
                    return SynthesizedAnswer { answer, model: Some(model.clone()) };
                }
                Err(e) => {
                    tracing::warn!("Model {} failed: {}", model, e);
                    last_error = Some(e.to_string());
                }
            }
        }
        SynthesizedAnswer::diagnostic(format!(
            "❌ All Groq models failed. Last error: {}",
            last_error.unwrap_or_else(|| "no models configured".to_string())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_has_system_then_user_message() {
        let request = ChatRequest {
            model: "m",
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: "q" },
            ],
            temperature: 0.2,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "q");
        assert_eq!(json["model"], "m");
    }

    #[test]
    fn first_choice_is_the_answer() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"Give fluids."}}]}"#).unwrap();
        assert_eq!(answer_text(response).unwrap(), "Give fluids.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(answer_text(empty), Err(RemoteError::EmptyResponse)));
    }
}
