//! Blocking client for the Generative Language REST API.

use std::time::Duration;

use serde_json::{json, Value};

use crate::explain::{ModelClient, ModelError};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, api_base: Option<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("assignlyd/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    /// Reads `ASSIGNLYD_GEMINI_API_KEY` and optional `ASSIGNLYD_GEMINI_API_BASE`.
    pub fn from_env() -> Option<Result<Self, reqwest::Error>> {
        let key = std::env::var("ASSIGNLYD_GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let base = std::env::var("ASSIGNLYD_GEMINI_API_BASE")
            .ok()
            .filter(|b| !b.trim().is_empty());
        Some(Self::new(key.trim().to_string(), base))
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<Value, ModelError> {
        let response = req
            .header("x-goog-api-key", &self.api_key)
            .send()
            .map_err(|e| ModelError::Other(format!("network error: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_failure(status, &body));
        }
        response
            .json::<Value>()
            .map_err(|e| ModelError::Other(format!("unreadable response: {}", e)))
    }
}

impl ModelClient for GeminiClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, model);
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let data = self.send(self.http.post(&url).json(&body))?;
        response_text(&data).ok_or_else(|| ModelError::Other(format!("{} returned no text", model)))
    }

    fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let url = format!("{}/models", self.api_base);
        let data = self.send(self.http.get(&url))?;
        Ok(model_names(&data))
    }
}

/// Maps a non-success HTTP reply onto the fallback categories.
pub fn classify_failure(status: u16, body: &str) -> ModelError {
    let lower = body.to_ascii_lowercase();
    let message = format!("HTTP {}: {}", status, body.trim());
    if status == 401 || status == 403 || body.contains("PERMISSION") {
        ModelError::Unauthorized(message)
    } else if status == 404 || lower.contains("not found") || lower.contains("not supported") {
        ModelError::NotFound(message)
    } else {
        ModelError::Other(message)
    }
}

/// Concatenated text parts of the first candidate.
pub fn response_text(data: &Value) -> Option<String> {
    let parts = data
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Bare model ids from a ListModels reply (`models/gemini-pro` becomes `gemini-pro`).
pub fn model_names(data: &Value) -> Vec<String> {
    data.get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                .filter_map(|n| n.rsplit('/').next())
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string())
                .collect()
        })
        .unwrap_or_default()
}
