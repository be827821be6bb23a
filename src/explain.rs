//! Student-facing homework explanations from a generative model, with model fallback.
//!
//! The network client is behind [`ModelClient`]; this module only builds the prompt and
//! decides which model to try next.

use serde::Serialize;

use crate::homework::Homework;

pub const MODEL_CANDIDATES: [&str; 6] = [
    "gemini-1.5-flash-latest",
    "gemini-1.5-pro-latest",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-1.0-pro",
    "gemini-pro",
];

const PREAMBLE: [&str; 4] = [
    "You are a helpful tutor. Explain this homework clearly for a student.",
    "Keep it concise, actionable, and encouraging.",
    "Include: steps to approach, tips, and materials needed.",
    "If information is missing, state reasonable assumptions and proceed.",
];

fn or_na(s: &str) -> &str {
    if s.trim().is_empty() {
        "N/A"
    } else {
        s
    }
}

pub fn build_prompt(hw: &Homework) -> String {
    let mut lines: Vec<String> = PREAMBLE.iter().map(|s| s.to_string()).collect();
    lines.push("\n---\n".to_string());
    lines.push(format!("Subject: {}", hw.subject));
    lines.push(format!("Class: {}", or_na(&hw.class_name)));
    lines.push(format!("Due Date: {}", or_na(&hw.date)));
    lines.push(format!("Description: {}", or_na(&hw.description)));
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Other(String),
}

/// One generative-model backend.
pub trait ModelClient: Send {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, ModelError>;
    fn list_models(&self) -> Result<Vec<String>, ModelError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExplainError {
    #[error("model request unauthorized; check the API key and its access")]
    Unauthorized,
    #[error("model {model} failed: {message}")]
    Failed { model: String, message: String },
    #[error("no accessible model; tried: {}", .tried.join(", "))]
    Exhausted { tried: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub model: String,
    pub text: String,
}

/// Known candidates in fixed order first, then whatever else the backend offers.
pub fn prioritize_models(available: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::new();
    for c in MODEL_CANDIDATES {
        if available.iter().any(|m| m == c) && !ordered.iter().any(|m| m == c) {
            ordered.push(c.to_string());
        }
    }
    for m in available {
        if !ordered.contains(m) {
            ordered.push(m.clone());
        }
    }
    ordered
}

pub struct Explainer {
    client: Box<dyn ModelClient>,
    cached_model: Option<String>,
    cached_available: Option<Vec<String>>,
}

impl Explainer {
    pub fn new(client: Box<dyn ModelClient>) -> Self {
        Self {
            client,
            cached_model: None,
            cached_available: None,
        }
    }

    pub fn cached_model(&self) -> Option<&str> {
        self.cached_model.as_deref()
    }

    fn available_models(&mut self) -> Result<Vec<String>, ModelError> {
        if let Some(v) = &self.cached_available {
            return Ok(v.clone());
        }
        let names = self.client.list_models()?;
        self.cached_available = Some(names.clone());
        Ok(names)
    }

    pub fn explain(&mut self, hw: &Homework) -> Result<Explanation, ExplainError> {
        let prompt = build_prompt(hw);

        let mut to_try: Vec<String> = Vec::new();
        if let Some(m) = &self.cached_model {
            to_try.push(m.clone());
        }
        to_try.extend(MODEL_CANDIDATES.iter().map(|s| s.to_string()));

        let mut tried: Vec<String> = Vec::new();
        for model in to_try {
            if tried.contains(&model) {
                continue;
            }
            tried.push(model.clone());
            match self.client.generate(&model, &prompt) {
                Ok(text) => return Ok(self.succeed(model, text)),
                Err(ModelError::NotFound(_)) => {
                    tracing::debug!(model = %model, "model not found, trying next");
                }
                Err(ModelError::Unauthorized(_)) => return Err(ExplainError::Unauthorized),
                Err(ModelError::Other(message)) => return Err(ExplainError::Failed { model, message }),
            }
        }

        match self.available_models() {
            Ok(available) => {
                for model in prioritize_models(&available) {
                    if tried.contains(&model) {
                        continue;
                    }
                    tried.push(model.clone());
                    match self.client.generate(&model, &prompt) {
                        Ok(text) => return Ok(self.succeed(model, text)),
                        Err(e) => tracing::debug!(model = %model, error = %e, "discovered model failed"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "listing models failed"),
        }

        Err(ExplainError::Exhausted { tried })
    }

    fn succeed(&mut self, model: String, text: String) -> Explanation {
        self.cached_model = Some(model.clone());
        Explanation { model, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homework::HomeworkStatus;
    use std::sync::{Arc, Mutex};

    struct FakeClient {
        working: Vec<&'static str>,
        unauthorized: bool,
        listed: Option<Vec<&'static str>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ModelClient for FakeClient {
        fn generate(&self, model: &str, _prompt: &str) -> Result<String, ModelError> {
            self.calls.lock().unwrap().push(model.to_string());
            if self.unauthorized {
                return Err(ModelError::Unauthorized("401".into()));
            }
            if self.working.iter().any(|w| *w == model) {
                Ok(format!("explained by {}", model))
            } else {
                Err(ModelError::NotFound(model.to_string()))
            }
        }

        fn list_models(&self) -> Result<Vec<String>, ModelError> {
            match &self.listed {
                Some(v) => Ok(v.iter().map(|s| s.to_string()).collect()),
                None => Err(ModelError::Other("list failed".into())),
            }
        }
    }

    fn client(working: Vec<&'static str>, listed: Option<Vec<&'static str>>) -> (FakeClient, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            FakeClient {
                working,
                unauthorized: false,
                listed,
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn hw() -> Homework {
        Homework {
            id: "h1".into(),
            class_name: "Grade 4 A".into(),
            subject: "Math".into(),
            description: "".into(),
            date: "2026-11-02".into(),
            status: HomeworkStatus::Pending,
            notes: None,
            teacher: None,
        }
    }

    #[test]
    fn prompt_has_preamble_separator_and_fields() {
        let p = build_prompt(&hw());
        assert!(p.starts_with("You are a helpful tutor."));
        assert!(p.contains("proceed.\n\n---\n\nSubject: Math"));
        assert!(p.contains("\nClass: Grade 4 A\n"));
        assert!(p.contains("\nDue Date: 2026-11-02\n"));
        assert!(p.ends_with("Description: N/A"));
    }

    #[test]
    fn falls_through_not_found_and_caches_winner() {
        let (c, calls) = client(vec!["gemini-1.5-pro"], Some(vec![]));
        let mut ex = Explainer::new(Box::new(c));
        let out = ex.explain(&hw()).expect("explanation");
        assert_eq!(out.model, "gemini-1.5-pro");
        assert_eq!(ex.cached_model(), Some("gemini-1.5-pro"));
        assert_eq!(calls.lock().unwrap().len(), 4);

        calls.lock().unwrap().clear();
        ex.explain(&hw()).expect("explanation");
        assert_eq!(*calls.lock().unwrap(), vec!["gemini-1.5-pro".to_string()]);
    }

    #[test]
    fn unauthorized_stops_immediately() {
        let (mut c, calls) = client(vec![], None);
        c.unauthorized = true;
        let mut ex = Explainer::new(Box::new(c));
        assert_eq!(ex.explain(&hw()), Err(ExplainError::Unauthorized));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn discovery_tries_untried_models_in_priority_order() {
        let (c, calls) = client(
            vec!["gemini-2.0-flash"],
            Some(vec!["gemini-pro", "text-bison", "gemini-2.0-flash"]),
        );
        let mut ex = Explainer::new(Box::new(c));
        let out = ex.explain(&hw()).expect("explanation");
        assert_eq!(out.model, "gemini-2.0-flash");
        let calls = calls.lock().unwrap();
        assert_eq!(&calls[6..], &["text-bison".to_string(), "gemini-2.0-flash".to_string()]);
    }

    #[test]
    fn exhausted_error_names_every_model_tried() {
        let (c, _) = client(vec![], None);
        let mut ex = Explainer::new(Box::new(c));
        let Err(ExplainError::Exhausted { tried }) = ex.explain(&hw()) else {
            panic!("expected exhausted");
        };
        assert_eq!(tried, MODEL_CANDIDATES.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn prioritize_puts_known_candidates_first() {
        let available: Vec<String> = ["x-model", "gemini-pro", "gemini-1.5-flash"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            prioritize_models(&available),
            vec!["gemini-1.5-flash", "gemini-pro", "x-model"]
        );
    }
}
