use std::time::Instant;

use medtriage_contracts::analysis::MedicalContext;
use medtriage_contracts::errors::{TriageError, MISSING_PROMPT_INPUT};
use serde_json::json;

use crate::classifier::classify;
use crate::formatter::compose_response;
use crate::gemini::ModelRequest;
use crate::prompts::chat_prompt;
use crate::session::TriageSession;

pub const NO_RESPONSE_TEXT: &str = "No se pudo generar la respuesta";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub context: MedicalContext,
    pub model_called: bool,
}

/// One chat turn at a time against the session's model, using the last
/// stored analysis as context.
pub struct ConversationOrchestrator {
    session: TriageSession,
}

impl ConversationOrchestrator {
    pub fn new(session: TriageSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &TriageSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TriageSession {
        &mut self.session
    }

    /// Overwrites the analysis that later turns are answered against.
    pub fn remember_analysis(&self, analysis: impl Into<String>) {
        self.session.store.set(analysis);
    }

    pub fn respond(&self, prompt: &str) -> Result<ChatReply, TriageError> {
        if !self.session.has_credential() || prompt.trim().is_empty() {
            return Err(TriageError::MissingInput(MISSING_PROMPT_INPUT));
        }

        let metrics = &self.session.metrics;
        metrics.track_message(prompt);
        let started = Instant::now();
        let outcome = self.turn(prompt);
        let elapsed = started.elapsed();
        metrics.track_response(prompt, outcome.is_ok(), Some(elapsed));

        let mut event = json!({
            "success": outcome.is_ok(),
            "elapsed_ms": elapsed.as_millis() as u64,
        });
        if let Some(object) = event.as_object_mut() {
            match &outcome {
                Ok(reply) => {
                    object.insert("context".to_string(), json!(reply.context.as_str()));
                    object.insert("model_called".to_string(), json!(reply.model_called));
                }
                Err(err) => {
                    object.insert("code".to_string(), json!(err.code()));
                }
            }
        }
        self.session.emit("chat_turn", event);
        outcome
    }

    fn turn(&self, prompt: &str) -> Result<ChatReply, TriageError> {
        let classification = classify(prompt);
        if matches!(
            classification.context,
            MedicalContext::Greeting | MedicalContext::NonMedical
        ) {
            tracing::debug!(context = classification.context.as_str(), "canned reply");
            return Ok(ChatReply {
                response: compose_response("", &classification),
                context: classification.context,
                model_called: false,
            });
        }

        let previous = self.session.store.get();
        let request = ModelRequest::text(
            self.session.model.clone(),
            chat_prompt(previous.as_deref(), prompt),
        );
        let text = self
            .session
            .client
            .generate(&self.session.api_key, &request)?
            .unwrap_or_else(|| NO_RESPONSE_TEXT.to_string());

        let reply_classification = classify(&text);
        Ok(ChatReply {
            response: compose_response(&text, &reply_classification),
            context: classification.context,
            model_called: true,
        })
    }
}
