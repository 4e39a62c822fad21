pub mod analysis;
pub mod classifier;
pub mod config;
pub mod context;
pub mod conversation;
pub mod formatter;
pub mod gemini;
pub mod literature;
pub mod metrics;
pub mod prompts;
pub mod quality;
pub mod reducer;
pub mod session;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use medtriage_contracts::analysis::{BatchAnalysis, ImageAnalysis};
use medtriage_contracts::errors::TriageError;
use medtriage_contracts::events::EventWriter;
use medtriage_contracts::models::ModelSelector;

pub use analysis::{AnalysisOrchestrator, ImageUpload};
pub use config::{resolve_api_key, AnalysisLimits, EngineConfig};
pub use context::SharedContextStore;
pub use conversation::{ChatReply, ConversationOrchestrator};
pub use gemini::{GeminiClient, ModelClient};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use session::TriageSession;

/// Analysis and chat over one shared session.
pub struct TriageEngine {
    analysis: AnalysisOrchestrator,
    conversation: ConversationOrchestrator,
    selector: ModelSelector,
}

impl TriageEngine {
    /// Engine backed by the hosted Gemini API.
    pub fn new(config: &EngineConfig, api_key: impl Into<String>, events: EventWriter) -> Self {
        let client: Arc<dyn ModelClient> = Arc::new(GeminiClient::new(config));
        Self::with_session(TriageSession::new(client, api_key, config, events))
    }

    pub fn with_session(session: TriageSession) -> Self {
        Self {
            analysis: AnalysisOrchestrator::new(session.clone()),
            conversation: ConversationOrchestrator::new(session),
            selector: ModelSelector::new(None),
        }
    }

    pub fn session(&self) -> &TriageSession {
        self.conversation.session()
    }

    pub fn model(&self) -> &str {
        &self.session().model
    }

    /// Switches both sides to `requested`, falling back to the first
    /// vision-capable model. Returns the fallback reason, if any.
    pub fn set_model(&mut self, requested: &str) -> Result<Option<String>> {
        let selection = self
            .selector
            .select(Some(requested), "vision")
            .map_err(anyhow::Error::msg)?;
        if let Some(reason) = selection.fallback_reason.as_deref() {
            tracing::warn!(requested, selected = %selection.model.name, "{reason}");
        }
        self.analysis.session_mut().use_model(&selection.model);
        self.conversation.session_mut().use_model(&selection.model);
        Ok(selection.fallback_reason)
    }

    pub fn analyze(&self, upload: &ImageUpload) -> Result<ImageAnalysis, TriageError> {
        self.analysis.analyze(upload)
    }

    /// Unreadable paths are reported as failed items.
    pub fn analyze_paths(&self, paths: &[impl AsRef<Path>]) -> BatchAnalysis {
        self.analysis.analyze_paths(paths)
    }

    pub fn analyze_batch(&self, uploads: &[ImageUpload]) -> BatchAnalysis {
        self.analysis.analyze_batch(uploads)
    }

    pub fn respond(&self, prompt: &str) -> Result<ChatReply, TriageError> {
        self.conversation.respond(prompt)
    }

    pub fn remember_analysis(&self, analysis: impl Into<String>) {
        self.conversation.remember_analysis(analysis);
    }

    pub fn stored_analysis(&self) -> Option<String> {
        self.session().store.get()
    }

    pub fn clear_analysis(&self) {
        self.session().store.clear();
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.session().metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use medtriage_contracts::analysis::MedicalContext;

    use super::*;
    use crate::gemini::ModelRequest;

    #[derive(Default)]
    struct EchoClient {
        models: Mutex<Vec<String>>,
    }

    impl ModelClient for EchoClient {
        fn generate(&self, _api_key: &str, request: &ModelRequest) -> Result<Option<String>, TriageError> {
            if let Ok(mut rows) = self.models.lock() {
                rows.push(request.model.clone());
            }
            Ok(Some("Diagnóstico: esguince leve. Reposo.".to_string()))
        }
    }

    fn engine(client: Arc<EchoClient>) -> TriageEngine {
        TriageEngine::with_session(TriageSession::new(
            client,
            "key",
            &EngineConfig::default(),
            EventWriter::discard("engine"),
        ))
    }

    #[test]
    fn analysis_feeds_the_next_chat_turn() -> anyhow::Result<()> {
        let client = Arc::new(EchoClient::default());
        let engine = engine(client);
        let result = engine.analyze(&ImageUpload::new("tobillo.jpg", "image/jpeg", vec![3u8; 150 * 1024]))?;
        assert_eq!(engine.stored_analysis(), Some(result.analysis));

        let reply = engine.respond("¿Es grave el esguince? tengo dolor")?;
        assert_eq!(reply.context, MedicalContext::GeneralHealth);
        assert_eq!(engine.metrics().total_messages, 1);

        engine.clear_analysis();
        assert_eq!(engine.stored_analysis(), None);
        Ok(())
    }

    #[test]
    fn set_model_applies_to_both_sides() -> anyhow::Result<()> {
        let client = Arc::new(EchoClient::default());
        let mut engine = engine(client.clone());

        assert_eq!(engine.set_model("models/gemini-2.5-pro")?, None);
        assert_eq!(engine.model(), "gemini-2.5-pro");
        assert_eq!(engine.session().output_limit, Some(65_536));
        engine.analyze(&ImageUpload::new("a.jpg", "image/jpeg", vec![1u8; 1024]))?;
        engine.respond("tengo dolor")?;
        let models = client.models.lock().map(|rows| rows.clone()).unwrap_or_default();
        assert_eq!(models, vec!["gemini-2.5-pro", "gemini-2.5-pro"]);

        let reason = engine.set_model("text-embedding-004")?;
        assert!(reason.is_some());
        assert_eq!(engine.model(), "gemini-2.0-flash");
        Ok(())
    }
}
