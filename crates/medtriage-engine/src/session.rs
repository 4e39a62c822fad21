use std::sync::Arc;

use medtriage_contracts::events::{EventPayload, EventWriter};
use medtriage_contracts::models::{ModelRegistry, ModelSpec};
use serde_json::Value;

use crate::config::{AnalysisLimits, EngineConfig};
use crate::context::SharedContextStore;
use crate::gemini::ModelClient;
use crate::metrics::SessionMetrics;

/// Everything one user session shares between analysis and chat.
#[derive(Clone)]
pub struct TriageSession {
    pub client: Arc<dyn ModelClient>,
    pub api_key: String,
    pub model: String,
    /// Output-token ceiling of `model`, when the registry knows it.
    pub output_limit: Option<u32>,
    pub limits: AnalysisLimits,
    pub store: SharedContextStore,
    pub metrics: SessionMetrics,
    pub events: EventWriter,
}

impl TriageSession {
    pub fn new(
        client: Arc<dyn ModelClient>,
        api_key: impl Into<String>,
        config: &EngineConfig,
        events: EventWriter,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            output_limit: ModelRegistry::new(None)
                .get(&config.model)
                .map(|spec| spec.max_output_tokens),
            limits: config.limits.clone(),
            store: SharedContextStore::new(),
            metrics: SessionMetrics::new(),
            events,
        }
    }

    pub fn use_model(&mut self, spec: &ModelSpec) {
        self.model = spec.name.clone();
        self.output_limit = Some(spec.max_output_tokens);
    }

    pub(crate) fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Best-effort event emission; a failing log never fails the caller.
    pub(crate) fn emit(&self, event_type: &str, payload: Value) {
        let payload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = self.events.emit(event_type, payload) {
            tracing::warn!(event_type, "event log write failed: {err:#}");
        }
    }
}
