use std::env;
use std::time::Duration;

use medtriage_contracts::models::DEFAULT_MODEL;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 300;

/// Size gates applied before an image is sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisLimits {
    pub max_upload_bytes: usize,
    pub compress_above_bytes: usize,
    /// Targets in KB; the last rung never fails.
    pub ladder_kb: Vec<usize>,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            compress_above_bytes: 400 * 1024,
            ladder_kb: vec![400, 300, 200],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub api_base: String,
    pub model: String,
    pub request_timeout: Option<Duration>,
    pub limits: AnalysisLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: None,
            limits: AnalysisLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_base: lookup("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            model: lookup("MEDTRIAGE_MODEL").unwrap_or(defaults.model),
            request_timeout: lookup("MEDTRIAGE_REQUEST_TIMEOUT")
                .and_then(|value| value.parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))),
            limits: defaults.limits,
        }
    }
}

/// Credential precedence: explicit flag, `GEMINI_API_KEY`, `GOOGLE_API_KEY`.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| non_empty_env("GEMINI_API_KEY"))
        .or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
