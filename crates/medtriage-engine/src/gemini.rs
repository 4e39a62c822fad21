use std::time::Duration;

use medtriage_contracts::errors::{TriageError, UpstreamErrorKind};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::EngineConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    /// Low-temperature sampling used for image analysis.
    pub const ANALYSIS: Self = Self {
        temperature: 0.1,
        top_k: 40,
        top_p: 0.95,
        max_output_tokens: 2048,
    };

    /// Lowers `max_output_tokens` to what the model accepts.
    pub fn capped(self, limit: Option<u32>) -> Self {
        match limit {
            Some(limit) if limit > 0 && limit < self.max_output_tokens => Self {
                max_output_tokens: limit,
                ..self
            },
            _ => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub generation: Option<GenerationConfig>,
}

impl ModelRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            image: None,
            generation: None,
        }
    }

    pub fn payload(&self) -> Value {
        let mut parts = vec![json!({ "text": self.prompt })];
        if let Some(image) = self.image.as_ref() {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": image.data,
                },
            }));
        }
        let mut payload = json!({ "contents": [{ "parts": parts }] });
        if let (Some(generation), Some(object)) = (self.generation, payload.as_object_mut()) {
            object.insert("generationConfig".to_string(), json!(generation));
        }
        payload
    }
}

/// One generate call against a hosted model. `Ok(None)` means the reply
/// carried no text.
pub trait ModelClient: Send + Sync {
    fn generate(&self, api_key: &str, request: &ModelRequest) -> Result<Option<String>, TriageError>;
}

pub struct GeminiClient {
    api_base: String,
    timeout: Option<Duration>,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ModelClient for GeminiClient {
    fn generate(&self, api_key: &str, request: &ModelRequest) -> Result<Option<String>, TriageError> {
        let endpoint = self.endpoint_for_model(&request.model);
        let mut call = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&request.payload());
        if let Some(timeout) = self.timeout {
            call = call.timeout(timeout);
        }

        let response = call.send().map_err(|err| {
            tracing::error!(%endpoint, "gemini request failed: {err}");
            TriageError::Transport(err.to_string())
        })?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .map_err(|err| TriageError::Transport(err.to_string()))?;
        tracing::info!(status, %content_type, model = %request.model, "gemini responded");

        interpret_reply(status, &content_type, &body)
    }
}

/// Maps a raw HTTP reply to reply text or a user-facing error.
pub fn interpret_reply(
    status: u16,
    content_type: &str,
    body: &str,
) -> Result<Option<String>, TriageError> {
    if !(200..300).contains(&status) {
        let err = interpret_failure(status, content_type, body);
        tracing::warn!(status, "gemini error: {}", truncate_text(body, 512));
        return Err(err);
    }

    if !is_json(content_type) {
        tracing::warn!(%content_type, "expected json: {}", truncate_text(body, 200));
        let lowered = body.to_lowercase();
        let message = if lowered.contains("request entity too large") {
            "La imagen es demasiado grande para procesar. Intenta con una imagen más pequeña."
        } else if lowered.contains("bad request") {
            "Solicitud inválida. Verifica tu API Key y que la imagen sea válida."
        } else {
            "La API de Google devolvió una respuesta inválida. Intenta nuevamente."
        };
        return Err(TriageError::UpstreamMalformed(message.to_string()));
    }

    let parsed: Value = serde_json::from_str(body).map_err(|_| {
        TriageError::UpstreamMalformed("Respuesta inválida de la API de Google".to_string())
    })?;
    Ok(extract_text(&parsed))
}

pub fn interpret_failure(status: u16, content_type: &str, body: &str) -> TriageError {
    let kind = UpstreamErrorKind::from_status(status);
    let message = if is_json(content_type) {
        match serde_json::from_str::<Value>(body) {
            Ok(parsed) => {
                let message = parsed
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or("Error en la API de Google");
                if message.contains("Provided image is not valid") || message.contains("invalid") {
                    "La imagen no pudo ser procesada. Intenta con una imagen diferente o verifica que sea un archivo de imagen válido.".to_string()
                } else {
                    message.to_string()
                }
            }
            Err(_) => format!("Error del servidor ({status})"),
        }
    } else {
        match kind {
            UpstreamErrorKind::TooLarge => "La imagen es demasiado grande para procesar".to_string(),
            UpstreamErrorKind::Malformed => {
                "Solicitud inválida. La imagen podría estar corrupta o ser demasiado grande".to_string()
            }
            UpstreamErrorKind::KeyInvalid => "API Key inválida o sin permisos".to_string(),
            UpstreamErrorKind::RateLimited => {
                "Límite de solicitudes excedido. Intenta más tarde".to_string()
            }
            UpstreamErrorKind::Other => format!(
                "Error del servidor ({status}): {}",
                body.chars().take(100).collect::<String>()
            ),
        }
    };
    TriageError::Upstream {
        status,
        kind,
        message,
    }
}

/// Text of the first part of the first candidate.
pub fn extract_text(payload: &Value) -> Option<String> {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn is_json(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = "application/json; charset=UTF-8";

    #[test]
    fn payload_carries_text_image_and_generation_config() {
        let request = ModelRequest {
            model: "gemini-2.0-flash".to_string(),
            prompt: "Analiza".to_string(),
            image: Some(InlineImage {
                mime_type: "image/jpeg".to_string(),
                data: "AAAA".to_string(),
            }),
            generation: Some(GenerationConfig::ANALYSIS),
        };
        assert_eq!(
            request.payload(),
            json!({
                "contents": [{
                    "parts": [
                        { "text": "Analiza" },
                        { "inline_data": { "mime_type": "image/jpeg", "data": "AAAA" } },
                    ],
                }],
                "generationConfig": {
                    "temperature": 0.1,
                    "topK": 40,
                    "topP": 0.95,
                    "maxOutputTokens": 2048,
                },
            })
        );
    }

    #[test]
    fn generation_is_capped_only_by_smaller_limits() {
        let analysis = GenerationConfig::ANALYSIS;
        assert_eq!(analysis.capped(Some(1024)).max_output_tokens, 1024);
        assert_eq!(analysis.capped(Some(1024)).top_k, 40);
        assert_eq!(analysis.capped(Some(65_536)), analysis);
        assert_eq!(analysis.capped(Some(0)), analysis);
        assert_eq!(analysis.capped(None), analysis);
    }

    #[test]
    fn text_request_has_no_generation_config() {
        let payload = ModelRequest::text("gemini-2.0-flash", "hola").payload();
        assert!(payload.get("generationConfig").is_none());
        assert_eq!(payload["contents"][0]["parts"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn endpoint_accepts_prefixed_and_bare_models() {
        let client = GeminiClient::new(&EngineConfig {
            api_base: "http://localhost:8080/v1beta/".to_string(),
            ..EngineConfig::default()
        });
        assert_eq!(
            client.endpoint_for_model("gemini-2.0-flash"),
            "http://localhost:8080/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            client.endpoint_for_model(" models/gemini-2.5-pro "),
            "http://localhost:8080/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn non_json_failures_map_by_status() {
        let cases = [
            (413, "La imagen es demasiado grande para procesar"),
            (400, "Solicitud inválida. La imagen podría estar corrupta o ser demasiado grande"),
            (403, "API Key inválida o sin permisos"),
            (429, "Límite de solicitudes excedido. Intenta más tarde"),
        ];
        for (status, expected) in cases {
            let err = interpret_failure(status, "text/html", "<html>nope</html>");
            assert_eq!(err.to_string(), expected, "{status}");
            assert_eq!(err.status_code(), 500);
        }

        let long_body = "x".repeat(300);
        let err = interpret_failure(502, "text/plain", &long_body);
        assert_eq!(err.to_string(), format!("Error del servidor (502): {}", "x".repeat(100)));
        assert_eq!(err.upstream_kind(), Some(UpstreamErrorKind::Other));
    }

    #[test]
    fn json_failures_use_the_service_message() {
        let err = interpret_failure(
            403,
            JSON,
            r#"{"error":{"code":403,"message":"Permission denied on resource project"}}"#,
        );
        assert_eq!(err.to_string(), "Permission denied on resource project");
        assert_eq!(err.upstream_kind(), Some(UpstreamErrorKind::KeyInvalid));

        let err = interpret_failure(
            400,
            JSON,
            r#"{"error":{"message":"Provided image is not valid."}}"#,
        );
        assert!(err.to_string().starts_with("La imagen no pudo ser procesada."));

        let err = interpret_failure(500, JSON, "{}");
        assert_eq!(err.to_string(), "Error en la API de Google");

        let err = interpret_failure(503, JSON, "not json");
        assert_eq!(err.to_string(), "Error del servidor (503)");
    }

    #[test]
    fn success_reply_yields_first_candidate_text() -> anyhow::Result<()> {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hallazgos: normal"}]}}]}"#;
        assert_eq!(interpret_reply(200, JSON, body)?.as_deref(), Some("Hallazgos: normal"));
        assert_eq!(interpret_reply(200, JSON, r#"{"candidates":[]}"#)?, None);
        Ok(())
    }

    #[test]
    fn malformed_success_replies_are_rejected() {
        let cases = [
            ("text/html", "413 Request Entity Too Large", "La imagen es demasiado grande para procesar. Intenta con una imagen más pequeña."),
            ("text/html", "400 Bad Request", "Solicitud inválida. Verifica tu API Key y que la imagen sea válida."),
            ("", "???", "La API de Google devolvió una respuesta inválida. Intenta nuevamente."),
            (JSON, "{truncated", "Respuesta inválida de la API de Google"),
        ];
        for (content_type, body, expected) in cases {
            match interpret_reply(200, content_type, body) {
                Err(TriageError::UpstreamMalformed(message)) => assert_eq!(message, expected),
                other => panic!("unexpected reply for {body}: {other:?}"),
            }
        }
    }
}
