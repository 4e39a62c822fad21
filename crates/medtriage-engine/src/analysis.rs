//! Single and batch image analysis.
//!
//! A run walks `received → size_checked → compressed → quality_assessed →
//! prompt_built → model_call_pending → model_responded → classified →
//! formatted → resource_augmented → done`, emitting one `analysis_stage`
//! event per step. Any failure ends the run in `error`.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use medtriage_contracts::analysis::{BatchAnalysis, BatchItem, ImageAnalysis};
use medtriage_contracts::errors::{TriageError, MISSING_IMAGE_INPUT};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::classifier::classify;
use crate::formatter::{compose_response, prepend_quality_banner, sectionize};
use crate::gemini::{GenerationConfig, InlineImage, ModelRequest};
use crate::literature::{diagnosed_condition, research_block};
use crate::prompts::ANALYSIS_PROMPT;
use crate::quality;
use crate::reducer::{ImageSizeReducer, Reduction, ReductionTier};
use crate::session::TriageSession;

pub const NO_ANALYSIS_TEXT: &str = "No se pudo generar el análisis";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Received,
    SizeChecked,
    Compressed,
    QualityAssessed,
    PromptBuilt,
    ModelCallPending,
    ModelResponded,
    Classified,
    Formatted,
    ResourceAugmented,
    Done,
    Error,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::SizeChecked => "size_checked",
            Self::Compressed => "compressed",
            Self::QualityAssessed => "quality_assessed",
            Self::PromptBuilt => "prompt_built",
            Self::ModelCallPending => "model_call_pending",
            Self::ModelResponded => "model_responded",
            Self::Classified => "classified",
            Self::Formatted => "formatted",
            Self::ResourceAugmented => "resource_augmented",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file and guesses its mime type from the extension.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let mime_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        Ok(Self::new(display_name(path), mime_type, bytes))
    }

    /// Short content hash used to correlate events.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..8])
    }
}

pub struct AnalysisOrchestrator {
    session: TriageSession,
    reducer: ImageSizeReducer,
}

impl AnalysisOrchestrator {
    pub fn new(session: TriageSession) -> Self {
        Self::with_reducer(session, ImageSizeReducer::new())
    }

    pub fn with_reducer(session: TriageSession, reducer: ImageSizeReducer) -> Self {
        Self { session, reducer }
    }

    pub fn session(&self) -> &TriageSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TriageSession {
        &mut self.session
    }

    pub fn analyze(&self, upload: &ImageUpload) -> Result<ImageAnalysis, TriageError> {
        let started = Instant::now();
        let fingerprint = upload.fingerprint();
        match self.run(upload, &fingerprint) {
            Ok(result) => {
                self.stage(AnalysisStage::Done, &fingerprint, json!({}));
                self.session.emit(
                    "analysis_completed",
                    json!({
                        "image": upload.name,
                        "fingerprint": fingerprint,
                        "quality": result.image_quality.quality.as_str(),
                        "is_medical": result.validation.is_medical,
                        "sections": result.sections.len(),
                        "elapsed_ms": started.elapsed().as_millis() as u64,
                    }),
                );
                Ok(result)
            }
            Err(err) => {
                tracing::error!(image = %upload.name, "analysis failed: {err}");
                self.stage(AnalysisStage::Error, &fingerprint, json!({ "code": err.code() }));
                self.session.emit(
                    "analysis_failed",
                    json!({
                        "image": upload.name,
                        "fingerprint": fingerprint,
                        "error": err.to_string(),
                        "code": err.code(),
                        "status": err.status_code(),
                    }),
                );
                Err(err)
            }
        }
    }

    /// Analyzes every upload on its own scoped thread. Failures stay per item.
    pub fn analyze_batch(&self, uploads: &[ImageUpload]) -> BatchAnalysis {
        self.run_batch(uploads.iter().map(Ok).collect())
    }

    /// Reads and analyzes each path. An unreadable file becomes a failed
    /// item and the rest of the batch still runs.
    pub fn analyze_paths(&self, paths: &[impl AsRef<Path>]) -> BatchAnalysis {
        let loaded: Vec<Result<ImageUpload, (String, TriageError)>> = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                ImageUpload::from_path(path).map_err(|err| {
                    tracing::warn!(path = %path.display(), "{err:#}");
                    let name = display_name(path);
                    (name.clone(), TriageError::ImageUnreadable(name))
                })
            })
            .collect();
        self.run_batch(
            loaded
                .iter()
                .map(|entry| entry.as_ref().map_err(|(name, err)| (name.as_str(), err)))
                .collect(),
        )
    }

    fn run_batch(&self, entries: Vec<Result<&ImageUpload, (&str, &TriageError)>>) -> BatchAnalysis {
        let items: Vec<BatchItem> = std::thread::scope(|scope| {
            let pending: Vec<_> = entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| {
                    let job = entry.map(|upload| {
                        (upload.name.as_str(), scope.spawn(move || self.analyze(upload)))
                    });
                    (index, job)
                })
                .collect();
            pending
                .into_iter()
                .map(|(index, job)| match job {
                    Ok((name, handle)) => match handle.join() {
                        Ok(Ok(result)) => BatchItem {
                            index,
                            name: name.to_string(),
                            result: Some(result),
                            error: None,
                            error_code: None,
                        },
                        Ok(Err(err)) => failed_item(index, name, err.to_string(), err.code()),
                        Err(_) => failed_item(
                            index,
                            name,
                            "Error interno del servidor".to_string(),
                            "INTERNAL",
                        ),
                    },
                    Err((name, err)) => failed_item(index, name, err.to_string(), err.code()),
                })
                .collect()
        });

        let batch = BatchAnalysis::from_items(items);
        self.session.emit(
            "batch_completed",
            json!({
                "total_images": batch.total_images,
                "successful_analyses": batch.successful_analyses,
            }),
        );
        batch
    }

    fn run(&self, upload: &ImageUpload, fingerprint: &str) -> Result<ImageAnalysis, TriageError> {
        self.stage(
            AnalysisStage::Received,
            fingerprint,
            json!({ "image": upload.name, "mime_type": upload.mime_type, "bytes": upload.bytes.len() }),
        );
        if !self.session.has_credential() || upload.bytes.is_empty() {
            return Err(TriageError::MissingInput(MISSING_IMAGE_INPUT));
        }
        if upload.bytes.len() > self.session.limits.max_upload_bytes {
            return Err(TriageError::InputTooLarge {
                size: upload.bytes.len(),
            });
        }
        self.stage(AnalysisStage::SizeChecked, fingerprint, json!({}));

        let reduction = self.compress(upload)?;
        if BASE64.decode(reduction.payload.as_bytes()).is_err() {
            return Err(TriageError::ImageCorrupted);
        }
        let size_kb = quality::base64_size_kb(&reduction.payload);
        self.stage(
            AnalysisStage::Compressed,
            fingerprint,
            json!({ "tier": tier_label(reduction.tier), "size_kb": size_kb.round() as u64 }),
        );

        let assessment = quality::assess(&reduction.payload, &reduction.mime_type);
        self.stage(
            AnalysisStage::QualityAssessed,
            fingerprint,
            json!({ "quality": assessment.quality.as_str(), "issues": assessment.issues.len() }),
        );

        let request = ModelRequest {
            model: self.session.model.clone(),
            prompt: ANALYSIS_PROMPT.to_string(),
            image: Some(InlineImage {
                mime_type: reduction.mime_type,
                data: reduction.payload,
            }),
            generation: Some(GenerationConfig::ANALYSIS.capped(self.session.output_limit)),
        };
        self.stage(AnalysisStage::PromptBuilt, fingerprint, json!({ "model": request.model }));
        self.stage(AnalysisStage::ModelCallPending, fingerprint, json!({}));

        let text = self
            .session
            .client
            .generate(&self.session.api_key, &request)?
            .unwrap_or_else(|| NO_ANALYSIS_TEXT.to_string());
        self.stage(AnalysisStage::ModelResponded, fingerprint, json!({ "chars": text.chars().count() }));

        let annotated = prepend_quality_banner(&text, &assessment);
        let classification = classify(&annotated);
        self.stage(
            AnalysisStage::Classified,
            fingerprint,
            json!({
                "context": classification.context.as_str(),
                "is_medical": classification.is_medical,
                "confidence": classification.confidence,
            }),
        );

        let composed = compose_response(&annotated, &classification);
        let sections = sectionize(&composed);
        self.stage(AnalysisStage::Formatted, fingerprint, json!({ "sections": sections.len() }));

        let analysis = match augment_with_literature(&composed) {
            Ok(Some(block)) => {
                self.stage(AnalysisStage::ResourceAugmented, fingerprint, json!({}));
                format!("{composed}\n\n{block}")
            }
            Ok(None) => composed,
            Err(err) => {
                tracing::warn!("could not add research context: {err:#}");
                composed
            }
        };

        self.session.store.set(analysis.clone());
        Ok(ImageAnalysis {
            analysis,
            validation: classification.summary(),
            image_quality: assessment,
            sections,
        })
    }

    /// Encode-only under the threshold, else walk the ladder; the last rung
    /// always produces a payload.
    fn compress(&self, upload: &ImageUpload) -> Result<Reduction, TriageError> {
        let limits = &self.session.limits;
        if upload.bytes.len() <= limits.compress_above_bytes {
            tracing::debug!(image = %upload.name, "image small enough, sending original");
            return Ok(Reduction::passthrough(&upload.bytes, &upload.mime_type));
        }

        let Some((last, rungs)) = limits.ladder_kb.split_last() else {
            return Err(TriageError::CompressionExhausted(
                "no compression targets configured".to_string(),
            ));
        };
        for target_kb in rungs {
            match self.reducer.try_encoders(&upload.bytes, &upload.mime_type, *target_kb) {
                Ok(reduction) => return Ok(reduction),
                Err(err) => tracing::info!(target_kb, "compression rung failed: {err}"),
            }
        }
        Ok(self
            .reducer
            .reduce_to_target(&upload.bytes, &upload.mime_type, *last))
    }

    fn stage(&self, stage: AnalysisStage, fingerprint: &str, detail: serde_json::Value) {
        let mut payload = json!({ "stage": stage.as_str(), "fingerprint": fingerprint });
        if let (Some(target), serde_json::Value::Object(extra)) = (payload.as_object_mut(), detail) {
            target.extend(extra);
        }
        self.session.emit("analysis_stage", payload);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn failed_item(index: usize, name: &str, error: String, code: &str) -> BatchItem {
    BatchItem {
        index,
        name: name.to_string(),
        result: None,
        error: Some(error),
        error_code: Some(code.to_string()),
    }
}

fn augment_with_literature(analysis: &str) -> anyhow::Result<Option<String>> {
    let Some(condition) = diagnosed_condition(analysis) else {
        return Ok(None);
    };
    research_block(&condition).map(Some)
}

fn tier_label(tier: ReductionTier) -> &'static str {
    match tier {
        ReductionTier::Passthrough => "passthrough",
        ReductionTier::Encoded(name) => name,
        ReductionTier::Truncated => "truncated",
        ReductionTier::Placeholder => "placeholder",
    }
}
