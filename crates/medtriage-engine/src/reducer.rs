//! Shrinks uploaded images until their payload fits a size budget.
//!
//! The chain is: passthrough when already small enough, then each
//! registered [`ImageEncoder`] in order, then base64 truncation, then a
//! fixed 1×1 JPEG. [`ImageSizeReducer::reduce_to_target`] always yields a
//! decodable base64 payload.

use std::io::Cursor;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{imageops, DynamicImage, GenericImageView, ImageFormat, RgbImage, Rgba, RgbaImage};
use medtriage_contracts::errors::TriageError;

use crate::quality::base64_size_kb;

/// Minimal baseline 1×1 grey JPEG.
pub const PLACEHOLDER_JPEG_BASE64: &str = "/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAAEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQH/wAALCAABAAEBAREA/8QAFAABAAAAAAAAAAAAAAAAAAAAAP/EABQQAQAAAAAAAAAAAAAAAAAAAAD/2gAIAQEAAD8AP//Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionTier {
    Passthrough,
    Encoded(&'static str),
    Truncated,
    Placeholder,
}

/// A base64 payload and the mime type it should be sent as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub payload: String,
    pub mime_type: String,
    pub tier: ReductionTier,
}

impl Reduction {
    pub fn passthrough(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            payload: BASE64.encode(bytes),
            mime_type: mime_type.to_string(),
            tier: ReductionTier::Passthrough,
        }
    }
}

pub trait ImageEncoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool {
        true
    }

    /// Re-encodes `bytes` as JPEG no longer than `target_bytes`.
    /// `mime_type` is a decoding hint.
    fn encode_under(&self, bytes: &[u8], mime_type: &str, target_bytes: usize) -> Result<Vec<u8>>;
}

/// Quality/dimension schedule shared by the JPEG encoders. Quality drops by
/// `coarse_step` while above `fine_below`, then by `fine_step` with the box
/// shrunk on every fine step.
#[derive(Debug, Clone, Copy)]
struct QualityLadder {
    start_dim: u32,
    start_quality: u8,
    floor_quality: u8,
    coarse_step: u8,
    fine_below: u8,
    fine_step: u8,
    shrink: f32,
    failure_step: u8,
}

const PRIMARY_LADDER: QualityLadder = QualityLadder {
    start_dim: 1024,
    start_quality: 80,
    floor_quality: 10,
    coarse_step: 10,
    fine_below: 50,
    fine_step: 5,
    shrink: 0.9,
    failure_step: 20,
};

const SECONDARY_LADDER: QualityLadder = QualityLadder {
    start_dim: 1200,
    fine_below: 0,
    ..PRIMARY_LADDER
};

impl QualityLadder {
    fn run(
        &self,
        encoder: &'static str,
        source: &DynamicImage,
        target_bytes: usize,
        resize: impl Fn(&DynamicImage, u32) -> DynamicImage,
    ) -> Result<Vec<u8>> {
        let mut dim = self.start_dim;
        let mut quality = self.start_quality;

        while quality > self.floor_quality {
            let (width, height) = source.dimensions();
            let frame = if width > dim || height > dim {
                resize(source, dim)
            } else {
                source.clone()
            };
            match encode_jpeg(&frame, quality) {
                Ok(bytes) => {
                    tracing::debug!(
                        encoder,
                        quality,
                        dim,
                        size_kb = bytes.len() / 1024,
                        "jpeg attempt"
                    );
                    if bytes.len() <= target_bytes {
                        return Ok(bytes);
                    }
                    if quality > self.fine_below {
                        quality = quality.saturating_sub(self.coarse_step);
                    } else {
                        quality = quality.saturating_sub(self.fine_step);
                        dim = ((dim as f32) * self.shrink).floor().max(64.0) as u32;
                    }
                }
                Err(err) => {
                    tracing::warn!(encoder, quality, "jpeg attempt failed: {err:#}");
                    quality = quality.saturating_sub(self.failure_step);
                }
            }
        }

        bail!(
            "{encoder} could not reach {} KB above quality {}",
            target_bytes / 1024,
            self.floor_quality
        )
    }
}

/// Lanczos3 resampling inside a 1024px box.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanczosJpegEncoder;

impl ImageEncoder for LanczosJpegEncoder {
    fn name(&self) -> &'static str {
        "lanczos-jpeg"
    }

    fn is_available(&self) -> bool {
        ImageFormat::Jpeg.writing_enabled()
    }

    fn encode_under(&self, bytes: &[u8], mime_type: &str, target_bytes: usize) -> Result<Vec<u8>> {
        let source = decode_flattened(bytes, mime_type)?;
        PRIMARY_LADDER.run(self.name(), &source, target_bytes, |image, dim| {
            image.resize(dim, dim, FilterType::Lanczos3)
        })
    }
}

/// Fast thumbnail sampling inside a 1200px box.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThumbnailJpegEncoder;

impl ImageEncoder for ThumbnailJpegEncoder {
    fn name(&self) -> &'static str {
        "thumbnail-jpeg"
    }

    fn encode_under(&self, bytes: &[u8], mime_type: &str, target_bytes: usize) -> Result<Vec<u8>> {
        let source = decode_flattened(bytes, mime_type)?;
        SECONDARY_LADDER.run(self.name(), &source, target_bytes, |image, dim| {
            image.thumbnail(dim, dim)
        })
    }
}

pub struct ImageSizeReducer {
    encoders: Vec<Box<dyn ImageEncoder>>,
}

impl Default for ImageSizeReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSizeReducer {
    pub fn new() -> Self {
        Self::with_encoders(vec![
            Box::new(LanczosJpegEncoder),
            Box::new(ThumbnailJpegEncoder),
        ])
    }

    pub fn with_encoders(encoders: Vec<Box<dyn ImageEncoder>>) -> Self {
        Self { encoders }
    }

    pub fn encoder_names(&self) -> Vec<&'static str> {
        self.encoders.iter().map(|encoder| encoder.name()).collect()
    }

    /// Passthrough and encoder tiers only; errors once every encoder failed.
    pub fn try_encoders(
        &self,
        bytes: &[u8],
        mime_type: &str,
        target_kb: usize,
    ) -> Result<Reduction, TriageError> {
        let original = Reduction::passthrough(bytes, mime_type);
        let original_kb = base64_size_kb(&original.payload);
        tracing::info!(
            original_kb = original_kb.round() as u64,
            target_kb,
            mime_type,
            "reducing image"
        );
        if original_kb <= target_kb as f64 {
            return Ok(original);
        }

        let target_bytes = target_kb * 1024;
        let mut failures = Vec::new();
        for encoder in &self.encoders {
            if !encoder.is_available() {
                failures.push(format!("{} unavailable", encoder.name()));
                continue;
            }
            match encoder.encode_under(bytes, mime_type, target_bytes) {
                Ok(encoded) => {
                    return Ok(Reduction {
                        payload: BASE64.encode(encoded),
                        mime_type: "image/jpeg".to_string(),
                        tier: ReductionTier::Encoded(encoder.name()),
                    });
                }
                Err(err) => {
                    tracing::warn!(encoder = encoder.name(), "encoder failed: {err:#}");
                    failures.push(format!("{}: {err:#}", encoder.name()));
                }
            }
        }
        Err(TriageError::CompressionExhausted(failures.join("; ")))
    }

    /// Never fails: falls back to truncation and then to a placeholder.
    pub fn reduce_to_target(&self, bytes: &[u8], mime_type: &str, target_kb: usize) -> Reduction {
        match self.try_encoders(bytes, mime_type, target_kb) {
            Ok(reduction) => reduction,
            Err(err) => {
                tracing::warn!("all encoders failed, truncating: {err}");
                truncate_base64(&BASE64.encode(bytes), mime_type, target_kb)
            }
        }
    }
}

/// Cuts a base64 payload down to roughly `min(target_kb, 70%)` of its size.
pub fn truncate_base64(base64: &str, mime_type: &str, target_kb: usize) -> Reduction {
    let current_kb = base64_size_kb(base64);
    let budget_kb = (target_kb as f64).min(current_kb * 0.7);
    let target_len = ((budget_kb * 1024.0 * 4.0) / 3.0).floor() as usize;

    let candidate = if base64.len() <= target_len {
        base64.to_string()
    } else {
        let mut truncated = base64[..(target_len / 4) * 4].to_string();
        while truncated.len() % 4 != 0 {
            truncated.push('=');
        }
        truncated
    };

    match BASE64.decode(candidate.as_bytes()) {
        Ok(decoded) if !decoded.is_empty() => {
            tracing::info!(size_kb = decoded.len() / 1024, "truncated payload");
            Reduction {
                payload: candidate,
                mime_type: mime_type.to_string(),
                tier: ReductionTier::Truncated,
            }
        }
        _ => {
            tracing::error!("truncated payload is not valid base64, using placeholder");
            Reduction {
                payload: PLACEHOLDER_JPEG_BASE64.to_string(),
                mime_type: "image/jpeg".to_string(),
                tier: ReductionTier::Placeholder,
            }
        }
    }
}

fn decode_flattened(bytes: &[u8], mime_type: &str) -> Result<DynamicImage> {
    let image = match ImageFormat::from_mime_type(mime_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format)
            .or_else(|_| image::load_from_memory(bytes)),
        None => image::load_from_memory(bytes),
    }
    .context("image decode failed")?;
    Ok(DynamicImage::ImageRgb8(flatten_onto_white(&image)))
}

/// Composites the image over an opaque white canvas.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let mut canvas = RgbaImage::from_pixel(image.width(), image.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode_image(&image.to_rgb8())
        .context("jpeg encode failed")?;
    Ok(cursor.into_inner())
}
