use serde::{Deserialize, Serialize};

/// Categorical tag attached to every classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicalContext {
    SelfMedication,
    GeneralHealth,
    Symptoms,
    NonMedical,
    Greeting,
}

impl MedicalContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfMedication => "self_medication",
            Self::GeneralHealth => "general_health",
            Self::Symptoms => "symptoms",
            Self::NonMedical => "non_medical",
            Self::Greeting => "greeting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_medical: bool,
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub context: MedicalContext,
    pub disclaimer: String,
}

impl ClassificationResult {
    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            is_medical: self.is_medical,
            confidence: self.confidence,
            warnings: self.warnings.clone(),
        }
    }
}

/// The part of a classification that is handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub is_medical: bool,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub quality: ImageQuality,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub analysis: String,
    pub validation: ValidationSummary,
    pub image_quality: QualityAssessment,
    pub sections: Vec<AnalysisSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ImageAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysis {
    pub total_images: usize,
    pub successful_analyses: usize,
    pub results: Vec<BatchItem>,
}

impl BatchAnalysis {
    pub fn from_items(mut results: Vec<BatchItem>) -> Self {
        results.sort_by_key(|item| item.index);
        let successful_analyses = results.iter().filter(|item| item.is_success()).count();
        Self {
            total_images: results.len(),
            successful_analyses,
            results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
