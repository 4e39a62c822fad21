use thiserror::Error;

/// Coarse class of a non-2xx reply from the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    TooLarge,
    Malformed,
    KeyInvalid,
    RateLimited,
    Other,
}

impl UpstreamErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            413 => Self::TooLarge,
            400 => Self::Malformed,
            403 => Self::KeyInvalid,
            429 => Self::RateLimited,
            _ => Self::Other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TooLarge => "PAYLOAD_TOO_LARGE",
            Self::Malformed => "INVALID_ARGUMENT",
            Self::KeyInvalid => "API_KEY_INVALID",
            Self::RateLimited => "RESOURCE_EXHAUSTED",
            Self::Other => "UPSTREAM_ERROR",
        }
    }
}

pub const MISSING_IMAGE_INPUT: &str = "API Key e imagen son requeridos";
pub const MISSING_PROMPT_INPUT: &str = "API Key y prompt son requeridos";

/// Every failure a single analysis or chat turn can surface. `Display`
/// renders the user-facing message.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("{0}")]
    MissingInput(&'static str),
    #[error("La imagen es demasiado grande. Máximo 10MB.")]
    InputTooLarge { size: usize },
    #[error("No se pudo comprimir la imagen: {0}")]
    CompressionExhausted(String),
    #[error("No se pudo procesar la imagen. Por favor, intenta con una imagen diferente o de menor tamaño.")]
    ImageCorrupted,
    #[error("No se pudo leer la imagen {0}")]
    ImageUnreadable(String),
    #[error("{message}")]
    Upstream {
        status: u16,
        kind: UpstreamErrorKind,
        message: String,
    },
    #[error("{0}")]
    UpstreamMalformed(String),
    #[error("Error de conexión con la API de Google: {0}")]
    Transport(String),
}

impl TriageError {
    /// HTTP-equivalent status for the failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingInput(_)
            | Self::InputTooLarge { .. }
            | Self::CompressionExhausted(_)
            | Self::ImageCorrupted
            | Self::ImageUnreadable(_) => 400,
            Self::Upstream { .. } | Self::UpstreamMalformed(_) | Self::Transport(_) => 500,
        }
    }

    /// Stable machine-readable tag for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingInput(_) => "MISSING_INPUT",
            Self::InputTooLarge { .. } => "INPUT_TOO_LARGE",
            Self::CompressionExhausted(_) => "COMPRESSION_EXHAUSTED",
            Self::ImageCorrupted => "IMAGE_CORRUPTED",
            Self::ImageUnreadable(_) => "IMAGE_UNREADABLE",
            Self::Upstream { kind, .. } => kind.code(),
            Self::UpstreamMalformed(_) => "UPSTREAM_MALFORMED",
            Self::Transport(_) => "TRANSPORT",
        }
    }

    pub fn upstream_kind(&self) -> Option<UpstreamErrorKind> {
        match self {
            Self::Upstream { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_to_kind() {
        assert_eq!(UpstreamErrorKind::from_status(413), UpstreamErrorKind::TooLarge);
        assert_eq!(UpstreamErrorKind::from_status(403).code(), "API_KEY_INVALID");
        assert_eq!(UpstreamErrorKind::from_status(429), UpstreamErrorKind::RateLimited);
        assert_eq!(UpstreamErrorKind::from_status(502), UpstreamErrorKind::Other);
    }

    #[test]
    fn display_is_user_facing() {
        let err = TriageError::InputTooLarge { size: 11 << 20 };
        assert_eq!(err.to_string(), "La imagen es demasiado grande. Máximo 10MB.");
        assert_eq!(err.status_code(), 400);

        let upstream = TriageError::Upstream {
            status: 403,
            kind: UpstreamErrorKind::KeyInvalid,
            message: "API Key inválida o sin permisos".to_string(),
        };
        assert_eq!(upstream.to_string(), "API Key inválida o sin permisos");
        assert_eq!(upstream.status_code(), 500);
        assert_eq!(upstream.upstream_kind(), Some(UpstreamErrorKind::KeyInvalid));
        assert_eq!(upstream.code(), "API_KEY_INVALID");
        assert_eq!(TriageError::ImageCorrupted.code(), "IMAGE_CORRUPTED");

        let unreadable = TriageError::ImageUnreadable("rx.jpg".to_string());
        assert_eq!(unreadable.to_string(), "No se pudo leer la imagen rx.jpg");
        assert_eq!(unreadable.status_code(), 400);
        assert_eq!(unreadable.code(), "IMAGE_UNREADABLE");

        assert_eq!(
            TriageError::MissingInput(MISSING_IMAGE_INPUT).to_string(),
            "API Key e imagen son requeridos"
        );
    }
}
