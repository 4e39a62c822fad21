use medtriage_contracts::analysis::{ImageQuality, QualityAssessment};

/// Approximate decoded size, in KB, of a base64 payload.
pub fn base64_size_kb(base64: &str) -> f64 {
    (base64.len() as f64 * 3.0) / 4.0 / 1024.0
}

/// Rates an encoded image from its size and declared mime type alone.
pub fn assess(base64: &str, mime_type: &str) -> QualityAssessment {
    let size_kb = base64_size_kb(base64);
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    let mut quality = if size_kb < 50.0 {
        issues.push("Imagen muy pequeña, puede afectar la precisión del diagnóstico".to_string());
        recommendations.push("Usar imagen de mayor resolución si está disponible".to_string());
        ImageQuality::Poor
    } else if size_kb < 100.0 {
        issues.push("Resolución limitada".to_string());
        recommendations.push("Considerar imagen de mayor calidad para mejor análisis".to_string());
        ImageQuality::Fair
    } else if size_kb > 2000.0 {
        ImageQuality::Excellent
    } else {
        ImageQuality::Good
    };

    if !mime_type.trim().to_ascii_lowercase().starts_with("image/") {
        quality = ImageQuality::Poor;
        issues.push("Formato de archivo no óptimo".to_string());
        recommendations.push("Usar formatos JPEG o PNG para mejores resultados".to_string());
    }

    QualityAssessment {
        quality,
        issues,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    use super::*;

    fn payload_of_kb(kb: usize) -> String {
        BASE64.encode(vec![0u8; kb * 1024])
    }

    #[test]
    fn rating_follows_size_thresholds() {
        let poor = assess(&payload_of_kb(40), "image/jpeg");
        assert_eq!(poor.quality, ImageQuality::Poor);
        assert_eq!(poor.issues.len(), 1);
        assert_eq!(poor.recommendations.len(), 1);

        let fair = assess(&payload_of_kb(80), "image/jpeg");
        assert_eq!(fair.quality, ImageQuality::Fair);
        assert_eq!(fair.issues, vec!["Resolución limitada".to_string()]);

        let good = assess(&payload_of_kb(1500), "image/png");
        assert_eq!(good.quality, ImageQuality::Good);
        assert!(good.issues.is_empty());

        let excellent = assess(&payload_of_kb(3000), "image/jpeg");
        assert_eq!(excellent.quality, ImageQuality::Excellent);
        assert!(excellent.recommendations.is_empty());
    }

    #[test]
    fn rating_never_improves_as_size_shrinks() {
        let sizes = [3000, 1500, 80, 40];
        let ratings: Vec<ImageQuality> = sizes
            .iter()
            .map(|kb| assess(&payload_of_kb(*kb), "image/jpeg").quality)
            .collect();
        assert!(ratings.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn non_image_mime_is_always_poor() {
        for kb in [40, 80, 1500, 3000] {
            let result = assess(&payload_of_kb(kb), "application/pdf");
            assert_eq!(result.quality, ImageQuality::Poor, "{kb}KB");
            assert!(result
                .issues
                .iter()
                .any(|issue| issue == "Formato de archivo no óptimo"));
        }
    }

    #[test]
    fn under_fifty_kb_is_always_poor() {
        let result = assess(&BASE64.encode(vec![7u8; 50_000]), "image/jpeg");
        assert_eq!(result.quality, ImageQuality::Poor);
        assert!(!result.issues.is_empty());
    }
}
