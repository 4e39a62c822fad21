//! Keyword classification of free text into a medical context.

use medtriage_contracts::analysis::{ClassificationResult, MedicalContext};

pub const AI_DISCLAIMER: &str = "🤖 IMPORTANTE: Este análisis fue generado por Inteligencia Artificial y NO sustituye el criterio médico profesional. Siempre consulte con un médico calificado para obtener un diagnóstico y tratamiento adecuados.";

const NON_MEDICAL_WARNING: &str = "El contenido no parece ser de naturaleza médica";

const GREETING_WORDS: &[&str] = &["hola", "saludos", "hello", "hi", "hey", "buenas", "buenos"];

const GREETING_PHRASES: &[&str] = &["buenos días", "buenas tardes", "buenas noches"];

const SELF_MEDICATION_PHRASES: &[&str] = &[
    "automedicarme",
    "automedico",
    "puedo tomar",
    "me tomo",
    "sin receta",
    "por mi cuenta",
    "sin médico",
    "me automedico",
    "tomar pastillas",
    "qué pastilla",
    "qué medicamento",
    "me doy",
    "me pongo",
];

// Unaccented spellings are listed on purpose: users type both.
const GENERAL_HEALTH_TERMS: &[&str] = &[
    "síntomas",
    "dolor",
    "malestar",
    "enfermedad",
    "salud",
    "medicina",
    "tratamiento",
    "diagnóstico",
    "médico",
    "hospital",
    "clínica",
    "análisis",
    "analisis",
    "examen",
    "radiografía",
    "sangre",
    "presión",
    "resultados",
    "resultado",
    "imagen médica",
    "imagen medica",
    "estudio",
    "estudios",
    "informe",
    "reporte",
    "interpretación",
    "interpretacion",
    "explicame",
    "explica",
    "qué significa",
    "que significa",
    "qué indica",
    "que indica",
    "hallazgos",
    "hallazgo",
    "patología",
    "patologia",
    "anomalía",
    "anomalia",
    "normal",
    "anormal",
    "lesión",
    "lesion",
];

const NON_MEDICAL_PHRASES: &[&str] = &[
    "no parece ser de naturaleza médica",
    "no es médica",
    "no es una imagen médica",
    "not a medical image",
    "not medical",
    "no medical content",
];

const ANALYSIS_REFERENCE_PHRASES: &[&str] = &[
    "resultados del análisis",
    "resultados del analisis",
    "análisis médico",
    "analisis medico",
    "imagen que analizo",
    "imagen analizada",
    "estudio que hice",
    "examen que me hice",
    "interpretación de",
    "interpretacion de",
    "qué significa esto",
    "que significa esto",
    "explicame sobre",
    "explícame sobre",
];

#[derive(Debug, Clone, Copy, Default)]
struct Signals {
    simple_greeting: bool,
    non_medical: bool,
    self_medication: bool,
    general_health: bool,
    analysis_reference: bool,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn is_simple_greeting(lowered: &str) -> bool {
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.is_empty() || words.len() > 3 {
        return false;
    }
    words
        .iter()
        .any(|word| GREETING_WORDS.iter().any(|keyword| word.contains(keyword)))
        || contains_any(&words.join(" "), GREETING_PHRASES)
}

fn signals(text: &str) -> Signals {
    let lowered = text.to_lowercase();
    Signals {
        simple_greeting: is_simple_greeting(&lowered),
        non_medical: contains_any(&lowered, NON_MEDICAL_PHRASES),
        self_medication: contains_any(&lowered, SELF_MEDICATION_PHRASES),
        general_health: contains_any(&lowered, GENERAL_HEALTH_TERMS),
        analysis_reference: contains_any(&lowered, ANALYSIS_REFERENCE_PHRASES),
    }
}

/// Classifies `text`. Pure and deterministic.
pub fn classify(text: &str) -> ClassificationResult {
    let found = signals(text);
    tracing::debug!(
        simple_greeting = found.simple_greeting,
        non_medical = found.non_medical,
        self_medication = found.self_medication,
        general_health = found.general_health,
        analysis_reference = found.analysis_reference,
        "classified text"
    );

    if found.simple_greeting && !found.general_health && !found.self_medication {
        return ClassificationResult {
            is_medical: false,
            confidence: 0.1,
            warnings: Vec::new(),
            context: MedicalContext::Greeting,
            disclaimer: String::new(),
        };
    }

    // A self-medication question stays medical even if it quotes a
    // "not medical" phrase.
    if found.non_medical && !found.self_medication {
        return ClassificationResult {
            is_medical: false,
            confidence: 0.1,
            warnings: vec![NON_MEDICAL_WARNING.to_string()],
            context: MedicalContext::NonMedical,
            disclaimer: AI_DISCLAIMER.to_string(),
        };
    }

    let context = if found.self_medication {
        MedicalContext::SelfMedication
    } else {
        MedicalContext::GeneralHealth
    };
    let is_medical = found.self_medication || found.general_health || found.analysis_reference;

    ClassificationResult {
        is_medical,
        confidence: if is_medical { 0.8 } else { 0.2 },
        warnings: Vec::new(),
        context,
        disclaimer: AI_DISCLAIMER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_greetings_are_greetings() {
        for text in ["hola", "Hola!", "hey doc", "buenas tardes", "Buenos días", "hi"] {
            let result = classify(text);
            assert_eq!(result.context, MedicalContext::Greeting, "{text}");
            assert_eq!(result.confidence, 0.1, "{text}");
            assert!(result.warnings.is_empty(), "{text}");
            assert!(!result.is_medical, "{text}");
            assert!(result.disclaimer.is_empty(), "{text}");
        }
    }

    #[test]
    fn greeting_with_health_terms_is_medical() {
        let result = classify("hola, tengo dolor");
        assert_eq!(result.context, MedicalContext::GeneralHealth);
        assert!(result.is_medical);
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn long_greeting_is_not_a_simple_greeting() {
        let result = classify("hola quisiera saber una cosa");
        assert_ne!(result.context, MedicalContext::Greeting);
        assert!(!result.is_medical);
        assert_eq!(result.confidence, 0.2);
    }

    #[test]
    fn self_medication_is_always_medical() {
        let samples = [
            "¿Puedo tomar ibuprofeno sin receta?",
            "me automedico cuando me duele la cabeza",
            "hola puedo tomar",
            "esto no es médica pero ¿qué pastilla uso?",
            "PUEDO TOMAR algo, not medical really",
        ];
        for text in samples {
            let result = classify(text);
            assert!(result.is_medical, "{text}");
            assert_eq!(result.context, MedicalContext::SelfMedication, "{text}");
            assert_eq!(result.confidence, 0.8, "{text}");
        }
    }

    #[test]
    fn explicit_non_medical_indicator_wins_over_health_terms() {
        let result =
            classify("Esta imagen no parece ser de naturaleza médica, no hay hallazgos.");
        assert_eq!(result.context, MedicalContext::NonMedical);
        assert!(!result.is_medical);
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.warnings, vec![NON_MEDICAL_WARNING.to_string()]);
        assert_eq!(result.disclaimer, AI_DISCLAIMER);
    }

    #[test]
    fn analysis_references_are_medical() {
        let result = classify("¿Me das la interpretación de lo que salió?");
        assert!(result.is_medical);
        assert_eq!(result.context, MedicalContext::GeneralHealth);
    }

    #[test]
    fn unrelated_text_defaults_to_low_confidence_general_health() {
        let result = classify("Recomiéndame una película de acción para esta noche");
        assert!(!result.is_medical);
        assert_eq!(result.context, MedicalContext::GeneralHealth);
        assert_eq!(result.confidence, 0.2);
        assert_eq!(result.disclaimer, AI_DISCLAIMER);
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "Resultados del análisis de sangre";
        assert_eq!(classify(text), classify(text));
    }
}
