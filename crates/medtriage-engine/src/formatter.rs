//! Turns model text into HTML fragments, sections and final replies.

use std::sync::LazyLock;

use medtriage_contracts::analysis::{
    AnalysisSection, ClassificationResult, MedicalContext, QualityAssessment,
};
use regex::Regex;

pub const RESPONSE_SEPARATOR: &str = "\n\n---\n\n";

pub const WELCOME_MESSAGE: &str = "¡Hola! 👋 Soy tu asistente médico especializado por IA.

Estoy aquí para ayudarte con consultas relacionadas con salud y medicina. Puedo asistirte con:

• 🩺 Información sobre síntomas y condiciones médicas
• 💊 Orientación sobre tratamientos (siempre consulta con tu médico)
• 🏥 Recomendaciones sobre cuándo buscar atención médica
• 📋 Explicaciones sobre análisis y estudios médicos
• ❓ Respuestas a dudas generales de salud

¿En qué puedo ayudarte hoy?";

pub const REDIRECT_MESSAGE: &str = "Hola! Entiendo que tienes una consulta, pero parece que no está relacionada con medicina o salud.

Soy un asistente especializado en temas médicos y mi objetivo es brindarte información confiable sobre salud. Si tienes alguna pregunta sobre síntomas, tratamientos, o cualquier tema de salud, estaré encantado de ayudarte.

¿Hay algo relacionado con tu salud en lo que pueda asistirte?";

const DEFAULT_SECTION_TITLE: &str = "📋 Análisis Médico";

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[*-] (.+)$").expect("bullet pattern"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("italic pattern"));

/// Converts the inline-markdown subset the model produces into HTML.
///
/// Applying it to its own output is a no-op.
pub fn format_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n");
    let bulleted = BULLET.replace_all(&normalized, "• $1");
    let bolded = BOLD.replace_all(&bulleted, "<strong>$1</strong>");
    let emphasized = ITALIC.replace_all(&bolded, "<em>$1</em>");
    let broken = emphasized.replace("\n\n", "</p><p>").replace('\n', "<br>");

    let mut formatted = if broken.starts_with("<p>") && broken.ends_with("</p>") {
        broken
    } else {
        format!("<p>{broken}</p>")
    };
    while formatted.contains("<p></p>") {
        formatted = formatted.replace("<p></p>", "");
    }
    formatted
}

struct SectionRule {
    title: &'static str,
    heading: &'static [&'static str],
    stops: &'static [&'static str],
}

const SECTION_RULES: &[SectionRule] = &[
    SectionRule {
        title: "📋 Descripción de Hallazgos",
        heading: &["descripción", "observación", "hallazgo"],
        stops: &[
            "diagnóstico",
            "posible",
            "recomendación",
            "tratamiento",
            "advertencia",
            "importante",
            "nota",
        ],
    },
    SectionRule {
        title: "🔍 Posibles Diagnósticos",
        heading: &["diagnóstico", "posible"],
        stops: &["recomendación", "tratamiento", "advertencia", "importante", "nota"],
    },
    SectionRule {
        title: "💊 Recomendaciones de Tratamiento",
        heading: &["recomendación", "tratamiento"],
        stops: &["advertencia", "importante", "nota"],
    },
    SectionRule {
        title: "⚠️ Advertencias Importantes",
        heading: &["advertencia", "importante", "nota"],
        stops: &[],
    },
];

struct CompiledRule {
    title: &'static str,
    heading: Regex,
    stop: Option<Regex>,
}

fn keyword_pattern(words: &[&str]) -> Option<Regex> {
    if words.is_empty() {
        return None;
    }
    let alternation = words
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{alternation})")).ok()
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    SECTION_RULES
        .iter()
        .filter_map(|rule| {
            Some(CompiledRule {
                title: rule.title,
                heading: keyword_pattern(rule.heading)?,
                stop: keyword_pattern(rule.stops),
            })
        })
        .collect()
});

impl CompiledRule {
    /// Body of this rule's section inside `text`, if its heading occurs.
    fn capture<'a>(&self, text: &'a str) -> Option<&'a str> {
        let heading = self.heading.find(text)?;
        let after = heading.end();
        let line_end = text[after..]
            .find('\n')
            .map(|offset| after + offset)
            .unwrap_or(text.len());
        let body_start = match text[after..line_end].find(':') {
            Some(offset) => after + offset + 1,
            None => line_end,
        };

        let rest = &text[body_start..];
        let mut body_end = self
            .stop
            .as_ref()
            .and_then(|stop| stop.find(rest))
            .map(|found| found.start())
            .unwrap_or(rest.len());
        // A stop word inside a markdown heading ends the body at that heading's line.
        let line_start = rest[..body_end].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
        if rest[line_start..body_end].trim_start().starts_with('#') {
            body_end = line_start;
        }

        let body = rest[..body_end]
            .trim_start_matches(|ch: char| ch == '*' || ch.is_whitespace())
            .trim_end();
        (!body.is_empty()).then_some(body)
    }
}

/// Splits an analysis into titled sections, one per recognized heading.
pub fn sectionize(raw: &str) -> Vec<AnalysisSection> {
    let mut sections: Vec<AnalysisSection> = COMPILED_RULES
        .iter()
        .filter_map(|rule| {
            rule.capture(raw).map(|body| AnalysisSection {
                title: rule.title.to_string(),
                content: format_text(body),
            })
        })
        .collect();

    if sections.is_empty() {
        sections.push(AnalysisSection {
            title: DEFAULT_SECTION_TITLE.to_string(),
            content: format_text(raw),
        });
    }
    sections
}

/// Final reply text for `text` under `classification`.
pub fn compose_response(text: &str, classification: &ClassificationResult) -> String {
    match classification.context {
        MedicalContext::Greeting => WELCOME_MESSAGE.to_string(),
        MedicalContext::NonMedical
            if !classification.is_medical && classification.confidence < 0.3 =>
        {
            format!(
                "{REDIRECT_MESSAGE}{RESPONSE_SEPARATOR}{}",
                classification.disclaimer
            )
        }
        _ => format!("{text}{RESPONSE_SEPARATOR}{}", classification.disclaimer),
    }
}

/// Prefixes an image-quality warning block when the assessment found issues.
pub fn prepend_quality_banner(analysis: &str, assessment: &QualityAssessment) -> String {
    if assessment.issues.is_empty() {
        return analysis.to_string();
    }
    let bullets = |rows: &[String]| {
        rows.iter()
            .map(|row| format!("- {row}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "### ⚠️ Evaluación de Calidad de Imagen\n\n**Calidad Detectada:** {}\n\n**Limitaciones Identificadas:**\n{}\n\n**Recomendaciones:**\n{}\n\n---\n\n{analysis}",
        assessment.quality.as_str().to_uppercase(),
        bullets(&assessment.issues),
        bullets(&assessment.recommendations),
    )
}

#[cfg(test)]
mod tests {
    use medtriage_contracts::analysis::ImageQuality;

    use super::*;
    use crate::classifier::{classify, AI_DISCLAIMER};

    #[test]
    fn format_text_converts_inline_markdown() {
        let html = format_text("**Hallazgo** principal\n* uno\n- dos\n\nTexto *leve*");
        assert_eq!(
            html,
            "<p><strong>Hallazgo</strong> principal<br>• uno<br>• dos</p><p>Texto <em>leve</em></p>"
        );
    }

    #[test]
    fn format_text_drops_empty_paragraphs() {
        assert_eq!(format_text(""), "");
        assert_eq!(format_text("a\n\n\n\nb"), "<p>a</p><p>b</p>");
    }

    #[test]
    fn format_text_is_idempotent() {
        for raw in [
            "**Diagnóstico:** normal\n\n* sin lesiones",
            "linea uno\nlinea dos",
            "",
            "un * suelto y *otro*",
        ] {
            let once = format_text(raw);
            assert_eq!(format_text(&once), once, "{raw}");
        }
    }

    #[test]
    fn italic_does_not_span_lines() {
        assert_eq!(format_text("a *b\nc* d"), "<p>a *b<br>c* d</p>");
    }

    #[test]
    fn sectionize_splits_known_headings() {
        let text = "Hallazgos: opacidad en lóbulo inferior derecho.\n\
                    Diagnóstico: neumonía probable.\n\
                    Recomendación: radiografía de control en 2 semanas.\n\
                    Advertencia: acuda a urgencias si hay fiebre alta.";
        let sections = sectionize(text);
        let titles: Vec<&str> = sections.iter().map(|row| row.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "📋 Descripción de Hallazgos",
                "🔍 Posibles Diagnósticos",
                "💊 Recomendaciones de Tratamiento",
                "⚠️ Advertencias Importantes",
            ]
        );
        assert_eq!(sections[0].content, "<p>opacidad en lóbulo inferior derecho.</p>");
        assert_eq!(sections[1].content, "<p>neumonía probable.</p>");
        assert!(sections[3].content.contains("urgencias"));
    }

    #[test]
    fn sectionize_cuts_bodies_at_markdown_headings() {
        let text = "### Hallazgos Clave\n- Fractura de radio distal\n\n### Diagnóstico\n- Fractura";
        let sections = sectionize(text);
        assert_eq!(sections[0].title, "📋 Descripción de Hallazgos");
        assert_eq!(sections[0].content, "<p>• Fractura de radio distal</p>");
        assert_eq!(sections[1].title, "🔍 Posibles Diagnósticos");
        assert_eq!(sections[1].content, "<p>• Fractura</p>");
    }

    #[test]
    fn sectionize_falls_back_to_single_section() {
        let sections = sectionize("Sin encabezados reconocibles aquí.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "📋 Análisis Médico");
        assert_eq!(sections[0].content, "<p>Sin encabezados reconocibles aquí.</p>");
    }

    #[test]
    fn compose_greeting_returns_welcome_verbatim() {
        let reply = compose_response("ignored", &classify("hola"));
        assert_eq!(reply, WELCOME_MESSAGE);
    }

    #[test]
    fn compose_non_medical_redirects_with_disclaimer() {
        let reply = compose_response("", &classify("this is not medical"));
        assert!(reply.starts_with(REDIRECT_MESSAGE));
        assert!(reply.ends_with(AI_DISCLAIMER));
    }

    #[test]
    fn compose_medical_appends_disclaimer() {
        let reply = compose_response("Dolor lumbar leve.", &classify("dolor de espalda"));
        assert_eq!(reply, format!("Dolor lumbar leve.{RESPONSE_SEPARATOR}{AI_DISCLAIMER}"));
    }

    #[test]
    fn quality_banner_only_when_issues_exist() {
        let clean = QualityAssessment {
            quality: ImageQuality::Good,
            issues: Vec::new(),
            recommendations: Vec::new(),
        };
        assert_eq!(prepend_quality_banner("texto", &clean), "texto");

        let poor = QualityAssessment {
            quality: ImageQuality::Poor,
            issues: vec!["Resolución limitada".to_string()],
            recommendations: vec!["Usar otra imagen".to_string()],
        };
        let banner = prepend_quality_banner("texto", &poor);
        assert!(banner.starts_with("### ⚠️ Evaluación de Calidad de Imagen"));
        assert!(banner.contains("**Calidad Detectada:** POOR"));
        assert!(banner.contains("- Resolución limitada"));
        assert!(banner.ends_with("---\n\ntexto"));
    }
}
