//! Search links into public medical literature for a diagnosed condition.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use url::Url;

const PUBMED_SEARCH: &str = "https://pubmed.ncbi.nlm.nih.gov/search/";
const PMC_SEARCH: &str = "https://www.ncbi.nlm.nih.gov/pmc/";
const SCHOLAR_SEARCH: &str = "https://scholar.google.com/scholar";

static DIAGNOSIS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)diagnóstico[^:]*:\s*([^.\n]+)").expect("diagnosis pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteratureLink {
    pub label: String,
    pub url: String,
}

/// First non-empty condition named after a "diagnóstico ...:" label, if any.
pub fn diagnosed_condition(analysis: &str) -> Option<String> {
    DIAGNOSIS_LINE
        .captures_iter(analysis)
        .filter_map(|captures| captures.get(1))
        .map(|found| {
            found
                .as_str()
                .trim_matches(|ch: char| ch == '*' || ch.is_whitespace())
                .to_string()
        })
        .find(|condition| !condition.is_empty())
}

pub fn literature_links(condition: &str) -> Result<Vec<LiteratureLink>> {
    let scholar_query = format!("{condition} medical");
    let sources = [
        ("PubMed", PUBMED_SEARCH, "term", condition),
        ("PMC Articles", PMC_SEARCH, "term", condition),
        ("Google Scholar", SCHOLAR_SEARCH, "q", scholar_query.as_str()),
    ];
    sources
        .into_iter()
        .map(|(source, base, key, query)| {
            let url = Url::parse_with_params(base, &[(key, query)])
                .with_context(|| format!("invalid search url for {source}"))?;
            Ok(LiteratureLink {
                label: format!("{source} - {condition}"),
                url: url.to_string(),
            })
        })
        .collect()
}

pub fn research_block(condition: &str) -> Result<String> {
    let links = literature_links(condition)?
        .into_iter()
        .map(|link| format!("- [{}]({})", link.label, link.url))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(format!(
        "### Recursos de Investigación Médica Relevantes:\n\n**Literatura Médica Reciente:**\n{links}\n\n**Recomendación:** Consulta estas fuentes para obtener la información más actualizada sobre {condition} y sus protocolos de tratamiento."
    ))
}
