//! Company website analysis over scraped page text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::truncate_chars;

const AI_TECHNOLOGIES: &[&str] = &[
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural network",
    "nlp",
    "computer vision",
    "tensorflow",
    "pytorch",
    "transformer",
    "llm",
    "generative ai",
];
const FRAMEWORKS: &[&str] = &[
    "react", "python", "javascript", "node.js", "django", "flask", "fastapi", "kubernetes",
    "docker",
];
const ABOUT_MARKERS: &[&str] = &["about us", "our mission", "what we do"];
const LOCATION_MARKERS: &[&str] = &["headquarters", "based in", "located in", "hq"];
const PRODUCT_MARKERS: &[&str] = &["our product", "our service", "platform", "solution"];
const BUSINESS_MODEL_MARKERS: &[&str] = &["pricing", "subscription", "saas", "api"];
const LEADERSHIP_TITLES: &[&str] = &["ceo", "cto", "founder", "co-founder", "president"];

static FOUNDED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"founded.{0,20}(\d{4})").expect("valid regex"));

/// Which sections of a site to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    #[default]
    Full,
    Company,
    Technology,
    Products,
    Team,
    /// Accepted for callers that ask about funding; pages yield no
    /// funding section, so every section stays empty.
    Funding,
}

impl AnalysisKind {
    fn includes(self, section: AnalysisKind) -> bool {
        self == AnalysisKind::Full || self == section
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub founded_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyInfo {
    pub ai_technologies: Vec<String>,
    pub frameworks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub descriptions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_model_hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub leadership_mentions: Vec<String>,
}

/// Sections extracted from a page. Unrequested sections stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_info: Option<CompanyInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<TechnologyInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<ProductInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamInfo>,
}

pub fn analyze(content: &str, kind: AnalysisKind) -> SiteAnalysis {
    let lower = content.to_lowercase();
    SiteAnalysis {
        company_info: kind
            .includes(AnalysisKind::Company)
            .then(|| company_info(content, &lower)),
        technology: kind
            .includes(AnalysisKind::Technology)
            .then(|| technology_info(&lower)),
        products: kind
            .includes(AnalysisKind::Products)
            .then(|| product_info(content, &lower)),
        team: kind.includes(AnalysisKind::Team).then(|| team_info(content)),
    }
}

fn company_info(content: &str, lower: &str) -> CompanyInfo {
    let mut info = CompanyInfo::default();

    if lower.contains("about") || lower.contains("mission") {
        let lines: Vec<&str> = content.lines().collect();
        if let Some(i) = lines
            .iter()
            .position(|l| contains_any(&l.to_lowercase(), ABOUT_MARKERS))
        {
            let end = (i + 3).min(lines.len());
            info.description = Some(truncate_chars(lines[i..end].join(" ").trim(), 500));
        }
    }

    info.founded_year = FOUNDED_RE
        .captures(lower)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    info.location_hint = LOCATION_MARKERS
        .iter()
        .find_map(|marker| lower.find(marker).map(|start| location_hint(lower, start)));

    info
}

/// The marker plus up to 50 following characters on the same line.
fn location_hint(lower: &str, start: usize) -> String {
    let rest = &lower[start..];
    let line = rest.split('\n').next().unwrap_or(rest);
    let marker_len = LOCATION_MARKERS
        .iter()
        .find(|m| line.starts_with(**m))
        .map_or(0, |m| m.chars().count());
    truncate_chars(line, marker_len + 50)
}

fn technology_info(lower: &str) -> TechnologyInfo {
    TechnologyInfo {
        ai_technologies: present(lower, AI_TECHNOLOGIES),
        frameworks: present(lower, FRAMEWORKS),
    }
}

fn product_info(content: &str, lower: &str) -> ProductInfo {
    let mut info = ProductInfo::default();
    if lower.contains("product") || lower.contains("service") {
        info.descriptions = content
            .lines()
            .filter(|l| contains_any(&l.to_lowercase(), PRODUCT_MARKERS))
            .map(|l| truncate_chars(l.trim(), 200))
            .take(3)
            .collect();
    }
    if contains_any(lower, BUSINESS_MODEL_MARKERS) {
        info.business_model_hint = Some("SaaS/API based".to_string());
    }
    info
}

fn team_info(content: &str) -> TeamInfo {
    TeamInfo {
        leadership_mentions: content
            .lines()
            .map(str::trim)
            .filter(|l| l.chars().count() > 10 && contains_any(&l.to_lowercase(), LEADERSHIP_TITLES))
            .map(|l| truncate_chars(l, 150))
            .take(5)
            .collect(),
    }
}

fn contains_any(lower: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| lower.contains(t))
}

fn present(lower: &str, terms: &[&str]) -> Vec<String> {
    terms
        .iter()
        .filter(|t| lower.contains(**t))
        .map(|t| t.to_string())
        .collect()
}
