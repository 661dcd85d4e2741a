//! Line heuristics that turn search-result text into candidate records and
//! mentions.
//!
//! Every variant works the same way: split into trimmed lines, gate each line
//! on a minimum length and a keyword set, pull fragments out with a few
//! regexes, and emit one record per surviving line. Ranked variants then
//! score, sort and bucket their output.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::record::CandidateRecord;

/// Gate for general company discovery.
pub const DISCOVERY_KEYWORDS: &[&str] = &["startup", "company", "ai", "tech", "founded"];
/// Gate for funding research.
pub const FUNDING_KEYWORDS: &[&str] = &["funding", "raised", "investment", "million", "series"];
/// Domain terms scored for venture mentions.
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "artificial intelligence",
    "ai",
    "machine learning",
    "startup",
    "technology",
    "innovation",
];
/// Business terms scored for venture mentions.
pub const BUSINESS_KEYWORDS: &[&str] = &["company", "founded", "ceo", "funding", "investment", "series"];
/// Role terms scored for profile mentions.
pub const ROLE_KEYWORDS: &[&str] = &["cto", "founder", "ceo", "technical", "engineering", "ai"];

const NAME_INDICATORS: &[&str] = &["company", "startup", "founded", "inc", "ltd"];
const NAME_PUNCTUATION: &[char] = &['.', ',', ';', ':', '"', '\'', '(', ')', '!', '?'];

const DISCOVERY_MIN_LEN: usize = 15;
const TARGETED_MIN_LEN: usize = 20;
const SHORT_DESCRIPTION: usize = 200;
const LONG_DESCRIPTION: usize = 300;
const BUCKET_PREFIX: usize = 100;

/// Result cap for venture and funding mentions.
pub const MENTION_CAP: usize = 10;
/// Result cap for profile mentions.
pub const PROFILE_CAP: usize = 5;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$\d[\d.,]*\s?(?:million|billion|[mbk])\b|\b\d+(?:\.\d+)?\s*(?:million|billion)\b",
    )
    .expect("valid regex")
});
static ROUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pre-seed|seed|series [a-z])\b").expect("valid regex")
});
static LINKEDIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)linkedin\.com/in/[\w-]+").expect("valid regex"));

/// A line mentioning a named venture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VentureMention {
    pub description: String,
    pub website: Option<String>,
    pub funding_mention: Option<String>,
    pub relevance_score: u32,
}

/// A line reporting a company's funding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingMention {
    pub description: String,
    pub amount: Option<String>,
    pub round_type: Option<String>,
    pub source_line: String,
}

/// A line that may point at a person's professional profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMention {
    pub description: String,
    pub linkedin_url: Option<String>,
    pub relevance_score: u32,
}

/// Shared shape for score-sorted, bucket-deduplicated output.
pub trait Mention {
    fn relevance(&self) -> u32 {
        0
    }

    fn description(&self) -> &str;

    /// Bucket identity. Defaults to the lowercased description prefix.
    fn bucket(&self) -> String {
        description_bucket(self.description())
    }
}

impl Mention for VentureMention {
    fn relevance(&self) -> u32 {
        self.relevance_score
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Mention for FundingMention {
    fn description(&self) -> &str {
        &self.description
    }
}

impl Mention for ProfileMention {
    fn relevance(&self) -> u32 {
        self.relevance_score
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn bucket(&self) -> String {
        match &self.linkedin_url {
            Some(url) => url.clone(),
            None => description_bucket(&self.description),
        }
    }
}

/// Sort by relevance (stable, highest first), keep the first item of each
/// bucket and cap the result. Items with an empty bucket are dropped.
pub fn dedupe<M: Mention>(mut items: Vec<M>, cap: usize) -> Vec<M> {
    items.sort_by_key(|m| Reverse(m.relevance()));
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|m| {
            let bucket = m.bucket();
            !bucket.is_empty() && seen.insert(bucket)
        })
        .take(cap)
        .collect()
}

/// Candidate startups from general discovery text.
pub fn extract_companies(text: &str, country: &str, industry: &str) -> Vec<CandidateRecord> {
    gated_lines(text, DISCOVERY_MIN_LEN)
        .filter(|line| contains_any(&line.to_lowercase(), DISCOVERY_KEYWORDS))
        .filter_map(|line| {
            let name = company_name(line)?;
            Some(CandidateRecord {
                name: Some(name),
                description: Some(truncate_chars(line, SHORT_DESCRIPTION)),
                website: find_url(line),
                country: non_blank(country),
                technology: non_blank(industry),
                ..CandidateRecord::default()
            })
        })
        .collect()
}

/// Guess a company name from a line.
///
/// Takes up to two tokens before the first indicator word ("inc", "startup",
/// ...), or failing that the first two capitalized tokens among the first
/// five. Names shorter than three characters are rejected.
pub fn company_name(line: &str) -> Option<String> {
    let words: Vec<&str> = line.split_whitespace().collect();

    let indicator = words.iter().enumerate().skip(1).find(|(_, word)| {
        let bare = word.trim_matches(NAME_PUNCTUATION).to_lowercase();
        NAME_INDICATORS.contains(&bare.as_str())
    });

    let name = match indicator {
        Some((i, _)) => words[i.saturating_sub(2)..i].join(" "),
        None => words
            .iter()
            .take(5)
            .filter(|w| w.chars().count() > 1 && w.chars().next().is_some_and(char::is_uppercase))
            .take(2)
            .copied()
            .collect::<Vec<_>>()
            .join(" "),
    };

    let name = name.trim_matches(NAME_PUNCTUATION).trim();
    (name.chars().count() >= 3).then(|| name.to_string())
}

/// Funding lines about `company`.
pub fn extract_funding(text: &str, company: &str) -> Vec<FundingMention> {
    let Some(company) = non_blank(company).map(|c| c.to_lowercase()) else {
        return Vec::new();
    };
    gated_lines(text, TARGETED_MIN_LEN)
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains(&company) && contains_any(&lower, FUNDING_KEYWORDS)
        })
        .map(|line| FundingMention {
            description: truncate_chars(line, SHORT_DESCRIPTION),
            amount: find_amount(line),
            round_type: find_round(line),
            source_line: line.to_string(),
        })
        .collect()
}

/// Scored lines mentioning `venture`. Lines scoring zero are dropped.
pub fn extract_venture_info(text: &str, venture: &str) -> Vec<VentureMention> {
    let Some(target) = non_blank(venture).map(|v| v.to_lowercase()) else {
        return Vec::new();
    };
    gated_lines(text, TARGETED_MIN_LEN)
        .filter(|line| line.to_lowercase().contains(&target))
        .map(|line| VentureMention {
            description: truncate_chars(line, LONG_DESCRIPTION),
            website: find_url(line),
            funding_mention: find_amount(line),
            relevance_score: venture_relevance(line, venture),
        })
        .filter(|m| m.relevance_score > 0)
        .collect()
}

/// +3 for the venture name, +1 per domain and business keyword present.
pub fn venture_relevance(line: &str, venture: &str) -> u32 {
    let lower = line.to_lowercase();
    let mut score = 0;
    if non_blank(venture).is_some_and(|v| lower.contains(&v.to_lowercase())) {
        score += 3;
    }
    score + count_present(&lower, DOMAIN_KEYWORDS) + count_present(&lower, BUSINESS_KEYWORDS)
}

/// Scored lines mentioning `person` or `company`.
pub fn extract_profiles(text: &str, person: &str, company: &str) -> Vec<ProfileMention> {
    let targets: Vec<String> = [person, company]
        .iter()
        .filter_map(|t| non_blank(t))
        .map(|t| t.to_lowercase())
        .collect();
    if targets.is_empty() {
        return Vec::new();
    }
    gated_lines(text, TARGETED_MIN_LEN)
        .filter(|line| {
            let lower = line.to_lowercase();
            targets.iter().any(|t| lower.contains(t.as_str()))
        })
        .map(|line| ProfileMention {
            description: truncate_chars(line, SHORT_DESCRIPTION),
            linkedin_url: find_linkedin(line),
            relevance_score: profile_relevance(line, person, company),
        })
        .filter(|m| m.relevance_score > 0)
        .collect()
}

/// +3 for the person, +2 for the company, +1 per role keyword.
pub fn profile_relevance(line: &str, person: &str, company: &str) -> u32 {
    let lower = line.to_lowercase();
    let mut score = 0;
    if non_blank(person).is_some_and(|p| lower.contains(&p.to_lowercase())) {
        score += 3;
    }
    if non_blank(company).is_some_and(|c| lower.contains(&c.to_lowercase())) {
        score += 2;
    }
    score + count_present(&lower, ROLE_KEYWORDS)
}

/// First http(s) URL, without trailing sentence punctuation.
pub fn find_url(line: &str) -> Option<String> {
    URL_RE
        .find(line)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', ')', ']', '"', '\'']).to_string())
}

/// First funding amount such as `$5M` or `12 million`.
pub fn find_amount(line: &str) -> Option<String> {
    AMOUNT_RE.find(line).map(|m| m.as_str().to_string())
}

/// Funding round name, lowercased (`series a`, `seed`, `pre-seed`).
pub fn find_round(line: &str) -> Option<String> {
    ROUND_RE.find(line).map(|m| m.as_str().to_lowercase())
}

/// LinkedIn profile path, lowercased (`linkedin.com/in/jane-doe`).
pub fn find_linkedin(line: &str) -> Option<String> {
    LINKEDIN_RE.find(line).map(|m| m.as_str().to_lowercase())
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn gated_lines(text: &str, min_len: usize) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(move |line| line.chars().count() > min_len)
}

fn contains_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower.contains(k))
}

fn count_present(lower: &str, keywords: &[&str]) -> u32 {
    keywords.iter().filter(|k| lower.contains(*k)).count() as u32
}

fn description_bucket(description: &str) -> String {
    truncate_chars(description, BUCKET_PREFIX).to_lowercase()
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
