//! Search sweeps: query lists, paced execution, extraction and store merge.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::{Pacing, pause};
use crate::extract::{
    self, FundingMention, MENTION_CAP, PROFILE_CAP, ProfileMention, VentureMention,
};
use crate::record::CandidateRecord;
use crate::site::{self, AnalysisKind, SiteAnalysis};
use crate::store::{RecordStore, StoreError};
use crate::web::WebSearch;

/// General discovery issues only this many of its queries.
pub const GENERAL_QUERY_LIMIT: usize = 5;
/// Most candidates listed in a discovery report.
pub const REPORTED_STARTUPS: usize = 20;

/// Countries where the ALLVP portfolio query replaces the generic VC query.
const ALLVP_COUNTRIES: &[&str] = &["Mexico", "Colombia"];

pub fn general_queries(country: &str, industry: &str) -> Vec<String> {
    let vc_query = if ALLVP_COUNTRIES.contains(&country) {
        format!("ALLVP {country} investments")
    } else {
        format!("{country} VC investments")
    };
    vec![
        format!("{country} {industry} startups 2024 2023"),
        format!("site:crunchbase.com {country} {industry} startups"),
        format!("{country} artificial intelligence companies"),
        format!("{country} tech startups funding rounds"),
        format!("Kaszek Ventures {country} portfolio"),
        vc_query,
        format!("{country} startup accelerators companies"),
    ]
}

pub fn venture_queries(venture: &str, country: &str) -> Vec<String> {
    vec![
        format!("\"{venture}\" {country} startup"),
        format!("\"{venture}\" artificial intelligence {country}"),
        format!("\"{venture}\" company website"),
        format!("\"{venture}\" funding investment"),
        format!("site:crunchbase.com \"{venture}\""),
    ]
}

pub fn funding_queries(company: &str) -> Vec<String> {
    vec![
        format!("\"{company}\" funding round investment"),
        format!("\"{company}\" Series A venture capital"),
        format!("\"{company}\" raised million funding"),
        format!("site:crunchbase.com \"{company}\""),
    ]
}

pub fn profile_queries(person: &str, company: &str, role: &str) -> Vec<String> {
    vec![
        format!("\"{person}\" {role} \"{company}\" site:linkedin.com"),
        format!("\"{person}\" \"{company}\" LinkedIn"),
        format!("{company} {role} team leadership"),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub country: String,
    pub industry: String,
    pub search_type: &'static str,
    /// New candidates, after deduplication against the store.
    pub total_found: usize,
    pub startups: Vec<CandidateRecord>,
    pub sources_searched: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VentureFindings {
    pub name: String,
    pub country: String,
    pub industry: String,
    pub found_info: Vec<VentureMention>,
    pub websites: Vec<String>,
    pub funding_info: Vec<String>,
}

impl VentureFindings {
    /// Store candidate built from the best mention, if anything was found.
    fn candidate(&self) -> Option<CandidateRecord> {
        let best = self.found_info.first()?;
        Some(CandidateRecord {
            name: Some(self.name.clone()),
            country: Some(self.country.clone()),
            technology: Some(self.industry.clone()),
            description: Some(best.description.clone()),
            website: self.websites.first().cloned(),
            ..CandidateRecord::default()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VentureReport {
    pub country: String,
    pub industry: String,
    pub search_type: &'static str,
    pub ventures_searched: usize,
    pub results: Vec<VentureFindings>,
}

/// Output of a country sweep: general discovery, or named ventures.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Sweep {
    General(DiscoveryReport),
    Ventures(VentureReport),
}

impl Sweep {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to encode sweep")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FundingReport {
    pub company_name: String,
    pub website_url: Option<String>,
    pub funding_data: Vec<FundingMention>,
    pub total_searches: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub person_name: String,
    pub company_name: String,
    pub role_title: String,
    pub profiles_found: Vec<ProfileMention>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyAnalysis {
    pub website_url: String,
    pub analysis_type: AnalysisKind,
    pub timestamp: String,
    #[serde(flatten)]
    pub analysis: SiteAnalysis,
}

/// Runs searches one at a time with a fixed pause between consecutive calls.
struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: false,
        }
    }

    async fn search(&mut self, web: &dyn WebSearch, query: &str) -> Option<String> {
        if self.started {
            pause(self.delay).await;
        }
        self.started = true;
        match web.search(query).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(query, error = %e, "Search failed, skipping");
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct Scout {
    web: Arc<dyn WebSearch>,
    store: Arc<RecordStore>,
    pacing: Pacing,
}

impl Scout {
    pub fn new(web: Arc<dyn WebSearch>, store: Arc<RecordStore>, pacing: Pacing) -> Self {
        Self { web, store, pacing }
    }

    pub fn web(&self) -> &dyn WebSearch {
        self.web.as_ref()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Targeted sweep when ventures are named, general discovery otherwise.
    pub async fn sweep(
        &self,
        country: &str,
        industry: &str,
        ventures: &[String],
    ) -> Result<Sweep, StoreError> {
        if ventures.is_empty() {
            self.discover_startups(country, industry)
                .await
                .map(Sweep::General)
        } else {
            self.search_ventures(ventures, country, industry)
                .await
                .map(Sweep::Ventures)
        }
    }

    /// General discovery: run the first queries, extract candidates, keep
    /// the ones the store has not seen and persist them.
    pub async fn discover_startups(
        &self,
        country: &str,
        industry: &str,
    ) -> Result<DiscoveryReport, StoreError> {
        let queries = general_queries(country, industry);
        let mut pacer = Pacer::new(self.pacing.query_delay());
        let mut candidates = Vec::new();
        for query in queries.iter().take(GENERAL_QUERY_LIMIT) {
            if let Some(text) = pacer.search(self.web.as_ref(), query).await {
                candidates.extend(extract::extract_companies(&text, country, industry));
            }
        }

        let mut seen = self.store.names();
        let fresh: Vec<CandidateRecord> = candidates
            .into_iter()
            .filter(|c| {
                let key = c.key();
                !key.is_empty() && seen.insert(key)
            })
            .collect();
        let added = self.store.add(&fresh)?;
        tracing::info!(country, found = fresh.len(), added, "General discovery complete");

        Ok(DiscoveryReport {
            country: country.to_string(),
            industry: industry.to_string(),
            search_type: "general_discovery",
            total_found: fresh.len(),
            startups: fresh.into_iter().take(REPORTED_STARTUPS).collect(),
            sources_searched: queries.len(),
        })
    }

    /// Targeted sweep for named ventures. Ventures with findings are merged
    /// into the store.
    pub async fn search_ventures(
        &self,
        ventures: &[String],
        country: &str,
        industry: &str,
    ) -> Result<VentureReport, StoreError> {
        let mut pacer = Pacer::new(self.pacing.venture_query_delay());
        let mut results = Vec::with_capacity(ventures.len());
        for venture in ventures {
            let mut mentions = Vec::new();
            for query in venture_queries(venture, country) {
                if let Some(text) = pacer.search(self.web.as_ref(), &query).await {
                    mentions.extend(extract::extract_venture_info(&text, venture));
                }
            }
            let found_info = extract::dedupe(mentions, MENTION_CAP);
            tracing::debug!(venture = %venture, mentions = found_info.len(), "Venture searched");
            results.push(VentureFindings {
                name: venture.clone(),
                country: country.to_string(),
                industry: industry.to_string(),
                websites: distinct(found_info.iter().filter_map(|m| m.website.clone())),
                funding_info: distinct(found_info.iter().filter_map(|m| m.funding_mention.clone())),
                found_info,
            });
        }

        let candidates: Vec<CandidateRecord> =
            results.iter().filter_map(VentureFindings::candidate).collect();
        let added = self.store.add(&candidates)?;
        tracing::info!(country, ventures = ventures.len(), added, "Venture search complete");

        Ok(VentureReport {
            country: country.to_string(),
            industry: industry.to_string(),
            search_type: "specific_ventures",
            ventures_searched: ventures.len(),
            results,
        })
    }

    pub async fn research_funding(&self, company: &str, website: Option<&str>) -> FundingReport {
        let queries = funding_queries(company);
        let mut pacer = Pacer::new(self.pacing.query_delay());
        let mut mentions = Vec::new();
        for query in &queries {
            if let Some(text) = pacer.search(self.web.as_ref(), query).await {
                mentions.extend(extract::extract_funding(&text, company));
            }
        }
        FundingReport {
            company_name: company.to_string(),
            website_url: website.map(str::to_string),
            funding_data: extract::dedupe(mentions, MENTION_CAP),
            total_searches: queries.len(),
        }
    }

    pub async fn search_profiles(&self, person: &str, company: &str, role: &str) -> ProfileReport {
        let mut pacer = Pacer::new(self.pacing.query_delay());
        let mut mentions = Vec::new();
        for query in profile_queries(person, company, role) {
            if let Some(text) = pacer.search(self.web.as_ref(), &query).await {
                mentions.extend(extract::extract_profiles(&text, person, company));
            }
        }
        ProfileReport {
            person_name: person.to_string(),
            company_name: company.to_string(),
            role_title: role.to_string(),
            profiles_found: extract::dedupe(mentions, PROFILE_CAP),
        }
    }

    pub async fn analyze_company(&self, url: &str, kind: AnalysisKind) -> Result<CompanyAnalysis> {
        let content = self.web.scrape(url).await?;
        if content.trim().is_empty() {
            anyhow::bail!("Could not access website");
        }
        Ok(CompanyAnalysis {
            website_url: url.to_string(),
            analysis_type: kind,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            analysis: site::analyze(&content, kind),
        })
    }
}

/// Unique values in first-seen order.
fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(v.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers searches from a fixed table and records every query.
    #[derive(Default)]
    struct ScriptedWeb {
        answers: Vec<(&'static str, &'static str)>,
        failing: Vec<&'static str>,
        page: Option<&'static str>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebSearch for ScriptedWeb {
        async fn search(&self, query: &str) -> Result<String> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.failing.iter().any(|f| query.contains(f)) {
                anyhow::bail!("rate limited");
            }
            Ok(self
                .answers
                .iter()
                .filter(|(needle, _)| query.contains(needle))
                .map(|(_, text)| *text)
                .collect::<Vec<_>>()
                .join("\n"))
        }

        async fn scrape(&self, url: &str) -> Result<String> {
            self.page
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("connection refused: {url}"))
        }
    }

    fn scout_with(web: ScriptedWeb) -> (tempfile::TempDir, Arc<ScriptedWeb>, Scout) {
        paced_scout(web, Pacing::none())
    }

    fn paced_scout(
        web: ScriptedWeb,
        pacing: Pacing,
    ) -> (tempfile::TempDir, Arc<ScriptedWeb>, Scout) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path().join("store.json")).unwrap());
        let web = Arc::new(web);
        let scout = Scout::new(web.clone(), store, pacing);
        (dir, web, scout)
    }

    fn slow_pacing() -> Pacing {
        Pacing {
            query_delay_ms: 2000,
            venture_query_delay_ms: 1500,
            country_delay_secs: 30,
        }
    }

    #[test]
    fn general_query_list_shape() {
        let q = general_queries("Mexico", "AI");
        assert_eq!(q.len(), 7);
        assert_eq!(q[0], "Mexico AI startups 2024 2023");
        assert_eq!(q[5], "ALLVP Mexico investments");
        assert_eq!(general_queries("Peru", "AI")[5], "Peru VC investments");
    }

    #[test]
    fn targeted_query_templates() {
        assert_eq!(venture_queries("Clip", "Mexico")[0], "\"Clip\" Mexico startup");
        assert_eq!(funding_queries("Clip")[3], "site:crunchbase.com \"Clip\"");
        assert_eq!(
            profile_queries("Ana Ruiz", "Clip", "CTO")[0],
            "\"Ana Ruiz\" CTO \"Clip\" site:linkedin.com"
        );
    }

    #[tokio::test]
    async fn general_discovery_issues_five_queries_and_reports_seven() {
        let (_dir, web, scout) = scout_with(ScriptedWeb {
            answers: vec![("startups 2024", "Acme Inc. is an AI startup founded in 2021")],
            ..ScriptedWeb::default()
        });
        let report = scout.discover_startups("Chile", "AI").await.unwrap();
        assert_eq!(web.queries.lock().unwrap().len(), GENERAL_QUERY_LIMIT);
        assert_eq!(report.sources_searched, 7);
        assert_eq!(report.search_type, "general_discovery");
        assert_eq!(report.total_found, 1);
        assert_eq!(report.startups[0].name.as_deref(), Some("Acme"));
        assert_eq!(scout.store().load().len(), 1);
    }

    #[tokio::test]
    async fn known_names_are_not_reported_again() {
        let (_dir, _web, scout) = scout_with(ScriptedWeb {
            answers: vec![
                ("startups 2024", "Acme Inc. is an AI startup founded in 2021"),
                ("crunchbase", "ACME Inc. AI startup profile on Crunchbase"),
            ],
            ..ScriptedWeb::default()
        });
        let first = scout.discover_startups("Chile", "AI").await.unwrap();
        assert_eq!(first.total_found, 1);
        let second = scout.discover_startups("Chile", "AI").await.unwrap();
        assert_eq!(second.total_found, 0);
        assert!(second.startups.is_empty());
        assert_eq!(scout.store().load().len(), 1);
    }

    #[tokio::test]
    async fn failing_queries_are_skipped() {
        let (_dir, web, scout) = scout_with(ScriptedWeb {
            answers: vec![("accelerators", "never asked")],
            failing: vec!["crunchbase", "Kaszek"],
            ..ScriptedWeb::default()
        });
        let report = scout.discover_startups("Peru", "AI").await.unwrap();
        assert_eq!(web.queries.lock().unwrap().len(), 5);
        assert_eq!(report.total_found, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn general_queries_pause_only_between_calls() {
        let (_dir, web, scout) = paced_scout(
            ScriptedWeb {
                failing: vec!["crunchbase"],
                ..ScriptedWeb::default()
            },
            slow_pacing(),
        );
        let start = tokio::time::Instant::now();
        scout.discover_startups("Chile", "AI").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(web.queries.lock().unwrap().len(), GENERAL_QUERY_LIMIT);
        // Five searches, four pauses; a failed search still counts as a call.
        assert!(elapsed >= Duration::from_millis(4 * 2000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(5 * 2000), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn venture_queries_use_their_own_delay() {
        let (_dir, web, scout) = paced_scout(ScriptedWeb::default(), slow_pacing());
        let ventures = vec!["Orbita Labs".to_string(), "Clip".to_string()];
        let start = tokio::time::Instant::now();
        scout.search_ventures(&ventures, "Brazil", "AI").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(web.queries.lock().unwrap().len(), 10);
        assert!(elapsed >= Duration::from_millis(9 * 1500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(10 * 1500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn venture_findings_merge_into_store() {
        let (_dir, _web, scout) = scout_with(ScriptedWeb {
            answers: vec![(
                "\"Orbita Labs\" funding",
                "Orbita Labs, an AI startup, raised $3M in funding https://orbita.io",
            )],
            ..ScriptedWeb::default()
        });
        let ventures = vec!["Orbita Labs".to_string(), "Ghost Co".to_string()];
        let report = scout.search_ventures(&ventures, "Brazil", "AI").await.unwrap();
        assert_eq!(report.ventures_searched, 2);

        let orbita = &report.results[0];
        assert_eq!(orbita.found_info.len(), 1);
        assert_eq!(orbita.websites, vec!["https://orbita.io"]);
        assert_eq!(orbita.funding_info, vec!["$3M"]);
        assert!(report.results[1].found_info.is_empty());

        let stored = scout.store().load();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Orbita Labs");
        assert_eq!(stored[0].location.as_deref(), Some("Brazil"));
        assert_eq!(stored[0].website.as_deref(), Some("https://orbita.io"));
    }

    #[tokio::test]
    async fn sweep_serializes_without_variant_tag() {
        let (_dir, _web, scout) = scout_with(ScriptedWeb::default());
        let json = scout.sweep("Uruguay", "AI", &[]).await.unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["search_type"], "general_discovery");
        assert_eq!(value["startups"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn funding_research_collects_mentions() {
        let (_dir, web, scout) = scout_with(ScriptedWeb {
            answers: vec![("raised million", "Acme raised $5M in a seed round led by Kaszek")],
            ..ScriptedWeb::default()
        });
        let report = scout.research_funding("Acme", Some("https://acme.ai")).await;
        assert_eq!(web.queries.lock().unwrap().len(), 4);
        assert_eq!(report.total_searches, 4);
        assert_eq!(report.funding_data.len(), 1);
        assert_eq!(report.funding_data[0].amount.as_deref(), Some("$5M"));
    }

    #[tokio::test]
    async fn company_analysis_reports_scrape_failure() {
        let (_dir, _web, scout) = scout_with(ScriptedWeb::default());
        assert!(scout.analyze_company("https://down.example", AnalysisKind::Full).await.is_err());

        let (_dir, _web, scout) = scout_with(ScriptedWeb {
            page: Some("About us\nWe build LLM tooling. Founded in 2020."),
            ..ScriptedWeb::default()
        });
        let a = scout
            .analyze_company("https://up.example", AnalysisKind::Company)
            .await
            .unwrap();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["analysis_type"], "company");
        assert_eq!(json["company_info"]["founded_year"], "2020");
        assert!(json.get("technology").is_none());
    }
}
