//! Tools offered to stage agents and their execution.
//!
//! Every tool returns pretty JSON or plain text that goes back to the model
//! as a tool result.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::llm::ToolDef;
use crate::scout::Scout;
use crate::site::AnalysisKind;

pub const STARTUP_DISCOVERY: &str = "startup_discovery_tool";
pub const COMPANY_ANALYSIS: &str = "company_analysis_tool";
pub const FUNDING_RESEARCH: &str = "funding_research_tool";
pub const LINKEDIN_SEARCH: &str = "linkedin_search_tool";
pub const WEB_SEARCH: &str = "web_search";
pub const SCRAPE_WEBSITE: &str = "scrape_website";

/// Definitions for the named tools, in the given order. Unknown names are
/// skipped.
pub fn tool_defs(names: &[&str]) -> Vec<ToolDef> {
    names.iter().filter_map(|name| tool_def(name)).collect()
}

fn tool_def(name: &str) -> Option<ToolDef> {
    let (description, input_schema) = match name {
        STARTUP_DISCOVERY => (
            "Discover AI startups in a Latin American country by searching VC portfolios, \
             startup databases and tech news. Searches for specific ventures when given.",
            json!({
                "type": "object",
                "properties": {
                    "country": {"type": "string", "description": "Country to search, e.g. Brazil"},
                    "industry": {"type": "string", "description": "Industry focus (default AI)"},
                    "specific_ventures": {"type": "array", "items": {"type": "string"}, "description": "Venture names to search for"},
                    "funding_stage": {"type": "string", "description": "Funding stage filter (default all)"}
                },
                "required": ["country"]
            }),
        ),
        COMPANY_ANALYSIS => (
            "Analyze a company's website for company info, technology stack, products and team.",
            json!({
                "type": "object",
                "properties": {
                    "website_url": {"type": "string", "description": "Company website URL"},
                    "analysis_type": {"type": "string", "enum": ["full", "company", "technology", "products", "team", "funding"]}
                },
                "required": ["website_url"]
            }),
        ),
        FUNDING_RESEARCH => (
            "Research a company's funding rounds in funding databases and news.",
            json!({
                "type": "object",
                "properties": {
                    "company_name": {"type": "string"},
                    "website_url": {"type": "string"}
                },
                "required": ["company_name"]
            }),
        ),
        LINKEDIN_SEARCH => (
            "Search for LinkedIn profiles of company executives and technical leaders.",
            json!({
                "type": "object",
                "properties": {
                    "person_name": {"type": "string"},
                    "company_name": {"type": "string"},
                    "role_title": {"type": "string", "description": "Role to search for (default CTO)"}
                },
                "required": ["person_name", "company_name"]
            }),
        ),
        WEB_SEARCH => (
            "Search the web. Returns result titles, URLs and snippets as text.",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        ),
        SCRAPE_WEBSITE => (
            "Fetch a web page and return its visible text.",
            json!({
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"]
            }),
        ),
        _ => return None,
    };
    Some(ToolDef {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    })
}

#[derive(Debug, Deserialize)]
struct DiscoveryInput {
    country: String,
    #[serde(default = "default_industry")]
    industry: String,
    #[serde(default)]
    specific_ventures: Option<Vec<String>>,
    #[serde(default = "default_funding_stage")]
    funding_stage: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisInput {
    website_url: String,
    #[serde(default)]
    analysis_type: AnalysisKind,
}

#[derive(Debug, Deserialize)]
struct FundingInput {
    company_name: String,
    #[serde(default)]
    website_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileInput {
    person_name: String,
    company_name: String,
    #[serde(default = "default_role")]
    role_title: String,
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ScrapeInput {
    url: String,
}

fn default_industry() -> String {
    "AI".to_string()
}

fn default_funding_stage() -> String {
    "all".to_string()
}

fn default_role() -> String {
    "CTO".to_string()
}

fn parse<T: for<'de> Deserialize<'de>>(tool: &str, input: &Value) -> Result<T> {
    serde_json::from_value(input.clone()).with_context(|| format!("Invalid input for {tool}"))
}

fn pretty(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to encode tool output")
}

/// Executes tool calls against the scout.
#[derive(Clone)]
pub struct Toolbox {
    scout: Scout,
}

impl Toolbox {
    pub fn new(scout: Scout) -> Self {
        Self { scout }
    }

    pub async fn execute(&self, name: &str, input: &Value) -> Result<String> {
        tracing::debug!(tool = name, "Executing tool");
        match name {
            STARTUP_DISCOVERY => {
                let args: DiscoveryInput = parse(name, input)?;
                // Funding stage does not filter results.
                tracing::debug!(funding_stage = %args.funding_stage, "Discovery requested");
                let ventures = args.specific_ventures.unwrap_or_default();
                let sweep = self
                    .scout
                    .sweep(&args.country, &args.industry, &ventures)
                    .await?;
                sweep.to_json()
            }
            COMPANY_ANALYSIS => {
                let args: AnalysisInput = parse(name, input)?;
                match self
                    .scout
                    .analyze_company(&args.website_url, args.analysis_type)
                    .await
                {
                    Ok(analysis) => pretty(&analysis),
                    Err(e) => pretty(&json!({"error": e.to_string(), "url": args.website_url})),
                }
            }
            FUNDING_RESEARCH => {
                let args: FundingInput = parse(name, input)?;
                let report = self
                    .scout
                    .research_funding(&args.company_name, args.website_url.as_deref())
                    .await;
                pretty(&report)
            }
            LINKEDIN_SEARCH => {
                let args: ProfileInput = parse(name, input)?;
                let report = self
                    .scout
                    .search_profiles(&args.person_name, &args.company_name, &args.role_title)
                    .await;
                pretty(&report)
            }
            WEB_SEARCH => {
                let args: SearchInput = parse(name, input)?;
                self.scout.web().search(&args.query).await
            }
            SCRAPE_WEBSITE => {
                let args: ScrapeInput = parse(name, input)?;
                self.scout.web().scrape(&args.url).await
            }
            _ => anyhow::bail!("Unknown tool: {name}"),
        }
    }
}
