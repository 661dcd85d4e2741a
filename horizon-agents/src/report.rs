//! Report files written after each country pass and after a multi-country
//! run.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::extract::truncate_chars;
use crate::record::{CandidateRecord, StartupRecord};

/// Characters of each task result kept in the Markdown summary.
const SUMMARY_EXCERPT: usize = 1000;

const CSV_HEADER: [&str; 10] = [
    "name",
    "website",
    "description",
    "location",
    "technology",
    "market",
    "founded",
    "milestones",
    "source_url",
    "discovery_date",
];

/// Serialize `(key, value)` pairs as a JSON object, keeping their order.
pub fn ordered_map<S, V>(pairs: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (k, v) in pairs {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub completion_status: &'static str,
}

/// Everything produced for one country.
#[derive(Debug, Clone, Serialize)]
pub struct CountryReport {
    pub country: String,
    pub discovery_date: String,
    /// Task name to raw output, in execution order.
    #[serde(serialize_with = "ordered_map")]
    pub task_results: Vec<(String, String)>,
    pub summary: RunSummary,
}

impl CountryReport {
    pub fn new(country: &str, discovery_date: String, task_results: Vec<(String, String)>) -> Self {
        Self {
            country: country.to_string(),
            discovery_date,
            summary: RunSummary {
                total_tasks: task_results.len(),
                completion_status: "success",
            },
            task_results,
        }
    }

    /// Startup records found in task outputs that carry a `startups` array,
    /// deduplicated by name in first-seen order.
    pub fn startups(&self, now: &str) -> Vec<StartupRecord> {
        let mut seen = HashSet::new();
        self.task_results
            .iter()
            .filter_map(|(_, output)| parse_json_output(output))
            .filter_map(|value| match value.get("startups") {
                Some(Value::Array(items)) => Some(items.clone()),
                _ => None,
            })
            .flatten()
            .filter_map(|item| serde_json::from_value::<CandidateRecord>(item).ok())
            .filter_map(|c| c.normalize(now))
            .filter(|r| seen.insert(r.key()))
            .collect()
    }
}

/// Result of one country in a multi-country run.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CountryOutcome {
    Completed(CountryReport),
    Failed { error: String },
}

impl CountryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CountryOutcome::Completed(_))
    }
}

/// Paths written for one country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryFiles {
    pub json: PathBuf,
    pub csv: Option<PathBuf>,
    pub summary: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    dir: PathBuf,
    prefix: String,
}

impl Reporter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{prefix}_{country}_{timestamp}` with the country lowercased and
    /// spaces replaced by underscores.
    pub fn base_name(&self, country: &str, timestamp: &str) -> String {
        let country = country.trim().to_lowercase().replace(' ', "_");
        format!("{}_{country}_{timestamp}", self.prefix)
    }

    /// Write the JSON report, the CSV when any startups were found, and the
    /// Markdown summary.
    pub fn export_country(&self, report: &CountryReport, timestamp: &str) -> Result<CountryFiles> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let base = self.base_name(&report.country, timestamp);

        let json = self.dir.join(format!("{base}.json"));
        write_file(&json, &serde_json::to_string_pretty(report)?)?;

        let startups = report.startups(&report.discovery_date);
        let csv = if startups.is_empty() {
            None
        } else {
            let path = self.dir.join(format!("{base}.csv"));
            write_csv(&path, &startups)?;
            Some(path)
        };

        let summary = self.dir.join(format!("{base}_summary.md"));
        write_file(&summary, &summary_markdown(report, &base, csv.is_some()))?;

        tracing::info!(
            country = %report.country,
            json = %json.display(),
            startups = startups.len(),
            "Country report exported"
        );
        Ok(CountryFiles { json, csv, summary })
    }

    /// Write the consolidated JSON and Markdown for a multi-country run.
    pub fn export_consolidated(
        &self,
        outcomes: &[(String, CountryOutcome)],
        timestamp: &str,
        generated: &str,
    ) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let base = format!("{}_{timestamp}_consolidated", self.prefix);

        let json_path = self.dir.join(format!("{base}.json"));
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::pretty(&mut buf);
        ordered_map(outcomes, &mut ser)?;
        write_file(&json_path, &String::from_utf8(buf)?)?;

        let md_path = self.dir.join(format!("{base}.md"));
        write_file(&md_path, &consolidated_markdown(outcomes, generated))?;

        tracing::info!(
            countries = outcomes.len(),
            json = %json_path.display(),
            "Consolidated report exported"
        );
        Ok((json_path, md_path))
    }
}

/// Parse a task output as JSON, either whole or from its first fenced
/// `json` code block.
pub fn parse_json_output(output: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(output.trim()) {
        return Some(value);
    }
    let start = output.find("```json")? + "```json".len();
    let rest = &output[start..];
    let end = rest.find("```")?;
    serde_json::from_str(rest[..end].trim()).ok()
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_csv(path: &Path, startups: &[StartupRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(CSV_HEADER)?;
    for r in startups {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        writer.write_record([
            r.name.clone(),
            opt(&r.website),
            opt(&r.description),
            opt(&r.location),
            opt(&r.technology),
            opt(&r.market),
            opt(&r.founded),
            opt(&r.milestones),
            opt(&r.source_url),
            r.discovery_date.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// `market_analysis` -> `Market Analysis`.
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn excerpt(text: &str) -> String {
    if text.chars().count() > SUMMARY_EXCERPT {
        format!("{}...", truncate_chars(text, SUMMARY_EXCERPT))
    } else {
        text.to_string()
    }
}

fn summary_markdown(report: &CountryReport, base: &str, has_csv: bool) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# NVIDIA Inception AI Startup Discovery Report");
    let _ = writeln!(md, "## Country: {}", report.country);
    let _ = writeln!(md, "## Date: {}\n\n---\n", report.discovery_date);
    let _ = writeln!(md, "## Detailed Results\n");
    for (task, output) in &report.task_results {
        let _ = writeln!(md, "### {}\n", title_case(task));
        let _ = writeln!(md, "```\n{}\n```\n", excerpt(output));
    }
    let _ = writeln!(md, "## Data Files\n");
    let _ = writeln!(md, "- Complete data: `{base}.json`");
    if has_csv {
        let _ = writeln!(md, "- Startup database: `{base}.csv`");
    }
    let _ = writeln!(md, "- This summary: `{base}_summary.md`");
    md
}

fn consolidated_markdown(outcomes: &[(String, CountryOutcome)], generated: &str) -> String {
    let succeeded = outcomes.iter().filter(|(_, o)| o.is_success()).count();
    let mut md = String::new();
    let _ = writeln!(md, "# NVIDIA Inception: Multi-Country AI Startup Discovery");
    let _ = writeln!(md, "## Generated: {generated}\n\n---\n");
    let _ = writeln!(md, "## Countries Analyzed\n");
    for (country, outcome) in outcomes {
        let status = if outcome.is_success() { "Success" } else { "Error" };
        let _ = writeln!(md, "- **{country}**: {status}");
    }
    let _ = writeln!(md, "\n## Summary Statistics\n");
    let _ = writeln!(md, "- Total countries analyzed: {}", outcomes.len());
    let _ = writeln!(md, "- Successful discoveries: {succeeded}");
    let _ = writeln!(md, "- Failed discoveries: {}", outcomes.len() - succeeded);
    md
}
