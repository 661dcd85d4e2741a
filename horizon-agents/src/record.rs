//! Startup records and the looser candidate shape extraction produces.
//!
//! Candidates may carry canonical field names or the labels agents tend to
//! emit ("Company Name", "Target Market", ...). Normalization folds both
//! into a [`StartupRecord`], canonical labels first.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A persisted startup. `name` is the only mandatory field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestones: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// RFC 3339 insertion time. Empty only for legacy rows written without one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub discovery_date: String,
}

impl StartupRecord {
    /// Deduplication key: lowercase, trimmed name.
    pub fn key(&self) -> String {
        name_key(&self.name)
    }
}

/// Lowercase-trimmed form used for case-insensitive uniqueness.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An unvalidated startup-shaped record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "Company Name",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(
        rename = "Website",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub website_label: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "Description",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description_label: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(
        rename = "Location",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub location_label: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(
        rename = "AI Technology Focus",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub technology_focus: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(
        rename = "Target Market",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_market: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub founded: Option<String>,
    #[serde(
        rename = "Founding Year",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub founding_year: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub milestones: Option<String>,
    #[serde(
        rename = "Key Milestones",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub key_milestones: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(
        rename = "Source URL",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_url_label: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub discovery_date: Option<String>,
}

impl CandidateRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The name this candidate would be stored under, if any.
    pub fn resolved_name(&self) -> Option<String> {
        pick(&[&self.name, &self.company_name])
    }

    /// Lowercase-trimmed resolved name; empty when the candidate has none.
    pub fn key(&self) -> String {
        self.resolved_name().map(|n| name_key(&n)).unwrap_or_default()
    }

    /// Fold aliases into canonical fields. Returns `None` without a name.
    ///
    /// `now` becomes the discovery date when the candidate carries none.
    pub fn normalize(&self, now: &str) -> Option<StartupRecord> {
        let name = self.resolved_name()?;
        Some(StartupRecord {
            name,
            website: pick(&[&self.website, &self.website_label]),
            description: pick(&[&self.description, &self.description_label]),
            location: pick(&[&self.location, &self.location_label, &self.country]),
            technology: pick(&[&self.technology, &self.technology_focus]),
            market: pick(&[&self.market, &self.target_market]),
            founded: pick(&[&self.founded, &self.founding_year]),
            milestones: pick(&[&self.milestones, &self.key_milestones]),
            source_url: pick(&[&self.source_url, &self.source_url_label]),
            discovery_date: pick(&[&self.discovery_date]).unwrap_or_else(|| now.to_string()),
        })
    }
}

/// First non-blank value, trimmed.
fn pick(values: &[&Option<String>]) -> Option<String> {
    values
        .iter()
        .filter_map(|v| v.as_deref())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Accept strings, numbers and booleans; anything else reads as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
