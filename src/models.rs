use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DigestError, Result};

/// One stale incident as returned by the data source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncidentRecord {
    pub incident_id: IncidentId,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_coordinators")]
    pub coordinators: Vec<String>,
    pub created_date: Timestamp,
    pub last_updated_date: Timestamp,
    #[serde(deserialize_with = "deserialize_days")]
    pub days_since_update: f64,
    pub incident_link: String,
}

impl IncidentRecord {
    pub fn validate(&self) -> Result<()> {
        if !self.days_since_update.is_finite() {
            return Err(DigestError::Retrieval(format!(
                "incident {} has a non-finite days_since_update",
                self.incident_id
            )));
        }

        if self.days_since_update < 0.0 {
            return Err(DigestError::Retrieval(format!(
                "incident {} has a negative days_since_update ({})",
                self.incident_id, self.days_since_update
            )));
        }

        Ok(())
    }

    pub fn coordinators_display(&self) -> String {
        self.coordinators.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IncidentId {
    Number(i64),
    Text(String),
    /// Any other JSON number (`4211.0`, values past `i64::MAX`), kept verbatim.
    Raw(serde_json::Number),
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
            Self::Raw(id) => write!(f, "{id}"),
        }
    }
}

/// Calendar timestamp as delivered by the warehouse. No timezone
/// conversion is ever applied; an offset, when present, is kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const OFFSET_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

impl FromStr for Timestamp {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }

        if let Ok(datetime) = DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, OFFSET_DISPLAY_FORMAT))
        {
            return Ok(Self::Offset(datetime));
        }

        NAIVE_DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
            .map(Self::Naive)
            .ok_or_else(|| format!("unrecognized timestamp '{s}'"))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Naive(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            Self::Offset(datetime) => write!(f, "{}", datetime.format(OFFSET_DISPLAY_FORMAT)),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<Option<String>>),
}

// Some warehouses flatten ARRAY<STRING> columns into a single string.
fn deserialize_coordinators<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let coordinators = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => vec![],
        Some(OneOrMany::One(name)) if name.trim().is_empty() => vec![],
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names.into_iter().flatten().collect(),
    };

    Ok(coordinators)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

// REST query APIs commonly encode numeric columns as strings.
fn deserialize_days<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(days) => Ok(days),
        NumberOrText::Text(raw) => raw.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("days_since_update '{raw}' is not a number"))
        }),
    }
}

/// Renders a day count to one decimal the way a reader expects: `20`
/// rather than `20.0`, and `14` for `14.04`.
pub fn format_days(days: f64) -> String {
    let rounded = (days * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_incidents: usize,
    /// `None` when there were no incidents; mean and max are undefined then.
    pub stats: Option<StalenessStats>,
}

impl ReportSummary {
    pub fn is_empty(&self) -> bool {
        self.stats.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StalenessStats {
    pub avg_days_stale: f64,
    pub max_days_stale: f64,
}
