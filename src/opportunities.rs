use std::fmt::Display;

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// All timestamps are normalized to UTC and stored without a time zone.
pub type Timestamp = NaiveDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Approved,
    Lost,
    /// Any other stage name, kept verbatim. A missing stage name is stored
    /// as an empty string.
    Open(String),
}

impl Stage {
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("Approved") => Stage::Approved,
            Some("Lost") => Stage::Lost,
            Some(other) => Stage::Open(other.to_owned()),
            None => Stage::Open(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Approved => "Approved",
            Stage::Lost => "Lost",
            Stage::Open(name) => name,
        }
    }

    /// Whether the opportunity has reached a final stage.
    pub fn is_settled(&self) -> bool {
        matches!(self, Stage::Approved | Stage::Lost)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single opportunity as sent by the API, with its types normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityRecord {
    pub id: String,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub stage: Stage,
    pub created_date: Option<Timestamp>,
    pub last_stage_change_date: Option<Timestamp>,
    pub division: Option<String>,
    pub lead_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected a JSON object but found {0}")]
    NotAnObject(&'static str),
}

impl TryFrom<Value> for OpportunityRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(fields) = value else {
            return Err(RecordError::NotAnObject(json_kind(&value)));
        };

        let text = |key: &str| -> Option<String> {
            match fields.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        };
        let timestamp = |key: &str| match fields.get(key) {
            Some(Value::String(s)) => parse_timestamp(s),
            _ => None,
        };

        Ok(Self {
            id: text("Id").unwrap_or_default(),
            name: text("Name"),
            amount: fields.get("Amount").and_then(coerce_amount),
            stage: Stage::from_name(text("StageName").as_deref()),
            created_date: timestamp("Created_Date"),
            last_stage_change_date: timestamp("LastStageChangeDate"),
            division: text("Division"),
            lead_type: text("LeadType"),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Interprets an `Amount` value. Numbers pass through; strings are accepted
/// when they are plain decimals or currency-formatted like `$1,234.50`.
/// Anything else is treated as missing.
pub fn coerce_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let s = s.trim();
            let (negative, s) = match s.strip_prefix('-') {
                Some(rest) => (true, rest.trim_start()),
                None => (false, s),
            };
            let s = s.strip_prefix('$').unwrap_or(s);
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            let parsed = cleaned.parse::<f64>().ok().filter(|f| f.is_finite())?;
            Some(if negative { -parsed } else { parsed })
        }
        _ => None,
    }
}

/// Parses a timestamp string. Values with an offset are converted to UTC;
/// values without one are taken to already be UTC. The result never carries
/// a time zone.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(|date| date.and_time(NaiveTime::MIN))
}

/// The year an opportunity is reported under. Settled opportunities count
/// toward the year they were settled in; everything else counts toward the
/// year it was created.
pub fn reporting_year(
    stage: &Stage,
    created_date: Option<Timestamp>,
    last_stage_change_date: Option<Timestamp>,
) -> Option<i32> {
    match (stage.is_settled(), last_stage_change_date, created_date) {
        (true, Some(changed), _) => Some(changed.year()),
        (_, _, Some(created)) => Some(created.year()),
        _ => None,
    }
}

/// An opportunity together with the fields derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedOpportunity {
    pub record: OpportunityRecord,
    pub year: Option<i32>,
    pub is_approved: bool,
    pub is_lost: bool,
    pub is_open: bool,
    pub approved_amount: f64,
    pub lost_amount: f64,
    pub open_amount: f64,
}

impl PreparedOpportunity {
    pub fn new(record: OpportunityRecord) -> Self {
        let year =
            reporting_year(&record.stage, record.created_date, record.last_stage_change_date);
        let is_approved = record.stage == Stage::Approved;
        let is_lost = record.stage == Stage::Lost;
        let is_open = !(is_approved || is_lost);
        let amount = record.amount.unwrap_or(0.0);
        let gate = |flag: bool| if flag { amount } else { 0.0 };
        Self {
            year,
            is_approved,
            is_lost,
            is_open,
            approved_amount: gate(is_approved),
            lost_amount: gate(is_lost),
            open_amount: gate(is_open),
            record,
        }
    }

    /// The amount counted toward totals; a missing amount counts as zero.
    pub fn amount_or_zero(&self) -> f64 {
        self.record.amount.unwrap_or(0.0)
    }
}

pub struct PreparedOpportunities {
    pub opportunities: Vec<PreparedOpportunity>,
    /// How many opportunities have no reporting year because both of their
    /// dates are missing.
    pub yearless_count: usize,
}

pub fn prepare_opportunities(
    records: impl IntoIterator<Item = OpportunityRecord>,
) -> PreparedOpportunities {
    let opportunities: Vec<_> = records.into_iter().map(PreparedOpportunity::new).collect();
    let yearless_count = opportunities.iter().filter(|opp| opp.year.is_none()).count();
    if yearless_count > 0 {
        warn!(
            "{} opportunities have neither a creation date nor a stage change date; \
             they are left out of the yearly summaries",
            yearless_count
        );
    }
    PreparedOpportunities { opportunities, yearless_count }
}
