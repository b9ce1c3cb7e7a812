use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single crash row exactly as the data portal returned it.
///
/// The portal schema is open-ended, so the full object is kept verbatim and
/// serialized back unchanged. Only the coordinate and timestamp fields are read
/// through typed accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrashRecord(Map<String, Value>);

/// Why a record could not produce a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoordinateIssue {
    Missing,
    NotNumeric,
    NonFinite,
    OutOfRange,
}

impl CoordinateIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::NotNumeric => "not numeric",
            Self::NonFinite => "non-finite",
            Self::OutOfRange => "out of range",
        }
    }
}

impl fmt::Display for CoordinateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CrashRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Attribute fields in the order the portal delivered them.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a numeric coordinate field.
    ///
    /// Socrata serialises numbers as JSON strings, so both string and number
    /// values are accepted. Range checks are left to the caller.
    pub fn coordinate(&self, field: &str) -> Result<f64, CoordinateIssue> {
        let value = match self.0.get(field) {
            None | Some(Value::Null) => return Err(CoordinateIssue::Missing),
            Some(Value::Number(n)) => n.as_f64().ok_or(CoordinateIssue::NotNumeric)?,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(CoordinateIssue::Missing);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| CoordinateIssue::NotNumeric)?
            }
            Some(_) => return Err(CoordinateIssue::NotNumeric),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(CoordinateIssue::NonFinite)
        }
    }

    /// Parse a timestamp field. Floating timestamps (`2024-03-01T14:22:00.000`)
    /// and RFC 3339 values are both understood; anything else yields `None`.
    pub fn timestamp(&self, field: &str) -> Option<NaiveDateTime> {
        let raw = self.0.get(field)?.as_str()?;
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.naive_local())
            })
    }
}

impl From<Map<String, Value>> for CrashRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Every record retrieved for one query window, in API order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<CrashRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CrashRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CrashRecord> {
        self.records.iter()
    }

    /// Append one page of results.
    pub fn extend_page(&mut self, page: Vec<CrashRecord>) {
        self.records.extend(page);
    }
}

impl From<Vec<CrashRecord>> for RecordSet {
    fn from(records: Vec<CrashRecord>) -> Self {
        Self { records }
    }
}

impl IntoIterator for RecordSet {
    type Item = CrashRecord;
    type IntoIter = std::vec::IntoIter<CrashRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
