use crate::crs::Crs;
use crate::models::{CoordinateIssue, CrashRecord, GeoRecord, GeoRecordSet, RecordSet};
use crate::utils::constants::{LATITUDE_FIELD, LONGITUDE_FIELD};
use geo::Point;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Per-reason tally of records that could not be given a geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkipReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub skipped: BTreeMap<CoordinateIssue, usize>,
}

impl SkipReport {
    pub fn skipped_records(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }

    fn record(&mut self, issue: CoordinateIssue) {
        *self.skipped.entry(issue).or_default() += 1;
    }

    pub fn summary(&self) -> String {
        let mut text = format!(
            "Coordinate Validation:\n\
            - Total records: {}\n\
            - With valid coordinates: {}\n\
            - Skipped: {}",
            self.total_records,
            self.valid_records,
            self.skipped_records()
        );
        for (issue, count) in &self.skipped {
            text.push_str(&format!("\n  - {}: {}", issue, count));
        }
        text
    }
}

/// Turns raw records into point geometries in geographic coordinates.
#[derive(Debug, Clone)]
pub struct CoordinateValidator {
    longitude_field: String,
    latitude_field: String,
    timestamp_field: Option<String>,
}

impl Default for CoordinateValidator {
    fn default() -> Self {
        Self::new(LONGITUDE_FIELD, LATITUDE_FIELD)
    }
}

impl CoordinateValidator {
    pub fn new(longitude_field: &str, latitude_field: &str) -> Self {
        Self {
            longitude_field: longitude_field.to_string(),
            latitude_field: latitude_field.to_string(),
            timestamp_field: None,
        }
    }

    /// Also parse the crash time from `field` while building geometries.
    pub fn with_timestamp_field(mut self, field: &str) -> Self {
        self.timestamp_field = Some(field.to_string());
        self
    }

    /// Point (x = longitude, y = latitude) for one record.
    pub fn validate(&self, record: &CrashRecord) -> Result<Point<f64>, CoordinateIssue> {
        let longitude = record.coordinate(&self.longitude_field)?;
        let latitude = record.coordinate(&self.latitude_field)?;

        if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateIssue::OutOfRange);
        }

        Ok(Point::new(longitude, latitude))
    }

    /// Build a geographic GeoRecordSet, dropping records without usable
    /// coordinates. Record order is preserved.
    pub fn build_geo_records(&self, records: RecordSet) -> (GeoRecordSet, SkipReport) {
        let mut report = SkipReport {
            total_records: records.len(),
            ..Default::default()
        };
        let mut geo_records = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            match self.validate(&record) {
                Ok(geometry) => {
                    let crash_time = self
                        .timestamp_field
                        .as_deref()
                        .and_then(|field| record.timestamp(field));
                    geo_records.push(GeoRecord {
                        record,
                        geometry,
                        crash_time,
                    });
                }
                Err(issue) => {
                    debug!(index, "Skipping record: coordinate {}", issue);
                    report.record(issue);
                }
            }
        }

        report.valid_records = geo_records.len();
        if report.has_skips() {
            warn!(
                "Skipped {} of {} records without usable coordinates",
                report.skipped_records(),
                report.total_records
            );
        }

        (GeoRecordSet::new(Crs::wgs84(), geo_records), report)
    }
}
