use crate::crs::Crs;
use crate::error::Result;
use crate::models::CrashRecord;
use chrono::NaiveDateTime;
use geo::Point;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Geographic centre of the proximity query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReferencePoint {
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
}

impl ReferencePoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// x = longitude, y = latitude
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// A crash record with its point geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord {
    pub record: CrashRecord,
    pub geometry: Point<f64>,
    pub crash_time: Option<NaiveDateTime>,
}

/// GeoRecords sharing one coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecordSet {
    crs: Crs,
    records: Vec<GeoRecord>,
}

impl GeoRecordSet {
    pub fn new(crs: Crs, records: Vec<GeoRecord>) -> Self {
        Self { crs, records }
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn records(&self) -> &[GeoRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeoRecord> {
        self.records.iter()
    }

    /// Reproject every geometry into `target`. Fails on the first point that
    /// cannot be transformed.
    pub fn to_crs(self, target: &Crs) -> Result<GeoRecordSet> {
        if self.crs == *target {
            return Ok(self);
        }

        let source = self.crs;
        let records = self
            .records
            .into_iter()
            .map(|mut geo| {
                geo.geometry = source.transform(geo.geometry, target)?;
                Ok(geo)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GeoRecordSet {
            crs: target.clone(),
            records,
        })
    }

    /// Keep records matching `predicate`, preserving order.
    pub fn retain<F>(mut self, mut predicate: F) -> GeoRecordSet
    where
        F: FnMut(&GeoRecord) -> bool,
    {
        self.records.retain(|geo| predicate(geo));
        self
    }

    /// Earliest and latest parsed crash time, if any record has one.
    pub fn time_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut times = self.records.iter().filter_map(|geo| geo.crash_time);
        let first = times.next()?;
        Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }
}
