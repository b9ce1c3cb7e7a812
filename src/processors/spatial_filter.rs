use crate::crs::Crs;
use crate::error::{ProcessingError, Result};
use crate::models::{GeoRecordSet, RecordSet, ReferencePoint};
use crate::processors::buffer::{Buffer, BufferParams};
use crate::processors::coordinate_validator::{CoordinateValidator, SkipReport};
use crate::settings::Settings;
use tracing::{debug, info};

/// Output of one filter run.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub total_records: usize,
    pub skip_report: SkipReport,
    /// Retained records, reprojected into the output CRS.
    pub filtered: GeoRecordSet,
    pub working_crs: Crs,
    pub radius: f64,
}

impl FilterOutcome {
    pub fn retained(&self) -> usize {
        self.filtered.len()
    }

    pub fn summary(&self) -> String {
        let mut text = format!(
            "Spatial Filter:\n\
            - Records read: {}\n\
            - With geometry: {}\n\
            - Within {} {} of reference ({}): {}\n\
            - Output CRS: {}",
            self.total_records,
            self.skip_report.valid_records,
            self.radius,
            self.working_crs
                .unit()
                .map(|u| u.to_string())
                .unwrap_or_default(),
            self.working_crs,
            self.retained(),
            self.filtered.crs()
        );
        if let Some((first, last)) = self.filtered.time_span() {
            text.push_str(&format!("\n- Crash times: {} to {}", first, last));
        }
        text
    }
}

/// Project, buffer, test containment, reproject back.
#[derive(Debug, Clone)]
pub struct SpatialFilter {
    validator: CoordinateValidator,
    reference: ReferencePoint,
    params: BufferParams,
    working_crs: Crs,
    output_crs: Crs,
}

impl SpatialFilter {
    pub fn new(
        reference: ReferencePoint,
        params: BufferParams,
        working_crs: Crs,
        output_crs: Crs,
    ) -> Result<Self> {
        if working_crs.is_geographic() {
            return Err(ProcessingError::Config(format!(
                "Working CRS {} must be projected",
                working_crs
            )));
        }
        if !output_crs.is_geographic() {
            return Err(ProcessingError::Config(format!(
                "Output CRS {} must be geographic",
                output_crs
            )));
        }

        Ok(Self {
            validator: CoordinateValidator::default(),
            reference,
            params,
            working_crs,
            output_crs,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let filter = &settings.filter;
        let validator = CoordinateValidator::new(&filter.longitude_field, &filter.latitude_field)
            .with_timestamp_field(&settings.fetch.timestamp_field);

        Ok(Self::new(
            filter.reference,
            BufferParams::new(filter.radius, filter.buffer_segments)?,
            filter.working_crs()?,
            filter.output_crs()?,
        )?
        .with_validator(validator))
    }

    pub fn with_validator(mut self, validator: CoordinateValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn buffer(&self) -> Result<Buffer> {
        Buffer::around(&self.reference, self.params, &self.working_crs)
    }

    pub fn apply(&self, records: RecordSet) -> Result<FilterOutcome> {
        let total_records = records.len();
        let (geo_records, skip_report) = self.validator.build_geo_records(records);
        info!(
            "Built {} point geometries from {} records",
            geo_records.len(),
            total_records
        );

        // dataset and reference point are projected separately into the same CRS
        let projected = geo_records.to_crs(&self.working_crs)?;
        let buffer = self.buffer()?;
        debug!(
            center_x = buffer.center().x(),
            center_y = buffer.center().y(),
            crs = %self.working_crs,
            "Buffer centre"
        );

        let retained = buffer.retain_within(projected)?;
        info!(
            "{} records within {} of reference point",
            retained.len(),
            buffer.radius()
        );

        let filtered = retained.to_crs(&self.output_crs)?;

        Ok(FilterOutcome {
            total_records,
            skip_report,
            filtered,
            working_crs: self.working_crs.clone(),
            radius: buffer.radius(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrashRecord;
    use serde_json::json;

    fn reference() -> ReferencePoint {
        ReferencePoint::new(-97.717035, 30.349979)
    }

    fn filter() -> SpatialFilter {
        SpatialFilter::new(
            reference(),
            BufferParams::with_radius(500.0).unwrap(),
            Crs::from_epsg(2277).unwrap(),
            Crs::wgs84(),
        )
        .unwrap()
    }

    fn record(id: &str, lon: f64, lat: f64) -> CrashRecord {
        serde_json::from_value(json!({
            "crash_id": id,
            "longitude": lon.to_string(),
            "latitude": lat.to_string(),
        }))
        .unwrap()
    }

    #[test]
    fn test_crs_roles_checked() {
        let params = BufferParams::with_radius(500.0).unwrap();
        assert!(SpatialFilter::new(reference(), params, Crs::wgs84(), Crs::wgs84()).is_err());
        assert!(SpatialFilter::new(
            reference(),
            params,
            Crs::from_epsg(2277).unwrap(),
            Crs::from_epsg(2277).unwrap()
        )
        .is_err());
    }

    #[test]
    fn test_filter_keeps_nearby_records_in_order() {
        // 1e-3 degrees of latitude is roughly 364 ft
        let records = RecordSet::from(vec![
            record("far-north", -97.717035, 30.360),
            record("centre", -97.717035, 30.349979),
            record("bad", f64::NAN, 30.349979),
            record("near", -97.717035, 30.350979),
            record("far-east", -97.700, 30.349979),
        ]);

        let outcome = filter().apply(records).unwrap();

        assert_eq!(outcome.total_records, 5);
        assert_eq!(outcome.skip_report.skipped_records(), 1);
        assert_eq!(outcome.retained(), 2);
        assert_eq!(outcome.filtered.crs(), &Crs::wgs84());

        let ids: Vec<_> = outcome
            .filtered
            .iter()
            .map(|g| g.record.get("crash_id").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["centre", "near"]);

        let near = &outcome.filtered.records()[1];
        assert!((near.geometry.x() - -97.717035).abs() < 1e-7);
        assert!((near.geometry.y() - 30.350979).abs() < 1e-7);
    }

    #[test]
    fn test_empty_input() {
        let outcome = filter().apply(RecordSet::new()).unwrap();
        assert_eq!(outcome.retained(), 0);
        assert!(outcome.summary().contains("Records read: 0"));
    }
}
