use crate::crs::Crs;
use crate::error::{ProcessingError, Result};
use crate::models::{GeoRecordSet, ReferencePoint};
use crate::utils::constants::{DEFAULT_BUFFER_SEGMENTS, MIN_BUFFER_SEGMENTS};
use geo::{Coord, LineString, Point, Polygon, Within};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferParams {
    /// In the linear unit of the CRS the buffer is built in.
    pub radius: f64,
    pub segments: usize,
}

impl BufferParams {
    pub fn new(radius: f64, segments: usize) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ProcessingError::Config(format!(
                "Buffer radius must be a positive number, got {}",
                radius
            )));
        }
        if segments < MIN_BUFFER_SEGMENTS {
            return Err(ProcessingError::Config(format!(
                "Buffer needs at least {} segments, got {}",
                MIN_BUFFER_SEGMENTS, segments
            )));
        }
        Ok(Self { radius, segments })
    }

    pub fn with_radius(radius: f64) -> Result<Self> {
        Self::new(radius, DEFAULT_BUFFER_SEGMENTS)
    }
}

/// Regular polygon approximating a circle. Every vertex lies exactly on the
/// circle; the first one is due east of the centre.
pub fn circular_buffer(center: Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let step = 2.0 * PI / params.segments as f64;
    let ring: Vec<Coord<f64>> = (0..params.segments)
        .map(|i| {
            let angle = step * i as f64;
            Coord {
                x: center.x() + params.radius * angle.cos(),
                y: center.y() + params.radius * angle.sin(),
            }
        })
        .collect();

    Polygon::new(LineString::from(ring), vec![])
}

/// A circular buffer together with the projected CRS it was built in.
#[derive(Debug, Clone)]
pub struct Buffer {
    polygon: Polygon<f64>,
    center: Point<f64>,
    params: BufferParams,
    crs: Crs,
}

impl Buffer {
    /// Project `reference` into `crs` and buffer it there.
    pub fn around(reference: &ReferencePoint, params: BufferParams, crs: &Crs) -> Result<Self> {
        if crs.is_geographic() {
            return Err(ProcessingError::Config(format!(
                "Cannot buffer in geographic CRS {}; distances in degrees are not linear",
                crs
            )));
        }

        let center = Crs::wgs84().transform(reference.to_point(), crs)?;
        Ok(Self {
            polygon: circular_buffer(center, &params),
            center,
            params,
            crs: crs.clone(),
        })
    }

    pub fn center(&self) -> Point<f64> {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.params.radius
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Strict interior test. Points on the boundary are outside.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        point.is_within(&self.polygon)
    }

    /// Keep the records strictly inside the buffer, in their original order.
    pub fn retain_within(&self, records: GeoRecordSet) -> Result<GeoRecordSet> {
        if records.crs() != &self.crs {
            return Err(ProcessingError::CrsMismatch {
                left: records.crs().identifier(),
                right: self.crs.identifier(),
            });
        }
        Ok(records.retain(|geo| self.contains(&geo.geometry)))
    }
}
