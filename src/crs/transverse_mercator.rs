//! WGS84 Universal Transverse Mercator (Snyder 1987, USGS formulas, pp. 61-64).

use super::{Ellipsoid, LinearUnit, Projection};

const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TransverseMercator {
    zone: u32,
    north: bool,
    ellipsoid: Ellipsoid,
}

impl TransverseMercator {
    pub fn utm(zone: u32, north: bool) -> Self {
        Self {
            zone,
            north,
            ellipsoid: Ellipsoid::WGS84,
        }
    }

    pub fn central_meridian(&self) -> f64 {
        (self.zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    pub fn false_easting(&self) -> f64 {
        FALSE_EASTING
    }

    pub fn false_northing(&self) -> f64 {
        if self.north {
            0.0
        } else {
            FALSE_NORTHING_SOUTH
        }
    }

    pub fn scale_factor(&self) -> f64 {
        K0
    }

    /// Meridional arc from the equator to `lat` (radians). Snyder eq. 3-21.
    fn meridional_arc(&self, lat: f64) -> f64 {
        let e2 = self.ellipsoid.eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        self.ellipsoid.semi_major
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
    }
}

impl Projection for TransverseMercator {
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major;
        let e2 = self.ellipsoid.eccentricity_squared();
        let ep2 = e2 / (1.0 - e2);

        let lat = lat.to_radians();
        let lon0 = self.central_meridian().to_radians();

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = ep2 * cos_lat * cos_lat;
        let a_coeff = cos_lat * (lon.to_radians() - lon0);
        let m = self.meridional_arc(lat);

        let a2 = a_coeff * a_coeff;
        let a4 = a2 * a2;
        let a6 = a4 * a2;

        // Snyder eq. 8-9
        let easting = K0
            * n
            * (a_coeff
                + (1.0 - t + c) * a2 * a_coeff / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a4 * a_coeff / 120.0)
            + FALSE_EASTING;

        // Snyder eq. 8-10
        let northing = K0
            * (m + n
                * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0))
            + self.false_northing();

        (easting, northing)
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major;
        let e2 = self.ellipsoid.eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        // Footpoint latitude, Snyder eqs. 7-19 and 3-26
        let m = (y - self.false_northing()) / K0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let tan1 = phi1.tan();

        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let n1 = a / (1.0 - e2 * sin1 * sin1).sqrt();
        let r1 = a * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = (x - FALSE_EASTING) / (n1 * K0);

        let d2 = d * d;
        let d4 = d2 * d2;
        let d6 = d4 * d2;

        // Snyder eqs. 8-17 and 8-18
        let lat = phi1
            - (n1 * tan1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d6
                        / 720.0);
        let lon = self.central_meridian().to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d4 * d
                    / 120.0)
                / cos1;

        (lon.to_degrees(), lat.to_degrees())
    }

    fn unit(&self) -> LinearUnit {
        LinearUnit::Metre
    }
}
