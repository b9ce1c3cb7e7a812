//! Lambert Conformal Conic with two standard parallels (EPSG method 9802).
//!
//! Formulas follow Snyder (1987), USGS Prof. Paper 1395, pp. 107-109, and the
//! worked example in IOGP Guidance Note 7-2.

use super::{Ellipsoid, LinearUnit, Projection};
use std::f64::consts::FRAC_PI_2;

const MAX_ITERATIONS: usize = 15;
const CONVERGENCE: f64 = 1e-12;

/// Defining parameters, in degrees and metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertParams {
    pub standard_parallel_1: f64,
    pub standard_parallel_2: f64,
    pub latitude_of_origin: f64,
    pub central_meridian: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambertConformalConic {
    params: LambertParams,
    ellipsoid: Ellipsoid,
    unit: LinearUnit,
    e: f64,
    n: f64,
    big_f: f64,
    rho0: f64,
    lon0: f64,
}

impl LambertConformalConic {
    pub fn new(ellipsoid: Ellipsoid, params: LambertParams, unit: LinearUnit) -> Self {
        let e2 = ellipsoid.eccentricity_squared();
        let e = e2.sqrt();

        let phi1 = params.standard_parallel_1.to_radians();
        let phi2 = params.standard_parallel_2.to_radians();
        let phi0 = params.latitude_of_origin.to_radians();

        let m1 = m(phi1, e2);
        let m2 = m(phi2, e2);
        let t1 = t(phi1, e);
        let t2 = t(phi2, e);

        // Tangent cone when both parallels coincide
        let n = if (phi1 - phi2).abs() < 1e-12 {
            phi1.sin()
        } else {
            (m1.ln() - m2.ln()) / (t1.ln() - t2.ln())
        };
        let big_f = m1 / (n * t1.powf(n));
        let rho0 = ellipsoid.semi_major * big_f * t(phi0, e).powf(n);

        Self {
            params,
            ellipsoid,
            unit,
            e,
            n,
            big_f,
            rho0,
            lon0: params.central_meridian.to_radians(),
        }
    }

    pub fn params(&self) -> &LambertParams {
        &self.params
    }

    pub fn ellipsoid(&self) -> Ellipsoid {
        self.ellipsoid
    }
}

impl Projection for LambertConformalConic {
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major;
        let rho = a * self.big_f * t(lat.to_radians(), self.e).powf(self.n);
        let theta = self.n * (lon.to_radians() - self.lon0);

        let easting = self.params.false_easting + rho * theta.sin();
        let northing = self.params.false_northing + self.rho0 - rho * theta.cos();

        let k = self.unit.metres_per_unit();
        (easting / k, northing / k)
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let k = self.unit.metres_per_unit();
        let dx = x * k - self.params.false_easting;
        let dy = self.rho0 - (y * k - self.params.false_northing);

        let rho = dx.hypot(dy).copysign(self.n);
        let theta = if self.n > 0.0 {
            dx.atan2(dy)
        } else {
            (-dx).atan2(-dy)
        };

        let t_prime = (rho / (self.ellipsoid.semi_major * self.big_f)).powf(1.0 / self.n);
        let half_e = self.e / 2.0;

        let mut phi = FRAC_PI_2 - 2.0 * t_prime.atan();
        for _ in 0..MAX_ITERATIONS {
            let es = self.e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t_prime * ((1.0 - es) / (1.0 + es)).powf(half_e)).atan();
            let delta = (next - phi).abs();
            phi = next;
            if delta < CONVERGENCE {
                break;
            }
        }

        let lon = theta / self.n + self.lon0;
        (lon.to_degrees(), phi.to_degrees())
    }

    fn unit(&self) -> LinearUnit {
        self.unit
    }
}

fn m(phi: f64, e2: f64) -> f64 {
    let s = phi.sin();
    phi.cos() / (1.0 - e2 * s * s).sqrt()
}

fn t(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    (std::f64::consts::FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}
