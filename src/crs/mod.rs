//! Coordinate reference systems and point reprojection.
//!
//! Only a small registry of EPSG codes is understood: WGS84 geographic, the
//! NAD83 Texas state plane zones in US survey feet, and WGS84 UTM. NAD83 is
//! treated as identical to WGS84, which is the PROJ default when no datum grid
//! is available and is well below the accuracy a crash location carries.

pub mod lambert;
pub mod transverse_mercator;

use crate::error::{ProcessingError, Result};
use geo::Point;
use std::fmt;

pub use lambert::{LambertConformalConic, LambertParams};
pub use transverse_mercator::TransverseMercator;

pub const WGS84_EPSG: u32 = 4326;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub name: &'static str,
    pub semi_major: f64,
    pub inverse_flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        name: "WGS_1984",
        semi_major: 6_378_137.0,
        inverse_flattening: 298.257_223_563,
    };

    pub const GRS80: Ellipsoid = Ellipsoid {
        name: "GRS_1980",
        semi_major: 6_378_137.0,
        inverse_flattening: 298.257_222_101,
    };

    pub const CLARKE_1866: Ellipsoid = Ellipsoid {
        name: "Clarke_1866",
        semi_major: 6_378_206.4,
        inverse_flattening: 294.978_698_2,
    };

    pub fn eccentricity_squared(&self) -> f64 {
        let f = 1.0 / self.inverse_flattening;
        2.0 * f - f * f
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearUnit {
    Metre,
    UsSurveyFoot,
}

impl LinearUnit {
    pub fn metres_per_unit(&self) -> f64 {
        match self {
            Self::Metre => 1.0,
            Self::UsSurveyFoot => 1200.0 / 3937.0,
        }
    }

    fn wkt_name(&self) -> &'static str {
        match self {
            Self::Metre => "Meter",
            Self::UsSurveyFoot => "Foot_US",
        }
    }
}

impl fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metre => write!(f, "m"),
            Self::UsSurveyFoot => write!(f, "ftUS"),
        }
    }
}

/// A map projection between geographic degrees and planar coordinates.
pub trait Projection {
    /// (longitude, latitude) in degrees -> (easting, northing) in `unit()`.
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64);

    /// (easting, northing) in `unit()` -> (longitude, latitude) in degrees.
    fn inverse(&self, x: f64, y: f64) -> (f64, f64);

    fn unit(&self) -> LinearUnit;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionKind {
    Lambert(LambertConformalConic),
    TransverseMercator(TransverseMercator),
}

impl ProjectionKind {
    fn as_projection(&self) -> &dyn Projection {
        match self {
            Self::Lambert(p) => p,
            Self::TransverseMercator(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Crs {
    Geographic {
        epsg: u32,
    },
    Projected {
        epsg: u32,
        name: String,
        projection: ProjectionKind,
    },
}

// Texas state plane zones (NAD83, US survey feet): EPSG code, ESRI name,
// standard parallels, latitude of origin, central meridian, false E/N in metres.
const TEXAS_ZONES: [(u32, &str, f64, f64, f64, f64, f64, f64); 5] = [
    (
        2275,
        "NAD_1983_StatePlane_Texas_North_FIPS_4201_Feet",
        34.65,
        36.0 + 11.0 / 60.0,
        34.0,
        -101.5,
        200_000.0,
        1_000_000.0,
    ),
    (
        2276,
        "NAD_1983_StatePlane_Texas_North_Central_FIPS_4202_Feet",
        32.0 + 8.0 / 60.0,
        33.0 + 58.0 / 60.0,
        31.0 + 40.0 / 60.0,
        -98.5,
        600_000.0,
        2_000_000.0,
    ),
    (
        2277,
        "NAD_1983_StatePlane_Texas_Central_FIPS_4203_Feet",
        30.0 + 7.0 / 60.0,
        31.0 + 53.0 / 60.0,
        29.0 + 40.0 / 60.0,
        -(100.0 + 20.0 / 60.0),
        700_000.0,
        3_000_000.0,
    ),
    (
        2278,
        "NAD_1983_StatePlane_Texas_South_Central_FIPS_4204_Feet",
        28.0 + 23.0 / 60.0,
        30.0 + 17.0 / 60.0,
        27.0 + 50.0 / 60.0,
        -99.0,
        600_000.0,
        4_000_000.0,
    ),
    (
        2279,
        "NAD_1983_StatePlane_Texas_South_FIPS_4205_Feet",
        26.0 + 10.0 / 60.0,
        27.0 + 50.0 / 60.0,
        25.0 + 40.0 / 60.0,
        -98.5,
        300_000.0,
        5_000_000.0,
    ),
];

impl Crs {
    /// WGS84 geographic (EPSG:4326)
    pub fn wgs84() -> Self {
        Crs::Geographic { epsg: WGS84_EPSG }
    }

    /// Look up a supported EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self> {
        if code == WGS84_EPSG {
            return Ok(Self::wgs84());
        }

        if let Some(&(epsg, name, sp1, sp2, lat0, lon0, fe, fn_)) =
            TEXAS_ZONES.iter().find(|zone| zone.0 == code)
        {
            let params = LambertParams {
                standard_parallel_1: sp1,
                standard_parallel_2: sp2,
                latitude_of_origin: lat0,
                central_meridian: lon0,
                false_easting: fe,
                false_northing: fn_,
            };
            return Ok(Crs::Projected {
                epsg,
                name: name.to_string(),
                projection: ProjectionKind::Lambert(LambertConformalConic::new(
                    Ellipsoid::GRS80,
                    params,
                    LinearUnit::UsSurveyFoot,
                )),
            });
        }

        if let Some((zone, north)) = parse_utm_epsg(code) {
            let hemisphere = if north { 'N' } else { 'S' };
            return Ok(Crs::Projected {
                epsg: code,
                name: format!("WGS_1984_UTM_Zone_{}{}", zone, hemisphere),
                projection: ProjectionKind::TransverseMercator(TransverseMercator::utm(zone, north)),
            });
        }

        Err(ProcessingError::UnsupportedCrs(format!("EPSG:{}", code)))
    }

    /// Parse `EPSG:2277`, `epsg:2277` or a bare `2277`.
    pub fn parse(identifier: &str) -> Result<Self> {
        let trimmed = identifier.trim();
        let code = trimmed
            .split_once(':')
            .map(|(authority, code)| {
                if authority.eq_ignore_ascii_case("epsg") {
                    Ok(code)
                } else {
                    Err(ProcessingError::UnsupportedCrs(identifier.to_string()))
                }
            })
            .unwrap_or(Ok(trimmed))?;

        let code = code
            .trim()
            .parse::<u32>()
            .map_err(|_| ProcessingError::UnsupportedCrs(identifier.to_string()))?;

        Self::from_epsg(code)
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Self::Geographic { epsg } | Self::Projected { epsg, .. } => *epsg,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Geographic { .. })
    }

    /// Linear unit of a projected CRS, `None` for geographic.
    pub fn unit(&self) -> Option<LinearUnit> {
        match self {
            Self::Geographic { .. } => None,
            Self::Projected { projection, .. } => Some(projection.as_projection().unit()),
        }
    }

    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg())
    }

    /// Reproject a point from this CRS into `target`.
    ///
    /// Geographic points use x = longitude, y = latitude. Projected inputs are
    /// first unprojected to geographic degrees.
    pub fn transform(&self, point: Point<f64>, target: &Crs) -> Result<Point<f64>> {
        if self == target {
            return Ok(point);
        }

        let (lon, lat) = match self {
            Self::Geographic { .. } => (point.x(), point.y()),
            Self::Projected { projection, .. } => {
                projection.as_projection().inverse(point.x(), point.y())
            }
        };

        let (x, y) = match target {
            Self::Geographic { .. } => (lon, lat),
            Self::Projected { projection, .. } => projection.as_projection().forward(lon, lat),
        };

        if !x.is_finite() || !y.is_finite() {
            return Err(ProcessingError::Projection(format!(
                "{} -> {} produced a non-finite coordinate for ({}, {})",
                self,
                target,
                point.x(),
                point.y()
            )));
        }

        Ok(Point::new(x, y))
    }

    /// ESRI-flavoured WKT, as expected in a shapefile `.prj` sidecar.
    pub fn to_wkt(&self) -> String {
        match self {
            Self::Geographic { .. } => geogcs_wkt("GCS_WGS_1984", "D_WGS_1984", Ellipsoid::WGS84),
            Self::Projected {
                name, projection, ..
            } => match projection {
                ProjectionKind::Lambert(lcc) => {
                    let p = lcc.params();
                    let unit = lcc.unit();
                    let k = unit.metres_per_unit();
                    format!(
                        "PROJCS[\"{}\",{},PROJECTION[\"Lambert_Conformal_Conic\"],\
                         PARAMETER[\"False_Easting\",{:?}],PARAMETER[\"False_Northing\",{:?}],\
                         PARAMETER[\"Central_Meridian\",{:?}],PARAMETER[\"Standard_Parallel_1\",{:?}],\
                         PARAMETER[\"Standard_Parallel_2\",{:?}],PARAMETER[\"Latitude_Of_Origin\",{:?}],\
                         UNIT[\"{}\",{:?}]]",
                        name,
                        geogcs_wkt(
                            "GCS_North_American_1983",
                            "D_North_American_1983",
                            lcc.ellipsoid()
                        ),
                        p.false_easting / k,
                        p.false_northing / k,
                        p.central_meridian,
                        p.standard_parallel_1,
                        p.standard_parallel_2,
                        p.latitude_of_origin,
                        unit.wkt_name(),
                        k
                    )
                }
                ProjectionKind::TransverseMercator(tm) => format!(
                    "PROJCS[\"{}\",{},PROJECTION[\"Transverse_Mercator\"],\
                     PARAMETER[\"False_Easting\",{:?}],PARAMETER[\"False_Northing\",{:?}],\
                     PARAMETER[\"Central_Meridian\",{:?}],PARAMETER[\"Scale_Factor\",{:?}],\
                     PARAMETER[\"Latitude_Of_Origin\",0.0],UNIT[\"Meter\",1.0]]",
                    name,
                    geogcs_wkt("GCS_WGS_1984", "D_WGS_1984", Ellipsoid::WGS84),
                    tm.false_easting(),
                    tm.false_northing(),
                    tm.central_meridian(),
                    tm.scale_factor()
                ),
            },
        }
    }

    /// Recognise a `.prj` written by [`Crs::to_wkt`] (or any WKT whose
    /// top-level name matches one of the supported systems).
    pub fn identify_wkt(wkt: &str) -> Option<Crs> {
        let name = wkt.split('"').nth(1)?;

        if name == "GCS_WGS_1984" {
            return Some(Self::wgs84());
        }

        TEXAS_ZONES
            .iter()
            .map(|zone| zone.0)
            .chain(32601..=32660)
            .chain(32701..=32760)
            .filter_map(|code| Self::from_epsg(code).ok())
            .find(|crs| matches!(crs, Crs::Projected { name: n, .. } if n == name))
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.epsg() == other.epsg()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// EPSG 326xx -> zone xx North, 327xx -> zone xx South.
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn geogcs_wkt(name: &str, datum: &str, ellipsoid: Ellipsoid) -> String {
    format!(
        "GEOGCS[\"{}\",DATUM[\"{}\",SPHEROID[\"{}\",{:?},{:?}]],PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]",
        name, datum, ellipsoid.name, ellipsoid.semi_major, ellipsoid.inverse_flattening
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap().epsg(), 4326);
        assert_eq!(Crs::parse("epsg:2277").unwrap().epsg(), 2277);
        assert_eq!(Crs::parse(" 32614 ").unwrap().epsg(), 32614);
        assert!(Crs::parse("EPSG:3857").is_err());
        assert!(Crs::parse("ESRI:102739").is_err());
        assert!(Crs::parse("EPSG:abc").is_err());
    }

    #[test]
    fn test_unsupported_code_is_an_error() {
        match Crs::from_epsg(27700) {
            Err(ProcessingError::UnsupportedCrs(id)) => assert_eq!(id, "EPSG:27700"),
            other => panic!("expected UnsupportedCrs, got {:?}", other),
        }
    }

    #[test]
    fn test_units() {
        assert_eq!(Crs::wgs84().unit(), None);
        assert_eq!(
            Crs::from_epsg(2277).unwrap().unit(),
            Some(LinearUnit::UsSurveyFoot)
        );
        assert_eq!(Crs::from_epsg(32614).unwrap().unit(), Some(LinearUnit::Metre));
    }

    // Reference point of the Austin extract in EPSG:2277 (checked against the
    // IOGP-validated LCC formulas with GRS80 and the Texas Central parameters).
    #[test]
    fn test_austin_reference_point_in_texas_central() {
        let wgs84 = Crs::wgs84();
        let texas_central = Crs::from_epsg(2277).unwrap();

        let projected = wgs84
            .transform(Point::new(-97.717035, 30.349979), &texas_central)
            .unwrap();

        assert_close(projected.x(), 3_121_744.48, 0.05, "easting");
        assert_close(projected.y(), 10_100_726.16, 0.05, "northing");
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let wgs84 = Crs::wgs84();
        let samples = [
            (-97.717035, 30.349979),
            (-97.75, 30.27),
            (-96.8, 32.78),
            (-98.49, 29.42),
        ];

        for code in [2275, 2276, 2277, 2278, 2279, 32614] {
            let target = Crs::from_epsg(code).unwrap();
            for &(lon, lat) in &samples {
                let projected = wgs84.transform(Point::new(lon, lat), &target).unwrap();
                let back = target.transform(projected, &wgs84).unwrap();
                assert_close(back.x(), lon, 1e-6, &format!("EPSG:{code} longitude"));
                assert_close(back.y(), lat, 1e-6, &format!("EPSG:{code} latitude"));
            }
        }
    }

    #[test]
    fn test_projected_to_projected() {
        let wgs84 = Crs::wgs84();
        let central = Crs::from_epsg(2277).unwrap();
        let utm = Crs::from_epsg(32614).unwrap();

        let in_central = wgs84.transform(Point::new(-97.7, 30.3), &central).unwrap();
        let in_utm = central.transform(in_central, &utm).unwrap();
        let direct = wgs84.transform(Point::new(-97.7, 30.3), &utm).unwrap();

        assert_close(in_utm.x(), direct.x(), 1e-3, "easting");
        assert_close(in_utm.y(), direct.y(), 1e-3, "northing");
    }

    #[test]
    fn test_identity_transform() {
        let p = Point::new(-97.7, 30.3);
        assert_eq!(Crs::wgs84().transform(p, &Crs::wgs84()).unwrap(), p);
    }

    #[test]
    fn test_wkt_identification() {
        for code in [4326, 2277, 32614, 32721] {
            let crs = Crs::from_epsg(code).unwrap();
            let identified = Crs::identify_wkt(&crs.to_wkt()).unwrap();
            assert_eq!(identified.epsg(), code);
        }
        assert!(Crs::identify_wkt("PROJCS[\"Somewhere_Else\"]").is_none());
        assert!(Crs::identify_wkt("").is_none());
    }

    #[test]
    fn test_wgs84_wkt() {
        assert_eq!(
            Crs::wgs84().to_wkt(),
            "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]"
        );
    }
}
