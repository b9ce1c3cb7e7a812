pub mod crash;
pub mod geo_record;
pub mod manifest;

pub use crash::{CoordinateIssue, CrashRecord, RecordSet};
pub use geo_record::{GeoRecord, GeoRecordSet, ReferencePoint};
pub use manifest::FetchManifest;
