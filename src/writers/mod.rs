pub mod json_writer;
pub mod shapefile_writer;

pub use json_writer::{manifest_path, JsonWriter};
pub use shapefile_writer::{
    map_field_names, read_features, ExportSummary, FieldMapping, ShapeFeature, ShapefileInfo,
    ShapefileWriter,
};
