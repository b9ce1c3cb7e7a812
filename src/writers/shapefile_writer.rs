use crate::crs::Crs;
use crate::error::{ProcessingError, Result};
use crate::models::GeoRecordSet;
use crate::utils::constants::{
    DBF_CHARACTER_FIELD_LIMIT, DBF_FIELD_NAME_LIMIT, DBF_PLACEHOLDER_FIELD, SHAPEFILE_ENCODING,
};
use geo::Point;
use serde_json::Value;
use shapefile::dbase::{self, FieldName, FieldValue, TableWriterBuilder};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SIDECAR_EXTENSIONS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

/// Source attribute name and the dBase column it was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub field: String,
}

impl FieldMapping {
    pub fn is_renamed(&self) -> bool {
        self.source != self.field
    }
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub features: usize,
    pub fields: Vec<FieldMapping>,
    pub crs: Crs,
}

impl ExportSummary {
    pub fn renamed_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.iter().filter(|m| m.is_renamed())
    }
}

/// Writes a GeoRecordSet as a point shapefile (`.shp`, `.shx`, `.dbf`, `.prj`,
/// `.cpg`). An empty set still produces a valid dataset with no shapes.
pub struct ShapefileWriter;

impl ShapefileWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, features: &GeoRecordSet, path: &Path) -> Result<ExportSummary> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        remove_dataset(path)?;

        let mut columns = collect_columns(features);
        if columns.is_empty() {
            // a dBase table needs at least one column
            columns.push(Column {
                source: DBF_PLACEHOLDER_FIELD.to_string(),
                width: 1,
                truncated: false,
            });
        }
        let mappings = map_field_names(columns.iter().map(|c| c.source.as_str()));

        let mut table = TableWriterBuilder::new();
        for (column, mapping) in columns.iter().zip(&mappings) {
            if mapping.is_renamed() {
                warn!(
                    "Attribute '{}' written as dBase field '{}'",
                    mapping.source, mapping.field
                );
            }
            if column.truncated {
                warn!(
                    "Values of '{}' exceed {} bytes and were truncated",
                    mapping.source, DBF_CHARACTER_FIELD_LIMIT
                );
            }
            let name = FieldName::try_from(mapping.field.as_str()).map_err(|e| {
                ProcessingError::InvalidFormat(format!(
                    "Invalid dBase field name '{}': {:?}",
                    mapping.field, e
                ))
            })?;
            table = table.add_character_field(name, column.width);
        }

        {
            let mut writer = shapefile::Writer::from_path(path, table)?;
            for geo in features.iter() {
                let mut record = dbase::Record::default();
                for (column, mapping) in columns.iter().zip(&mappings) {
                    let value = geo
                        .record
                        .get(&column.source)
                        .and_then(attribute_text)
                        .map(|text| truncate_bytes(&text, DBF_CHARACTER_FIELD_LIMIT).to_string());
                    record.insert(mapping.field.clone(), FieldValue::Character(value));
                }

                let point = shapefile::Point::new(geo.geometry.x(), geo.geometry.y());
                writer.write_shape_and_record(&point, &record)?;
            }
            // headers are finalised when the writer is dropped
        }

        fs::write(path.with_extension("prj"), features.crs().to_wkt())?;
        fs::write(path.with_extension("cpg"), SHAPEFILE_ENCODING)?;

        if features.is_empty() {
            warn!("No features to export; {} has no shapes", path.display());
        }
        info!(
            "Wrote {} features with {} attributes to {}",
            features.len(),
            mappings.len(),
            path.display()
        );

        Ok(ExportSummary {
            path: path.to_path_buf(),
            features: features.len(),
            fields: mappings,
            crs: features.crs().clone(),
        })
    }
}

impl Default for ShapefileWriter {
    fn default() -> Self {
        Self::new()
    }
}

struct Column {
    source: String,
    width: u8,
    truncated: bool,
}

/// Attribute names in first-seen order, each sized to its longest value.
fn collect_columns(features: &GeoRecordSet) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for geo in features.iter() {
        for (name, value) in geo.record.fields() {
            let slot = *index.entry(name.clone()).or_insert_with(|| {
                columns.push(Column {
                    source: name.clone(),
                    width: 1,
                    truncated: false,
                });
                columns.len() - 1
            });

            let length = attribute_text(value).map_or(0, |text| text.len());
            let column = &mut columns[slot];
            if length > DBF_CHARACTER_FIELD_LIMIT {
                column.truncated = true;
            }
            let width = length.clamp(1, DBF_CHARACTER_FIELD_LIMIT) as u8;
            column.width = column.width.max(width);
        }
    }

    columns
}

/// dBase column names: at most 10 bytes of `[A-Za-z0-9_]` starting with a
/// letter, unique ignoring case. Collisions keep a shortened prefix and get
/// `_1`, `_2`, ...
pub fn map_field_names<'a>(sources: impl IntoIterator<Item = &'a str>) -> Vec<FieldMapping> {
    let mut used: HashSet<String> = HashSet::new();
    let mut mappings = Vec::new();

    for source in sources {
        let mut base: String = source
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() {
            base = "FIELD".to_string();
        } else if !base.starts_with(|c: char| c.is_ascii_alphabetic()) {
            base.insert(0, 'F');
        }

        let mut field = truncate_bytes(&base, DBF_FIELD_NAME_LIMIT).to_string();
        let mut n = 1;
        while used.contains(&field.to_ascii_uppercase()) {
            let suffix = format!("_{}", n);
            let keep = DBF_FIELD_NAME_LIMIT.saturating_sub(suffix.len());
            field = format!("{}{}", truncate_bytes(&base, keep), suffix);
            n += 1;
        }

        used.insert(field.to_ascii_uppercase());
        mappings.push(FieldMapping {
            source: source.to_string(),
            field,
        });
    }

    mappings
}

/// Text stored in a character field. Nulls have none.
fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn truncate_bytes(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn remove_dataset(path: &Path) -> Result<()> {
    for extension in SIDECAR_EXTENSIONS {
        let file = path.with_extension(extension);
        if file.exists() {
            fs::remove_file(&file)?;
        }
    }
    Ok(())
}

/// One point feature read back from a shapefile.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFeature {
    pub geometry: Point<f64>,
    /// Non-empty attribute values by dBase field name.
    pub attributes: BTreeMap<String, String>,
}

pub fn read_features(path: &Path) -> Result<Vec<ShapeFeature>> {
    let field_names = read_field_names(path)?;
    let shapes = shapefile::read_as::<_, shapefile::Point, dbase::Record>(path)?;

    Ok(shapes
        .into_iter()
        .map(|(point, record)| {
            let attributes = field_names
                .iter()
                .filter_map(|name| match record.get(name) {
                    Some(FieldValue::Character(Some(text))) => {
                        let text = text.trim_end();
                        (!text.is_empty()).then(|| (name.clone(), text.to_string()))
                    }
                    _ => None,
                })
                .collect();
            ShapeFeature {
                geometry: Point::new(point.x, point.y),
                attributes,
            }
        })
        .collect())
}

/// Column names from the `.dbf` header, in table order.
fn read_field_names(path: &Path) -> Result<Vec<String>> {
    let dbf = path.with_extension("dbf");
    let reader = dbase::Reader::from_path(&dbf).map_err(|e| {
        ProcessingError::InvalidFormat(format!("Cannot read {}: {}", dbf.display(), e))
    })?;
    Ok(reader.fields().iter().map(|f| f.name().to_string()).collect())
}

#[derive(Debug)]
pub struct ShapefileInfo {
    pub path: PathBuf,
    pub feature_count: usize,
    pub field_names: Vec<String>,
    pub crs: Option<Crs>,
    pub file_sizes: Vec<(String, u64)>,
    pub sample: Vec<ShapeFeature>,
}

impl ShapefileInfo {
    /// Inspect a written dataset, keeping the first `sample` features.
    pub fn from_path(path: &Path, sample: usize) -> Result<Self> {
        if !path.exists() {
            return Err(ProcessingError::MissingData(format!(
                "Shapefile not found: {}",
                path.display()
            )));
        }

        let features = read_features(path)?;
        let field_names = read_field_names(path)?;

        let prj = path.with_extension("prj");
        let crs = if prj.exists() {
            Crs::identify_wkt(&fs::read_to_string(&prj)?)
        } else {
            None
        };

        let mut file_sizes = Vec::new();
        for extension in SIDECAR_EXTENSIONS {
            let file = path.with_extension(extension);
            if let Ok(metadata) = fs::metadata(&file) {
                file_sizes.push((extension.to_string(), metadata.len()));
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            feature_count: features.len(),
            field_names,
            crs,
            file_sizes,
            sample: features.into_iter().take(sample).collect(),
        })
    }

    pub fn summary(&self) -> String {
        let sizes: Vec<String> = self
            .file_sizes
            .iter()
            .map(|(ext, size)| format!(".{} {:.1} KB", ext, *size as f64 / 1024.0))
            .collect();

        let mut text = format!(
            "Shapefile Summary:\n\
            - Path: {}\n\
            - Features: {}\n\
            - Fields ({}): {}\n\
            - CRS: {}\n\
            - Files: {}",
            self.path.display(),
            self.feature_count,
            self.field_names.len(),
            self.field_names.join(", "),
            self.crs
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            sizes.join(", ")
        );

        for (i, feature) in self.sample.iter().enumerate() {
            text.push_str(&format!(
                "\n- Feature {}: ({:.6}, {:.6})",
                i + 1,
                feature.geometry.x(),
                feature.geometry.y()
            ));
        }
        text
    }
}
