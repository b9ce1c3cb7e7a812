//! Run configuration for both stages.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `CRASH_EXTRACT__SECTION__KEY` environment variables. Command-line flags are
//! applied on top by the CLI before the result is validated.

use crate::api::{RetryPolicy, SoqlQuery, SortDirection};
use crate::crs::Crs;
use crate::error::Result;
use crate::models::ReferencePoint;
use crate::utils::constants::*;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub fetch: FetchConfig,

    #[validate(nested)]
    pub filter: FilterConfig,

    #[validate(nested)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_fetch_window"))]
pub struct FetchConfig {
    #[validate(url)]
    pub api_url: String,

    #[validate(length(min = 1))]
    pub timestamp_field: String,

    pub start: NaiveDateTime,
    pub end: NaiveDateTime,

    #[validate(range(min = 1, max = 50000))]
    pub page_size: usize,

    pub order: SortDirection,
    pub tiebreaker: Option<String>,

    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    pub max_retries: usize,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_secs: u64,
    pub app_token: Option<String>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_filter"))]
pub struct FilterConfig {
    pub input: PathBuf,

    #[validate(nested)]
    pub reference: ReferencePoint,

    pub radius: f64,
    pub working_crs: String,
    pub output_crs: String,

    #[validate(range(min = 8))]
    pub buffer_segments: usize,

    #[validate(length(min = 1))]
    pub longitude_field: String,

    #[validate(length(min = 1))]
    pub latitude_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ExportConfig {
    pub output_dir: PathBuf,

    #[validate(length(min = 1))]
    pub file_name: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let parse =
            |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap_or_default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
            start: parse(DEFAULT_WINDOW_START),
            end: parse(DEFAULT_WINDOW_END),
            page_size: DEFAULT_PAGE_SIZE,
            order: SortDirection::Desc,
            tiebreaker: Some(DEFAULT_TIEBREAKER.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            retry_max_delay_secs: DEFAULT_RETRY_MAX_DELAY_SECS,
            app_token: None,
            output: PathBuf::from(DEFAULT_RECORDS_FILE),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_RECORDS_FILE),
            reference: ReferencePoint::new(DEFAULT_REFERENCE_LONGITUDE, DEFAULT_REFERENCE_LATITUDE),
            radius: DEFAULT_BUFFER_RADIUS,
            working_crs: DEFAULT_WORKING_CRS.to_string(),
            output_crs: GEOGRAPHIC_CRS.to_string(),
            buffer_segments: DEFAULT_BUFFER_SEGMENTS,
            longitude_field: LONGITUDE_FIELD.to_string(),
            latitude_field: LATITUDE_FIELD.to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_name: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }
}

impl Settings {
    /// Load defaults, the config file and the process environment.
    ///
    /// An explicitly given file must exist; otherwise `crash-extract.toml` in the
    /// working directory is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize::<Settings>()?;

        Ok(settings)
    }

    /// Run the validators, consuming and returning the settings.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

impl FetchConfig {
    pub fn query(&self) -> SoqlQuery {
        SoqlQuery::between(&self.timestamp_field, self.start, self.end)
            .order_by(self.order)
            .with_tiebreaker(self.tiebreaker.as_deref())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.retry_initial_delay_ms),
            Duration::from_secs(self.retry_max_delay_secs),
            self.max_retries,
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FilterConfig {
    pub fn working_crs(&self) -> Result<Crs> {
        Crs::parse(&self.working_crs)
    }

    pub fn output_crs(&self) -> Result<Crs> {
        Crs::parse(&self.output_crs)
    }
}

impl ExportConfig {
    /// Destination `.shp` path; a missing extension is added.
    pub fn output_path(&self) -> PathBuf {
        let path = self.output_dir.join(&self.file_name);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("shp")
        }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn invalid(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

fn validate_fetch_window(config: &FetchConfig) -> std::result::Result<(), ValidationError> {
    if config.start >= config.end {
        return Err(invalid(
            "window",
            format!(
                "start ({}) must be earlier than end ({})",
                config.start, config.end
            ),
        ));
    }
    Ok(())
}

fn validate_filter(config: &FilterConfig) -> std::result::Result<(), ValidationError> {
    if !config.radius.is_finite() || config.radius <= 0.0 {
        return Err(invalid(
            "radius",
            format!("radius must be a positive number, got {}", config.radius),
        ));
    }

    match Crs::parse(&config.working_crs) {
        Ok(crs) if crs.is_geographic() => {
            return Err(invalid(
                "working_crs",
                format!(
                    "working CRS {} is geographic; buffering needs a projected CRS",
                    crs
                ),
            ))
        }
        Ok(_) => {}
        Err(e) => return Err(invalid("working_crs", e.to_string())),
    }

    match Crs::parse(&config.output_crs) {
        Ok(crs) if !crs.is_geographic() => Err(invalid(
            "output_crs",
            format!("output CRS {} must be geographic", crs),
        )),
        Ok(_) => Ok(()),
        Err(e) => Err(invalid("output_crs", e.to_string())),
    }
}
