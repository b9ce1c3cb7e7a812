/// Source dataset
pub const DEFAULT_API_URL: &str = "https://data.austintexas.gov/resource/y2wy-tgr5.json";
pub const DEFAULT_TIMESTAMP_FIELD: &str = "crash_timestamp_ct";
pub const DEFAULT_WINDOW_START: &str = "2024-01-01T00:00:00";
pub const DEFAULT_WINDOW_END: &str = "2026-01-01T00:00:00";
pub const DEFAULT_TIEBREAKER: &str = ":id";

/// Record fields used to build geometry
pub const LONGITUDE_FIELD: &str = "longitude";
pub const LATITUDE_FIELD: &str = "latitude";

/// Pagination
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Network
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 10;
pub const RETRY_FACTOR: u32 = 2;
pub const USER_AGENT: &str = concat!("crash-extract/", env!("CARGO_PKG_VERSION"));
pub const APP_TOKEN_HEADER: &str = "X-App-Token";

/// Reference point (longitude, latitude)
pub const DEFAULT_REFERENCE_LONGITUDE: f64 = -97.717035;
pub const DEFAULT_REFERENCE_LATITUDE: f64 = 30.349979;

/// Buffer radius in units of the working CRS (US survey feet for EPSG:2277)
pub const DEFAULT_BUFFER_RADIUS: f64 = 500.0;
pub const DEFAULT_BUFFER_SEGMENTS: usize = 64;
pub const MIN_BUFFER_SEGMENTS: usize = 8;

/// Coordinate reference systems
pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";
pub const DEFAULT_WORKING_CRS: &str = "EPSG:2277";

/// File names
pub const DEFAULT_RECORDS_FILE: &str = "crash_data.json";
pub const DEFAULT_OUTPUT_DIR: &str = "crash_records_extract";
pub const DEFAULT_OUTPUT_FILE: &str = "crash_data.shp";
pub const DEFAULT_CONFIG_FILE: &str = "crash-extract.toml";
pub const MANIFEST_SUFFIX: &str = "manifest.json";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CRASH_EXTRACT";

/// dBase attribute table limits
pub const DBF_FIELD_NAME_LIMIT: usize = 10;
pub const DBF_CHARACTER_FIELD_LIMIT: usize = 254;
/// Sole column of the table written when there are no attributes
pub const DBF_PLACEHOLDER_FIELD: &str = "crash_id";
/// Contents of the `.cpg` sidecar; attribute text is written as UTF-8
pub const SHAPEFILE_ENCODING: &str = "UTF-8";
