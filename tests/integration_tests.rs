use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use crash_extract::api::{Fetcher, PageSource, SodaClient};
use crash_extract::cli::{fetch_records, filter_records};
use crash_extract::crs::Crs;
use crash_extract::models::{RecordSet, ReferencePoint};
use crash_extract::processors::{BufferParams, SpatialFilter};
use crash_extract::readers::RecordReader;
use crash_extract::settings::{FetchConfig, Settings};
use crash_extract::writers::{manifest_path, read_features, ShapefileInfo};
use crash_extract::ProcessingError;
use geo::Point;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

const REF_LON: f64 = -97.717035;
const REF_LAT: f64 = 30.349979;

/// Socrata-like resource endpoint serving a fixed table.
#[derive(Clone, Default)]
struct Portal {
    rows: Arc<Vec<Value>>,
    /// Requests answered with 503 before serving normally.
    transient_failures: Arc<AtomicUsize>,
    /// Offset answered with 400.
    reject_offset: Option<usize>,
    /// Server-side cap on `$limit`.
    max_limit: Option<usize>,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl Portal {
    fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            rows: Arc::new(rows),
            ..Default::default()
        }
    }
}

async fn resource(
    State(portal): State<Portal>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    portal.requests.lock().unwrap().push(params.clone());

    if portal
        .transient_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response();
    }

    let offset: usize = params["$offset"].parse().unwrap();
    let mut limit: usize = params["$limit"].parse().unwrap();
    if portal.reject_offset == Some(offset) {
        return (StatusCode::BAD_REQUEST, "query.soql.no-such-column").into_response();
    }
    if let Some(max) = portal.max_limit {
        limit = limit.min(max);
    }

    let start = offset.min(portal.rows.len());
    let end = (offset + limit).min(portal.rows.len());
    Json(portal.rows[start..end].to_vec()).into_response()
}

struct MockServer {
    _runtime: Runtime,
    url: String,
    portal: Portal,
}

impl MockServer {
    fn start(portal: Portal) -> Self {
        let runtime = Runtime::new().expect("Failed to start runtime");
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");

        let app = Router::new()
            .route("/resource/crashes.json", get(resource))
            .with_state(portal.clone());
        runtime.spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Server failed to start");
        });

        Self {
            _runtime: runtime,
            url: format!("http://{}/resource/crashes.json", addr),
            portal,
        }
    }

    fn requests(&self) -> Vec<HashMap<String, String>> {
        self.portal.requests.lock().unwrap().clone()
    }
}

fn crash(id: usize, lon: f64, lat: f64) -> Value {
    json!({
        "crash_id": id.to_string(),
        "crash_timestamp_ct": format!("2024-03-{:02}T08:30:00.000", (id % 28) + 1),
        "crash_fatal_fl": "false",
        "latitude": format!("{:.6}", lat),
        "longitude": format!("{:.6}", lon),
    })
}

fn fetch_config(url: &str, output: &Path, page_size: usize) -> FetchConfig {
    FetchConfig {
        api_url: url.to_string(),
        page_size,
        retry_initial_delay_ms: 1,
        retry_max_delay_secs: 1,
        timeout_secs: 5,
        output: output.to_path_buf(),
        ..Default::default()
    }
}

fn ids(records: &RecordSet) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("crash_id").unwrap().as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_fetch_paginates_through_portal() {
    let rows: Vec<Value> = (0..12).map(|i| crash(i, REF_LON, REF_LAT)).collect();
    let server = MockServer::start(Portal::with_rows(rows));
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("crash_data.json");

    let manifest = fetch_records(&fetch_config(&server.url, &output, 5)).unwrap();

    assert!(manifest.complete);
    assert_eq!(manifest.record_count, 12);
    assert_eq!(manifest.pages, 3);

    let records = RecordReader::new().read_records(&output).unwrap();
    let expected: Vec<String> = (0..12).map(|i| i.to_string()).collect();
    assert_eq!(ids(&records), expected);

    let requests = server.requests();
    let offsets: Vec<&str> = requests.iter().map(|r| r["$offset"].as_str()).collect();
    assert_eq!(offsets, vec!["0", "5", "10", "12"]);
    assert_eq!(requests[0]["$limit"], "5");
    assert_eq!(
        requests[0]["$where"],
        "crash_timestamp_ct >= '2024-01-01T00:00:00' AND crash_timestamp_ct < '2026-01-01T00:00:00'"
    );
    assert_eq!(requests[0]["$order"], "crash_timestamp_ct DESC, :id ASC");
}

#[test]
fn test_zero_matches_writes_empty_array() {
    let server = MockServer::start(Portal::with_rows(vec![]));
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("crash_data.json");

    let manifest = fetch_records(&fetch_config(&server.url, &output, 5)).unwrap();

    assert!(manifest.complete);
    assert_eq!(manifest.record_count, 0);
    assert_eq!(manifest.pages, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "[]\n");
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn test_capped_limit_and_transient_errors_still_complete() {
    let rows: Vec<Value> = (0..9).map(|i| crash(i, REF_LON, REF_LAT)).collect();
    let mut portal = Portal::with_rows(rows);
    portal.max_limit = Some(4);
    portal.transient_failures = Arc::new(AtomicUsize::new(2));
    let server = MockServer::start(portal);

    let config = fetch_config(&server.url, Path::new("unused.json"), 10);
    let fetcher = Fetcher::new(SodaClient::from_config(&config), config.page_size);
    let outcome = fetcher.fetch_all(&crash_extract::utils::ProgressReporter::silent());

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 9);
    // two 503s, then pages of 4, 4, 1 and the empty page
    assert_eq!(server.requests().len(), 6);
}

#[test]
fn test_permanent_error_keeps_partial_results() {
    let rows: Vec<Value> = (0..10).map(|i| crash(i, REF_LON, REF_LAT)).collect();
    let mut portal = Portal::with_rows(rows);
    portal.reject_offset = Some(4);
    let server = MockServer::start(portal);
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("crash_data.json");

    let result = fetch_records(&fetch_config(&server.url, &output, 4));

    assert!(matches!(
        result,
        Err(ProcessingError::HttpStatus {
            status: 400,
            offset: 4,
            ..
        })
    ));
    // 4xx is not retried
    assert_eq!(server.requests().len(), 2);

    let reader = RecordReader::new();
    assert_eq!(reader.read_records(&output).unwrap().len(), 4);
    let manifest = reader.read_manifest(&output).unwrap().unwrap();
    assert!(!manifest.complete);
    assert_eq!(manifest.record_count, 4);
    assert!(manifest.error.unwrap().contains("400"));
}

#[test]
fn test_exhausted_retries_fail() {
    let mut portal = Portal::with_rows(vec![crash(1, REF_LON, REF_LAT)]);
    portal.transient_failures = Arc::new(AtomicUsize::new(10));
    let server = MockServer::start(portal);

    let mut config = fetch_config(&server.url, Path::new("unused.json"), 10);
    config.max_retries = 2;
    let client = SodaClient::from_config(&config);

    let result = client.fetch_page(10, 0);
    assert!(matches!(
        result,
        Err(ProcessingError::HttpStatus { status: 503, .. })
    ));
    assert_eq!(server.requests().len(), 3);
}

#[test]
fn test_unreachable_portal_is_a_transport_error() {
    let config = FetchConfig {
        api_url: "http://127.0.0.1:9/resource/crashes.json".to_string(),
        timeout_secs: 1,
        max_retries: 0,
        ..Default::default()
    };
    let result = SodaClient::from_config(&config).fetch_page(10, 0);
    assert!(matches!(result, Err(ProcessingError::Transport { offset: 0, .. })));
}

#[test]
fn test_rerun_output_is_byte_identical() {
    let rows: Vec<Value> = (0..7).map(|i| crash(i, REF_LON, REF_LAT)).collect();
    let server = MockServer::start(Portal::with_rows(rows));
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    fetch_records(&fetch_config(&server.url, &first, 3)).unwrap();
    fetch_records(&fetch_config(&server.url, &second, 3)).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    assert_eq!(
        fs::read(manifest_path(&first)).unwrap(),
        fs::read(manifest_path(&second)).unwrap()
    );
}

#[test]
fn test_end_to_end_five_records() {
    // 1e-3 degrees: ~364 ft of latitude, ~315 ft of longitude at this latitude
    let rows = vec![
        crash(1, REF_LON, REF_LAT + 0.0005),
        crash(2, REF_LON + 0.003, REF_LAT),
        crash(3, REF_LON - 0.001, REF_LAT),
        crash(4, REF_LON, REF_LAT + 0.002),
        crash(5, REF_LON - 0.01, REF_LAT - 0.01),
    ];
    let server = MockServer::start(Portal::with_rows(rows));
    let dir = TempDir::new().unwrap();

    let mut settings = Settings::default();
    settings.fetch = fetch_config(&server.url, &dir.path().join("crash_data.json"), 2);
    settings.filter.input = settings.fetch.output.clone();
    settings.export.output_dir = dir.path().join("crash_records_extract");
    let settings = settings.validated().unwrap();

    fetch_records(&settings.fetch).unwrap();
    let (outcome, export) = filter_records(&settings).unwrap();

    assert_eq!(outcome.total_records, 5);
    assert_eq!(outcome.retained(), 2);
    assert_eq!(export.features, 2);

    let path = settings.export.output_path();
    let features = read_features(&path).unwrap();
    assert_eq!(features.len(), 2);

    let expected = [
        ("1", REF_LON, REF_LAT + 0.0005),
        ("3", REF_LON - 0.001, REF_LAT),
    ];
    for (feature, (id, lon, lat)) in features.iter().zip(expected) {
        assert_eq!(feature.attributes["crash_id"], id);
        assert!((feature.geometry.x() - lon).abs() < 1e-7);
        assert!((feature.geometry.y() - lat).abs() < 1e-7);
    }

    let info = ShapefileInfo::from_path(&path, 0).unwrap();
    assert_eq!(info.crs, Some(Crs::wgs84()));
    assert!(fs::read_to_string(path.with_extension("prj"))
        .unwrap()
        .starts_with("GEOGCS[\"GCS_WGS_1984\""));
}

#[test]
fn test_no_records_in_buffer_still_exports_dataset() {
    let rows = vec![
        crash(1, REF_LON - 0.01, REF_LAT - 0.01),
        crash(2, REF_LON + 0.02, REF_LAT),
    ];
    let server = MockServer::start(Portal::with_rows(rows));
    let dir = TempDir::new().unwrap();

    let mut settings = Settings::default();
    settings.fetch = fetch_config(&server.url, &dir.path().join("crash_data.json"), 10);
    settings.filter.input = settings.fetch.output.clone();
    settings.export.output_dir = dir.path().join("crash_records_extract");
    let settings = settings.validated().unwrap();

    fetch_records(&settings.fetch).unwrap();
    let (outcome, export) = filter_records(&settings).unwrap();

    assert_eq!(outcome.retained(), 0);
    assert_eq!(export.features, 0);
    assert_eq!(export.path, settings.export.output_path());

    let info = ShapefileInfo::from_path(&export.path, 5).unwrap();
    assert_eq!(info.feature_count, 0);
    assert_eq!(info.crs, Some(Crs::wgs84()));
}

fn filter_500ft() -> SpatialFilter {
    SpatialFilter::new(
        ReferencePoint::new(REF_LON, REF_LAT),
        BufferParams::with_radius(500.0).unwrap(),
        Crs::from_epsg(2277).unwrap(),
        Crs::wgs84(),
    )
    .unwrap()
}

/// Geographic position `distance` ft from the reference along `angle`.
fn offset_from_reference(distance: f64, angle: f64) -> (f64, f64) {
    let wgs84 = Crs::wgs84();
    let state_plane = Crs::from_epsg(2277).unwrap();
    let centre = wgs84
        .transform(Point::new(REF_LON, REF_LAT), &state_plane)
        .unwrap();
    let target = Point::new(
        centre.x() + distance * angle.cos(),
        centre.y() + distance * angle.sin(),
    );
    let geographic = state_plane.transform(target, &wgs84).unwrap();
    (geographic.x(), geographic.y())
}

#[test]
fn test_containment_boundaries() {
    // between two buffer vertices, so exactly R lies outside the polygon
    let angle = PI / 64.0;
    let (at_r_lon, at_r_lat) = offset_from_reference(500.0, angle);
    let (beyond_lon, beyond_lat) = offset_from_reference(500.5, 3.0 * angle);
    let (inside_lon, inside_lat) = offset_from_reference(450.0, angle);

    let records: Vec<_> = [
        crash(1, REF_LON, REF_LAT),
        crash(2, at_r_lon, at_r_lat),
        crash(3, beyond_lon, beyond_lat),
        crash(4, inside_lon, inside_lat),
    ]
    .into_iter()
    .map(|v| serde_json::from_value(v).unwrap())
    .collect();

    let outcome = filter_500ft().apply(RecordSet::from(records)).unwrap();
    let kept: Vec<&str> = outcome
        .filtered
        .iter()
        .map(|g| g.record.get("crash_id").unwrap().as_str().unwrap())
        .collect();

    assert_eq!(kept, vec!["1", "4"]);
}

#[test]
fn test_invalid_coordinates_are_skipped_not_fatal() {
    let records: Vec<_> = vec![
        json!({"crash_id": "1", "latitude": format!("{}", REF_LAT), "longitude": format!("{}", REF_LON)}),
        json!({"crash_id": "2", "latitude": null, "longitude": "-97.7"}),
        json!({"crash_id": "3", "latitude": "thirty", "longitude": "-97.7"}),
        json!({"crash_id": "4"}),
        json!({"crash_id": "5", "latitude": "130.0", "longitude": "-97.7"}),
    ]
    .into_iter()
    .map(|v| serde_json::from_value(v).unwrap())
    .collect();

    let outcome = filter_500ft().apply(RecordSet::from(records)).unwrap();

    assert_eq!(outcome.retained(), 1);
    assert_eq!(outcome.skip_report.skipped_records(), 4);
    assert_eq!(outcome.skip_report.valid_records, 1);
}

#[test]
fn test_round_trip_reprojection() {
    let wgs84 = Crs::wgs84();
    for code in [2275, 2276, 2277, 2278, 2279, 32614] {
        let projected = Crs::from_epsg(code).unwrap();
        for (lon, lat) in [(-97.717035, 30.349979), (-101.8, 33.5), (-95.37, 29.76)] {
            let there = wgs84.transform(Point::new(lon, lat), &projected).unwrap();
            let back = projected.transform(there, &wgs84).unwrap();
            assert!((back.x() - lon).abs() < 1e-6, "EPSG:{code}");
            assert!((back.y() - lat).abs() < 1e-6, "EPSG:{code}");
        }
    }
}
