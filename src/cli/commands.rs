use crate::api::{Fetcher, PageSource, SodaClient};
use crate::cli::args::{Cli, Commands};
use crate::error::Result;
use crate::models::FetchManifest;
use crate::processors::{CoordinateValidator, FilterOutcome, SpatialFilter};
use crate::readers::RecordReader;
use crate::settings::{FetchConfig, Settings};
use crate::utils::progress::ProgressReporter;
use crate::writers::{ExportSummary, JsonWriter, ShapefileInfo, ShapefileWriter};
use tracing::{info, warn};

pub fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch(args) => {
            args.apply(&mut settings.fetch);
            let settings = settings.validated()?;

            let manifest = fetch_records(&settings.fetch)?;
            println!("\n{}", manifest.summary());
        }

        Commands::Filter(args) => {
            args.apply(&mut settings);
            let settings = settings.validated()?;

            let (outcome, export) = filter_records(&settings)?;
            print_filter_report(&outcome, &export);
        }

        Commands::Run { fetch, filter } => {
            fetch.apply(&mut settings.fetch);
            filter.apply(&mut settings);
            settings.filter.input = settings.fetch.output.clone();
            let settings = settings.validated()?;

            let manifest = fetch_records(&settings.fetch)?;
            println!("\n{}", manifest.summary());

            let (outcome, export) = filter_records(&settings)?;
            print_filter_report(&outcome, &export);
        }

        Commands::Validate { input } => {
            if let Some(input) = input {
                settings.filter.input = input;
            }
            let settings = settings.validated()?;
            let path = &settings.filter.input;

            println!("Validating records in {}", path.display());
            let reader = RecordReader::new();
            if let Some(manifest) = reader.read_manifest(path)? {
                println!("\n{}", manifest.summary());
            }
            let records = reader.read_records(path)?;

            let validator = CoordinateValidator::new(
                &settings.filter.longitude_field,
                &settings.filter.latitude_field,
            )
            .with_timestamp_field(&settings.fetch.timestamp_field);
            let (geo_records, report) = validator.build_geo_records(records);

            println!("\n{}", report.summary());
            if let Some((first, last)) = geo_records.time_span() {
                println!("- Crash times: {} to {}", first, last);
            }
            if report.has_skips() {
                println!("⚠️  {} records have unusable coordinates", report.skipped_records());
            } else {
                println!("✅ All records have valid coordinates");
            }
        }

        Commands::Info { file, sample } => {
            let path = file.unwrap_or_else(|| settings.export.output_path());
            println!("Analyzing shapefile: {}", path.display());

            let info = ShapefileInfo::from_path(&path, sample)?;
            println!("\n{}", info.summary());
        }
    }

    Ok(())
}

/// Stage 1: download the configured window and persist it with a manifest.
///
/// Records gathered before a fatal error are still written and the manifest
/// marks them partial; the error is then returned.
pub fn fetch_records(config: &FetchConfig) -> Result<FetchManifest> {
    let client = SodaClient::from_config(config);
    info!(
        "Fetching from {} where {}",
        client.base_url(),
        client.query().where_clause()
    );
    let fetcher = Fetcher::new(client, config.page_size);
    fetch_with(&fetcher, config)
}

/// Pagination plus persistence over any page source.
pub fn fetch_with<S: PageSource>(fetcher: &Fetcher<S>, config: &FetchConfig) -> Result<FetchManifest> {
    let progress = ProgressReporter::new_spinner("Fetching crash records...", false);
    let outcome = fetcher.fetch_all(&progress);

    let query = config.query();
    let manifest = FetchManifest {
        complete: outcome.is_complete(),
        record_count: outcome.records.len(),
        pages: outcome.pages,
        api_url: config.api_url.clone(),
        where_clause: query.where_clause(),
        order: query.order_clause(),
        page_size: fetcher.page_size(),
        error: outcome.failure.as_ref().map(|e| e.to_string()),
    };

    let writer = JsonWriter::new();
    writer.write_records(&outcome.records, &config.output)?;
    let manifest_path = writer.write_manifest(&manifest, &config.output)?;
    info!("Manifest written to {}", manifest_path.display());

    match outcome.failure {
        None => {
            progress.finish_with_message(&format!("Fetched {} records", manifest.record_count));
            Ok(manifest)
        }
        Some(e) => {
            progress.abandon_with_message(&format!(
                "Fetch failed after {} records",
                manifest.record_count
            ));
            warn!(
                "Partial results ({} records) saved to {}",
                manifest.record_count,
                config.output.display()
            );
            Err(e)
        }
    }
}

/// Stage 2: load, filter and export.
pub fn filter_records(settings: &Settings) -> Result<(FilterOutcome, ExportSummary)> {
    let input = &settings.filter.input;
    let reader = RecordReader::new();
    reader.read_manifest(input)?;
    let records = reader.read_records(input)?;

    let filter = SpatialFilter::from_settings(settings)?;
    let outcome = filter.apply(records)?;

    let export = ShapefileWriter::new().write(&outcome.filtered, &settings.export.output_path())?;
    Ok((outcome, export))
}

fn print_filter_report(outcome: &FilterOutcome, export: &ExportSummary) {
    if outcome.skip_report.has_skips() {
        println!("\n{}", outcome.skip_report.summary());
    }
    println!("\n{}", outcome.summary());

    println!(
        "\nExported {} features to {}",
        export.features,
        export.path.display()
    );
    if export.features == 0 {
        println!("⚠️  No records within the buffer; the shapefile has no shapes");
    }
    for mapping in export.renamed_fields() {
        println!("  {} -> {}", mapping.source, mapping.field);
    }
}
