use crate::settings::{FetchConfig, Settings};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crash-extract")]
#[command(about = "Fetch crash records from a Socrata portal and export those near a point")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file [default: crash-extract.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download every record in the date window to a JSON file
    Fetch(FetchArgs),

    /// Keep records within the buffer radius and export them as a shapefile
    Filter(FilterArgs),

    /// Fetch, then filter the freshly written records
    Run {
        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Report coordinate validity of a record file without writing anything
    Validate {
        #[arg(short, long, help = "Record file [default: filter.input]")]
        input: Option<PathBuf>,
    },

    /// Display information about an exported shapefile
    Info {
        #[arg(short, long, help = "Shapefile [default: export output path]")]
        file: Option<PathBuf>,

        #[arg(short, long, default_value = "5")]
        sample: usize,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    #[arg(long, help = "Socrata resource endpoint")]
    pub url: Option<String>,

    #[arg(long, help = "Window start, inclusive (e.g. 2024-01-01T00:00:00)")]
    pub start: Option<NaiveDateTime>,

    #[arg(long, help = "Window end, exclusive")]
    pub end: Option<NaiveDateTime>,

    #[arg(long)]
    pub page_size: Option<usize>,

    #[arg(short, long, help = "Record file to write")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(short, long, help = "Record file to read")]
    pub input: Option<PathBuf>,

    #[arg(long, allow_hyphen_values = true, help = "Reference longitude")]
    pub longitude: Option<f64>,

    #[arg(long, allow_hyphen_values = true, help = "Reference latitude")]
    pub latitude: Option<f64>,

    #[arg(short, long, help = "Buffer radius in working CRS units")]
    pub radius: Option<f64>,

    #[arg(long, help = "Projected CRS for buffering (e.g. EPSG:2277)")]
    pub working_crs: Option<String>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub file_name: Option<String>,
}

impl FetchArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut FetchConfig) {
        if let Some(ref url) = self.url {
            config.api_url = url.clone();
        }
        if let Some(start) = self.start {
            config.start = start;
        }
        if let Some(end) = self.end {
            config.end = end;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(ref output) = self.output {
            config.output = output.clone();
        }
    }
}

impl FilterArgs {
    pub fn apply(&self, settings: &mut Settings) {
        let filter = &mut settings.filter;
        if let Some(ref input) = self.input {
            filter.input = input.clone();
        }
        if let Some(longitude) = self.longitude {
            filter.reference.longitude = longitude;
        }
        if let Some(latitude) = self.latitude {
            filter.reference.latitude = latitude;
        }
        if let Some(radius) = self.radius {
            filter.radius = radius;
        }
        if let Some(ref crs) = self.working_crs {
            filter.working_crs = crs.clone();
        }

        let export = &mut settings.export;
        if let Some(ref dir) = self.output_dir {
            export.output_dir = dir.clone();
        }
        if let Some(ref name) = self.file_name {
            export.file_name = name.clone();
        }
    }
}
