pub mod args;
pub mod commands;

pub use args::{Cli, Commands, FetchArgs, FilterArgs};
pub use commands::{fetch_records, fetch_with, filter_records, run};
