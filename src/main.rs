use clap::Parser;
use crash_extract::cli::{run, Cli};
use crash_extract::utils::init_logging;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    let logs_to_file = cli.log_file.is_some();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            if logs_to_file {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}
