use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sdtsdem::cli::Cli;
use sdtsdem::RunOptions;

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(print_err) = e.print() {
                eprintln!("{}", e);
                eprintln!("(usage output failed: {})", print_err);
            }
            // usage errors exit with 1, --help and --version with 0
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    setup_logging(cli.verbose);

    match sdtsdem::run(&RunOptions::from(cli)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FATAL:  {:#}", e);
            ExitCode::from(1)
        }
    }
}
