use std::path::PathBuf;

use clap::Parser;

use crate::app::RunOptions;
use crate::geometric::grid::ChopOffset;
use crate::pipeline::{FailurePolicy, PipelineConfig};

const AFTER_HELP: &str = "\
Without options, prints the grid to stdout and the pixel/scale summary to stderr.

With --name=X the outputs are:
  X.asc
  X.info
  X-reversed.asc
  X.dsp
  X.mged
  X.g (with X.r inside)
  X-az35-el25.pix (1536x1536)
  X-az35-el25.png";

/// Convert an SDTS DEM into an ASCII elevation grid
#[derive(Parser, Debug)]
#[command(name = "sdtsdem2asc", version, after_help = AFTER_HELP)]
pub struct Cli {
    /// SDTS CATD file (any single-band raster GDAL can open also works)
    pub input: PathBuf,

    /// Print information about the input file and exit
    #[arg(long)]
    pub info: bool,

    /// Print non-negative pixels as `pixel[col,row] = value` instead of the grid
    #[arg(long)]
    pub debug: bool,

    /// Chop cell heights to a base level of X below the minimum height (X >= 1)
    #[arg(
        long,
        value_name = "X",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "1",
        value_parser = parse_chop
    )]
    pub chop: Option<ChopOffset>,

    /// Base name for the output files; also runs the artifact pipeline
    #[arg(long, value_name = "X", value_parser = parse_name)]
    pub name: Option<PathBuf>,

    /// Stop at the first failed artifact step
    #[arg(long)]
    pub strict: bool,

    /// Verbose logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_chop(value: &str) -> Result<ChopOffset, String> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Chop elevation '{}' is not an integer.", value))?;
    ChopOffset::new(parsed).map_err(|e| e.to_string())
}

/// Any string, including the empty one
fn parse_name(value: &str) -> Result<PathBuf, String> {
    Ok(PathBuf::from(value))
}

impl From<Cli> for RunOptions {
    fn from(cli: Cli) -> Self {
        RunOptions {
            input: cli.input,
            info: cli.info,
            debug: cli.debug,
            chop: cli.chop,
            // an empty base name means no output files
            name: cli.name.filter(|name| !name.as_os_str().is_empty()),
            policy: if cli.strict {
                FailurePolicy::Abort
            } else {
                FailurePolicy::Continue
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["sdtsdem2asc", "7122CATD.DDF"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("7122CATD.DDF"));
        assert!(!cli.info && !cli.debug && !cli.strict);
        assert!(cli.chop.is_none());
        assert!(cli.name.is_none());
    }

    #[test]
    fn test_cli_chop_without_value() {
        let cli = Cli::try_parse_from(["sdtsdem2asc", "--chop", "in.ddf"]).unwrap();
        assert_eq!(cli.chop, Some(ChopOffset::default()));
        assert_eq!(cli.input, PathBuf::from("in.ddf"));
    }

    #[test]
    fn test_cli_chop_with_value() {
        let cli = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--chop=3"]).unwrap();
        assert_eq!(cli.chop.map(ChopOffset::get), Some(3));
    }

    #[test]
    fn test_cli_chop_rejects_zero() {
        let err = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--chop=0"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("less than 1"));
    }

    #[test]
    fn test_cli_name_forms() {
        let eq = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--name=out"]).unwrap();
        let sep = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--name", "out"]).unwrap();
        assert_eq!(eq.name, Some(PathBuf::from("out")));
        assert_eq!(eq.name, sep.name);
    }

    #[test]
    fn test_empty_name_writes_no_files() {
        let cli = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--name="]).unwrap();
        assert_eq!(cli.name, Some(PathBuf::new()));
        assert!(RunOptions::from(cli).name.is_none());

        let cli = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--name=out"]).unwrap();
        assert_eq!(RunOptions::from(cli).name, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_cli_help_is_not_a_usage_error() {
        let help = Cli::try_parse_from(["sdtsdem2asc", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
        assert!(!help.use_stderr());

        let usage = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--bogus"]).unwrap_err();
        assert!(usage.use_stderr());
    }

    #[test]
    fn test_cli_unknown_argument() {
        assert!(Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--bogus"]).is_err());
        assert!(Cli::try_parse_from(["sdtsdem2asc", "a.ddf", "b.ddf"]).is_err());
    }

    #[test]
    fn test_cli_missing_input() {
        let err = Cli::try_parse_from(["sdtsdem2asc", "--info"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_run_options_policy() {
        let cli = Cli::try_parse_from(["sdtsdem2asc", "in.ddf", "--strict"]).unwrap();
        let options = RunOptions::from(cli);
        assert_eq!(options.policy, FailurePolicy::Abort);
    }
}
