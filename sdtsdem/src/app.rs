use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::commons::basic_functions::plural_suffix;
use crate::geo_core::CellScale;
use crate::geometric::dem::Dem;
use crate::geometric::grid::{
    elevation_range, write_band_info, write_grid, ChopOffset, GridOptions, GridSummary,
};
use crate::pipeline::{
    build_steps, run_steps, ArtifactPaths, FailurePolicy, PipelineConfig, StepOutcome,
    SystemRunner, ToolRunner,
};

/// Everything one conversion needs
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    /// Print the dataset report and stop
    pub info: bool,
    pub debug: bool,
    pub chop: Option<ChopOffset>,
    /// Base name of the output files; enables the artifact pipeline
    pub name: Option<PathBuf>,
    pub policy: FailurePolicy,
    pub pipeline: PipelineConfig,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        RunOptions {
            input: input.into(),
            info: false,
            debug: false,
            chop: None,
            name: None,
            policy: FailurePolicy::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub cell_scale: CellScale,
    /// `None` in information mode
    pub grid: Option<GridSummary>,
    pub outcomes: Vec<StepOutcome>,
    /// Files written or requested, in creation order
    pub files: Vec<PathBuf>,
}

/// Run against the process's stdout/stderr and real external tools
pub fn run(options: &RunOptions) -> Result<RunReport> {
    let stdout = io::stdout();
    let stderr = io::stderr();
    run_with(
        options,
        &mut stdout.lock(),
        &mut stderr.lock(),
        &mut SystemRunner,
    )
}

/// Load, validate and convert one DEM.
///
/// The grid goes to `out` unless a base name is set, in which case it goes
/// to `X.asc` and the artifact pipeline runs afterwards. The dataset is
/// closed before the first external tool starts.
pub fn run_with<O, E>(
    options: &RunOptions,
    out: &mut O,
    err: &mut E,
    runner: &mut dyn ToolRunner,
) -> Result<RunReport>
where
    O: Write,
    E: Write,
{
    let dem = Dem::open(&options.input)?;

    if options.info {
        dem.write_georeferencing(out)?;
    }
    let cell_scale = dem.validate(options.info)?;

    let paths = options
        .name
        .as_deref()
        .map(|base| ArtifactPaths::new(base, &options.pipeline));

    let summary = {
        let band = dem.elevation_band()?;
        let range = elevation_range(&band)?;
        debug!(min = range.min, max = range.max, "band range");

        if options.info {
            dem.write_info(out)?;
            write_band_info(out, &band, dem.band_count(), &range)?;
            writeln!(out, "\nEarly exit for '--info' option.")?;
            out.flush()?;
            return Ok(RunReport {
                cell_scale,
                grid: None,
                outcomes: Vec::new(),
                files: Vec::new(),
            });
        }

        let (width, height) = band.size();
        let pixels_line = format!(
            "pixels: {} wide X {} high; scale: {} m X {} m X {} m",
            width, height, cell_scale.x, cell_scale.y, cell_scale.z
        );
        let grid_options = GridOptions {
            chop: options.chop,
            debug: options.debug,
        };

        match &paths {
            Some(paths) => {
                std::fs::write(&paths.info, format!("{}\n", pixels_line))
                    .context(format!("Failed to write {:?}", paths.info))?;
                let file = File::create(&paths.grid)
                    .context(format!("Failed to create {:?}", paths.grid))?;
                let mut grid = BufWriter::new(file);

                #[cfg(feature = "indicatif")]
                let progress = scanline_progress(height);
                let summary = write_grid(
                    &band,
                    range,
                    grid_options,
                    &mut grid,
                    Some(&mut *out as &mut dyn Write),
                    |_row| {
                        #[cfg(feature = "indicatif")]
                        progress.inc(1);
                    },
                )?;
                #[cfg(feature = "indicatif")]
                progress.finish_and_clear();
                summary
            }
            None => {
                writeln!(err, "{}", pixels_line)?;
                let mut grid = BufWriter::new(&mut *out);
                write_grid(&band, range, grid_options, &mut grid, None, |_| {})?
            }
        }
    };
    if summary.clamped > 0 {
        info!(pixels = summary.clamped, "negative elevations clamped to zero");
    }
    dem.close();

    let Some(paths) = paths else {
        return Ok(RunReport {
            cell_scale,
            grid: Some(summary),
            outcomes: Vec::new(),
            files: Vec::new(),
        });
    };

    let steps = build_steps(
        &paths,
        &options.pipeline,
        summary.width,
        summary.height,
        cell_scale.x,
    );
    let outcomes = run_steps(&steps, runner, options.policy)?;

    let files: Vec<PathBuf> = paths.all().into_iter().map(Path::to_path_buf).collect();
    writeln!(out, "Normal end.  See file{}:", plural_suffix(files.len()))?;
    for file in &files {
        writeln!(out, "  {}", file.display())?;
    }
    out.flush()?;

    Ok(RunReport {
        cell_scale,
        grid: Some(summary),
        outcomes,
        files,
    })
}

#[cfg(feature = "indicatif")]
fn scanline_progress(rows: usize) -> ProgressBar {
    let pb = ProgressBar::new(rows as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} scanlines")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}
