use std::io::Write;

use anyhow::{Context, Result};
use gdal::raster::{RasterBand, StatisticsMinMax};
use gdal::Metadata;
use tracing::debug;

use crate::commons::basic_functions::plural_suffix;
use crate::commons::global_variables::{
    DEFAULT_CHOP_OFFSET, STATISTICS_MAXIMUM_KEY, STATISTICS_MINIMUM_KEY,
};
use crate::error::DemError;

/// Distance below the minimum elevation that chopped grids bottom out at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChopOffset(u32);

impl ChopOffset {
    /// Accepts any integer >= 1
    pub fn new(value: i64) -> Result<Self, DemError> {
        if value < 1 {
            return Err(DemError::InvalidChop(value));
        }
        u32::try_from(value)
            .map(ChopOffset)
            .map_err(|_| DemError::InvalidChop(value))
    }

    pub fn get(self) -> i64 {
        i64::from(self.0)
    }
}

impl Default for ChopOffset {
    fn default() -> Self {
        ChopOffset(DEFAULT_CHOP_OFFSET)
    }
}

/// Minimum and maximum sample of a band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationRange {
    pub min: f64,
    pub max: f64,
}

impl ElevationRange {
    /// Amount subtracted from every sample in chop mode.
    /// Saturates for fill values far outside the `i64` range.
    pub fn chop_base(&self, offset: ChopOffset) -> i64 {
        (self.min.floor() as i64).saturating_add(offset.get())
    }
}

/// Output switches for one extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct GridOptions {
    pub chop: Option<ChopOffset>,
    pub debug: bool,
}

/// What was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSummary {
    pub width: usize,
    pub height: usize,
    /// Pixels that came out negative (clamped, or skipped in debug mode)
    pub clamped: usize,
}

/// A raster readable one row at a time
pub trait ScanlineSource {
    /// (width, height) in pixels
    fn dimensions(&self) -> (usize, usize);

    /// Replace `buf` with the samples of `row`
    fn read_scanline(&self, row: usize, buf: &mut Vec<f32>) -> Result<()>;
}

impl ScanlineSource for RasterBand<'_> {
    fn dimensions(&self) -> (usize, usize) {
        self.size()
    }

    fn read_scanline(&self, row: usize, buf: &mut Vec<f32>) -> Result<()> {
        let (width, _) = self.size();
        let scanline = self
            .read_as::<f32>((0, row as isize), (width, 1), (width, 1), None)
            .with_context(|| format!("Failed to read scanline {}", row))?;
        buf.clear();
        buf.extend_from_slice(scanline.data());
        Ok(())
    }
}

/// Truncate a sample toward zero and apply the chop base, if any.
/// The result is not clamped to zero, only saturated at the `i64` bounds.
pub fn adjust_sample(sample: f32, chop_base: Option<i64>) -> i64 {
    let p = sample as i64;
    match chop_base {
        Some(base) => p.saturating_sub(base),
        None => p,
    }
}

/// Stream the elevation grid.
///
/// Normal mode writes every row to `grid` as space-prefixed integers with
/// negatives clamped to zero. Debug mode writes `pixel[col,row] = value`
/// lines for non-negative pixels to `debug_out` (or to `grid` when it is
/// `None`); `grid` then only gets the row terminators. `on_row` is called
/// after each scanline.
pub fn write_grid<S, G>(
    source: &S,
    range: ElevationRange,
    options: GridOptions,
    grid: &mut G,
    mut debug_out: Option<&mut dyn Write>,
    mut on_row: impl FnMut(usize),
) -> Result<GridSummary>
where
    S: ScanlineSource + ?Sized,
    G: Write + ?Sized,
{
    let (width, height) = source.dimensions();
    let chop_base = options.chop.map(|offset| range.chop_base(offset));
    if let Some(base) = chop_base {
        debug!(min = range.min, base, "chopping elevations");
    }

    let mut scanline = Vec::with_capacity(width);
    let mut clamped = 0;
    for row in 0..height {
        source.read_scanline(row, &mut scanline)?;
        for (col, &sample) in scanline.iter().enumerate() {
            let p = adjust_sample(sample, chop_base);
            if p < 0 {
                clamped += 1;
            }
            if options.debug {
                if p >= 0 {
                    match debug_out.as_deref_mut() {
                        Some(out) => writeln!(out, "pixel[{},{}] = {}", col, row, p)?,
                        None => writeln!(grid, "pixel[{},{}] = {}", col, row, p)?,
                    }
                }
            } else {
                write!(grid, " {}", p.max(0))?;
            }
        }
        writeln!(grid)?;
        on_row(row);
    }
    grid.flush()?;
    if let Some(out) = debug_out {
        out.flush()?;
    }

    Ok(GridSummary {
        width,
        height,
        clamped,
    })
}

/// Band minimum and maximum: explicit statistics metadata when both are
/// present, GDAL's computed min/max otherwise
pub fn elevation_range(band: &RasterBand) -> Result<ElevationRange> {
    let explicit = |key: &str| {
        band.metadata_item(key, "")
            .and_then(|v| v.trim().parse::<f64>().ok())
    };
    if let (Some(min), Some(max)) = (
        explicit(STATISTICS_MINIMUM_KEY),
        explicit(STATISTICS_MAXIMUM_KEY),
    ) {
        return Ok(ElevationRange { min, max });
    }

    let StatisticsMinMax { min, max } = band
        .compute_raster_min_max(true)
        .context("Failed to compute band minimum and maximum")?;
    Ok(ElevationRange { min, max })
}

/// Band section of the `--info` report
pub fn write_band_info<W: Write + ?Sized>(
    out: &mut W,
    band: &RasterBand,
    band_count: usize,
    range: &ElevationRange,
) -> Result<()> {
    let is_are = if band_count > 1 { "are" } else { "is" };
    writeln!(
        out,
        "There {} {} raster band{} in this data set.",
        is_are,
        band_count,
        plural_suffix(band_count)
    )?;
    writeln!(out, "Fetching data for band 1:")?;

    let (block_x, block_y) = band.block_size();
    let (nx, ny) = band.size();
    writeln!(
        out,
        "Block={}x{} Type={}, ColorInterp={}",
        block_x,
        block_y,
        band.band_type().name(),
        band.color_interpretation().name()
    )?;
    if nx != block_x {
        writeln!(out, "WARNING: nx = {} but nBlockXSize = {}", nx, block_x)?;
    }
    if ny != block_y {
        writeln!(out, "WARNING: ny = {} but nBlockYSize = {}", ny, block_y)?;
    }

    writeln!(out, "Min={:.3}, Max={:.3}", range.min, range.max)?;

    let overviews = band.overview_count().context("Failed to count overviews")?;
    if overviews > 0 {
        writeln!(out, "Band has {} overviews.", overviews)?;
    }
    if let Some(table) = band.color_table() {
        writeln!(
            out,
            "Band has a color table with {} entries.",
            table.entry_count()
        )?;
    }
    if let Some(no_data) = band.no_data_value() {
        writeln!(out, "NoData={}", no_data)?;
    }
    Ok(())
}
