use anyhow::{Context, Result};
use gdal::raster::RasterBand;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, Metadata};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::DemError;
use crate::geo_core::{CellScale, GeoCore};
use crate::geometric::projection::{check_linear_unit, write_projection};

/// DEM (Digital Elevation Model) structure
/// Owns the opened GDAL dataset together with its georeferencing and the
/// spatial reference
pub struct Dem {
    /// Opened dataset, read-only
    dataset: Dataset,
    /// Path the dataset was opened from
    path: PathBuf,
    /// Geo-transform
    pub geo_core: GeoCore,
    /// False when the driver had no geo-transform and the default was used
    georeferenced: bool,
    /// Spatial reference, if the dataset has one
    projection: Option<SpatialRef>,
}

impl Dem {
    /// Open a DEM read-only
    pub fn open(path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path).map_err(|source| DemError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened dataset");
        Ok(Self::from_dataset(dataset, path))
    }

    /// Wrap an already opened dataset
    pub fn from_dataset(dataset: Dataset, path: impl Into<PathBuf>) -> Self {
        let (geo_core, georeferenced) = match dataset.geo_transform() {
            Ok(transform) => (GeoCore::new(transform), true),
            Err(e) => {
                warn!("no geo-transform ({}), using the identity transform", e);
                (GeoCore::default(), false)
            }
        };

        let projection = match dataset.spatial_ref() {
            Ok(srs) => Some(srs),
            Err(e) => {
                debug!("no spatial reference ({})", e);
                None
            }
        };

        Dem {
            dataset,
            path: path.into(),
            geo_core,
            georeferenced,
            projection,
        }
    }

    /// Check the grid can be converted and return its cell scale.
    /// The square-cell check is skipped in information mode; the unit check
    /// always runs.
    pub fn validate(&self, info_mode: bool) -> Result<CellScale> {
        let scale = self.geo_core.cell_scale();
        if !self.geo_core.is_north_up() {
            warn!(
                "raster is not north-up (rotation {}, {})",
                self.geo_core.transform[2], self.geo_core.transform[4]
            );
        }
        if !info_mode {
            scale.ensure_square()?;
        }
        if let Some(srs) = &self.projection {
            check_linear_unit(srs)?;
        }
        Ok(scale)
    }

    /// Band 1, the only band that is converted
    pub fn elevation_band(&self) -> Result<RasterBand<'_>> {
        if self.band_count() == 0 {
            return Err(DemError::NoRasterBand.into());
        }
        self.dataset
            .rasterband(1)
            .context("Failed to get raster band 1")
    }

    pub fn band_count(&self) -> usize {
        self.dataset.raster_count() as usize
    }

    /// (width, height) in pixels
    pub fn raster_size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    pub fn projection(&self) -> Option<&SpatialRef> {
        self.projection.as_ref()
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    /// Files making up the dataset
    pub fn files(&self) -> Vec<PathBuf> {
        dataset_files(&self.path)
    }

    /// Origin, pixel size and extent; printed before validation
    pub fn write_georeferencing<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        if !self.georeferenced {
            return Ok(());
        }
        let (x0, y0) = self.geo_core.origin();
        let (px, py) = self.geo_core.pixel_size();
        writeln!(out, "Origin = ({:.6},{:.6})", x0, y0)?;
        writeln!(out, "Pixel Size = ({:.6},{:.6})", px, py)?;

        let (width, height) = self.raster_size();
        let bbox = self.geo_core.bounds(width, height);
        writeln!(
            out,
            "Extent = ({:.6},{:.6}) - ({:.6},{:.6})",
            bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
        )?;
        Ok(())
    }

    /// Dataset section of the `--info` report
    pub fn write_info<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let files = self.files();
        if !files.is_empty() {
            writeln!(out, "Data set files:")?;
            for file in &files {
                writeln!(out, "  {}", file.display())?;
            }
        }

        write_string_list(out, "Dataset Metadata:", self.dataset.metadata_domain(""))?;

        let driver = self.dataset.driver();
        write_string_list(out, "Driver Metadata:", driver.metadata_domain(""))?;
        writeln!(out, "Driver: {}/{}", driver.short_name(), driver.long_name())?;

        let (width, height) = self.raster_size();
        writeln!(out, "Size is {}x{}x{}", width, height, self.band_count())?;

        write_projection(out, self.projection.as_ref())?;
        Ok(())
    }

    /// Release the dataset
    pub fn close(self) {
        debug!(path = %self.path.display(), "closing dataset");
        drop(self.dataset);
    }
}

fn write_string_list<W: Write + ?Sized>(
    out: &mut W,
    title: &str,
    items: Option<Vec<String>>,
) -> Result<()> {
    let items = items.unwrap_or_default();
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", title)?;
    for item in items {
        writeln!(out, "  {}", item)?;
    }
    Ok(())
}

/// The opened file plus, for an SDTS transfer opened through its catalog
/// (`xxxxCATD.DDF`), every `.DDF` module sharing the transfer prefix.
///
/// This is a guess from file names, not GDAL's own file list: modules the
/// catalog does not reference are included, and files of other formats
/// (world files, `.aux.xml` sidecars) are never listed.
pub fn dataset_files(path: &Path) -> Vec<PathBuf> {
    let mut files = vec![path.to_path_buf()];

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_uppercase())
        .unwrap_or_default();
    let Some(prefix) = name.strip_suffix("CATD.DDF") else {
        return files;
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };

    let mut modules: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|candidate| {
            let other = candidate
                .file_name()
                .map(|n| n.to_string_lossy().to_ascii_uppercase())
                .unwrap_or_default();
            other != name && other.starts_with(prefix) && other.ends_with(".DDF")
        })
        .collect();
    modules.sort();
    files.extend(modules);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_dataset_files_plain_raster() {
        let files = dataset_files(Path::new("dem.tif"));
        assert_eq!(files, vec![PathBuf::from("dem.tif")]);
    }

    #[test]
    fn test_dataset_files_sdts_transfer() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "1234CATD.DDF",
            "1234CEL0.DDF",
            "1234DDSH.DDF",
            "9999CATD.DDF",
            "1234.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let catd = dir.path().join("1234CATD.DDF");
        let files = dataset_files(&catd);
        assert_eq!(
            files,
            vec![
                catd.clone(),
                dir.path().join("1234CEL0.DDF"),
                dir.path().join("1234DDSH.DDF"),
            ]
        );
    }

    #[test]
    fn test_open_missing_file() {
        let err = Dem::open(Path::new("does/not/exist/7122CATD.DDF"))
            .err()
            .unwrap();
        match err.downcast_ref::<DemError>() {
            Some(DemError::Open { path, .. }) => {
                assert!(path.ends_with("7122CATD.DDF"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
