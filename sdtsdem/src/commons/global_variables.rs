/// Viewing azimuth (degrees) used for the rendered preview
pub const AZIMUTH: i32 = 35;

/// Viewing elevation (degrees) used for the rendered preview
pub const ELEVATION: i32 = 25;

/// Side of the square preview image, in pixels
pub const RENDER_SIZE: u32 = 512 * 3;

/// Chop offset applied when `--chop` is given without a value
pub const DEFAULT_CHOP_OFFSET: u32 = 1;

/// Vertical scale of every elevation sample (one unit per meter)
pub const Z_SCALE: i64 = 1;

/// Unit names accepted as meters. GDAL 3 exports "metre" where older
/// releases wrote "Meter".
pub const METER_UNIT_NAMES: &[&str] = &["Meter", "metre"];

/// Projection nodes dumped by `--info`, in print order
pub const PROJECTION_NODES: &[&str] = &["PROJCS", "GEOGCS", "DATUM", "SPHEROID", "PROJECTION"];

/// Deepest nesting level the projection dump descends to
pub const MAX_PROJECTION_DEPTH: usize = 8;

/// Band metadata keys holding explicit statistics
pub const STATISTICS_MINIMUM_KEY: &str = "STATISTICS_MINIMUM";
pub const STATISTICS_MAXIMUM_KEY: &str = "STATISTICS_MAXIMUM";

// External tools of the artifact pipeline
pub const REVERSE_TOOL: &str = "tac";
pub const DSP_TOOL: &str = "asc2dsp";
pub const MGED_TOOL: &str = "mged";
pub const RAYTRACE_TOOL: &str = "rt";
pub const PNG_TOOL: &str = "pix-png";
