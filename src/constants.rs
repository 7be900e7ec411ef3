//! Format constants for model point files
//!
//! Marker characters, metadata line tags and defaults shared by the scanner,
//! the type codec and the exporter.

// =============================================================================
// Line markers
// =============================================================================

/// First character of every data row, and the only value of the marker column
pub const SENTINEL: char = '*';

/// [`SENTINEL`] as a field value
pub const SENTINEL_VALUE: &str = "*";

/// Header marker of a model point file (and of a fac table)
pub const MODEL_POINT_HEADER_MARKER: char = '!';

/// Header marker of a result file
pub const RESULT_HEADER_MARKER: char = '&';

// =============================================================================
// Metadata lines
// =============================================================================

/// Tag of the output format line written on export
pub const OUTPUT_FORMAT_TAG: &str = "OUTPUT_FORMAT";

/// Value written after [`OUTPUT_FORMAT_TAG`]
pub const OUTPUT_FORMAT_VALUE: &str = "mpfi";

/// Tag of the declared row count line
pub const NUMLINES_TAG: &str = "NUMLINES";

/// Tag of the type declaration line
pub const VARIABLE_TYPES_TAG: &str = "VARIABLE_TYPES";

/// Line terminator used on export regardless of host platform
pub const LINE_TERMINATOR: &str = "\n";

// =============================================================================
// Type codes
// =============================================================================

/// Date format assumed for a bare `D` code (month/day/4-digit year)
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Narrowest text width written on export, used when a column has no values
pub const MIN_TEXT_WIDTH: usize = 1;

// =============================================================================
// Configuration defaults
// =============================================================================

/// Config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "mpfi_config.json";

/// Extension of model point files (without the dot)
pub const DEFAULT_MPF_EXTENSION: &str = "PRO";

/// Extension of fac reference tables (without the dot)
pub const DEFAULT_FAC_EXTENSION: &str = "fac";

/// Column added on load holding the product name (the file stem)
pub const DEFAULT_PROD_NAME_COLUMN: &str = "_PROD_NAME";

/// Column added on load holding the full source path
pub const DEFAULT_FILE_NAME_COLUMN: &str = "_FILE_NAME";
