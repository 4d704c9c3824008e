//! JSON serialization for analysis reports.

use crate::result::ShiftReport;

/// Serialize a ShiftReport to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (non-finite floats serialize as `null`,
/// so in practice this does not happen for ShiftReport).
pub fn to_json(report: &ShiftReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

/// Serialize a ShiftReport to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_pretty(report: &ShiftReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
