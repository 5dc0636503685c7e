//! Telemetry delta decoding.
//!
//! The printer pushes JSON reports whose `print` object carries a sparse,
//! ever-changing subset of fields. A [`TelemetryDelta`] holds only the
//! fields present in one report; everything absent stays `None` and leaves
//! the corresponding runtime state untouched.
//!
//! The feed is sloppy about types — the prepare percentage and error code
//! arrive sometimes as numbers, sometimes as strings — so every field is
//! extracted tolerantly. A field that cannot be decoded is skipped, never
//! an error; only an unreadable document is rejected.

use serde_json::Value;

use super::RawState;
use crate::error::TelemetryError;

/// One decoded telemetry report. All fields optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryDelta {
    /// Raw printer status token (`gcode_state`).
    pub raw_state: Option<RawState>,
    /// Print completion percentage (`mc_percent`).
    pub progress: Option<u8>,
    /// Model download/prepare percentage (`gcode_file_prepare_percent`).
    pub download_progress: Option<u8>,
    /// Layer counters; only applied when both arrive together
    /// (`layer_num`, `total_layer_num`).
    pub layers: Option<(u32, u32)>,
    /// Bed temperature, whole degrees (`bed_temper`).
    pub bed_temp: Option<i16>,
    /// Nozzle temperature, whole degrees (`nozzle_temper`).
    pub nozzle_temp: Option<i16>,
    /// Bed target temperature (`bed_target_temper`).
    pub bed_target: Option<i16>,
    /// Nozzle target temperature (`nozzle_target_temper`).
    pub nozzle_target: Option<i16>,
    /// Remaining print time in minutes (`mc_remaining_time`).
    pub remaining_minutes: Option<u32>,
    /// Printer error code; `0` clears the error flag (`err`).
    pub error_code: Option<u64>,
}

impl TelemetryDelta {
    /// Decode a raw report payload.
    ///
    /// A report without a `print` object decodes to an empty delta — the
    /// feed also carries system/info messages we do not care about.
    pub fn from_report_json(payload: &str) -> Result<Self, TelemetryError> {
        let doc: Value =
            serde_json::from_str(payload).map_err(|_| TelemetryError::InvalidJson)?;
        if !doc.is_object() {
            return Err(TelemetryError::NotAnObject);
        }

        let mut delta = Self::default();
        let Some(print) = doc.get("print") else {
            return Ok(delta);
        };

        delta.raw_state = print
            .get("gcode_state")
            .and_then(Value::as_str)
            .map(RawState::parse);
        delta.progress = field_int(print, "mc_percent").map(clamp_u8);
        delta.download_progress =
            field_int(print, "gcode_file_prepare_percent").map(clamp_u8);

        if let (Some(layer), Some(total)) = (
            field_int(print, "layer_num"),
            field_int(print, "total_layer_num"),
        ) {
            delta.layers = Some((clamp_u32(layer), clamp_u32(total)));
        }

        delta.bed_temp = field_temp(print, "bed_temper");
        delta.nozzle_temp = field_temp(print, "nozzle_temper");
        delta.bed_target = field_temp(print, "bed_target_temper");
        delta.nozzle_target = field_temp(print, "nozzle_target_temper");

        delta.remaining_minutes = field_int(print, "mc_remaining_time").map(clamp_u32);
        delta.error_code = print.get("err").and_then(as_code);

        Ok(delta)
    }

    /// True when the report carried nothing we track.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ── Tolerant field extraction ─────────────────────────────────

/// Integer field that may arrive as a number, float, or numeric string.
fn field_int(print: &Value, key: &str) -> Option<i64> {
    let v = print.get(key)?;
    v.as_i64()
        .or_else(|| v.as_f64().map(|f| f as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Temperature field, truncated to whole degrees.
fn field_temp(print: &Value, key: &str) -> Option<i16> {
    field_int(print, key).map(|t| t.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16)
}

/// Error code: number or numeric string. `"0"` decodes to `Some(0)`.
fn as_code(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn clamp_u8(v: i64) -> u8 {
    v.clamp(0, i64::from(u8::MAX)) as u8
}

fn clamp_u32(v: i64) -> u32 {
    v.clamp(0, i64::from(u32::MAX)) as u32
}
