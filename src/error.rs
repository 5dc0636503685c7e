#![allow(dead_code)] // Error types reserved for typed returns at the port boundary

//! Unified error types for the PrintGlow firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level driver loop's error handling
//! uniform. All variants are `Copy` so they can be cheaply passed around
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A telemetry report could not be decoded.
    Telemetry(TelemetryError),
    /// A frame capture request was rejected.
    Capture(CaptureError),
    /// The LED strip refused a frame.
    Strip(StripError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Capture(e) => write!(f, "capture: {e}"),
            Self::Strip(e) => write!(f, "strip: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Telemetry decode errors
// ---------------------------------------------------------------------------

/// Failures while decoding a printer report into a telemetry delta.
///
/// Individual absent or mistyped fields are *not* errors — they are skipped
/// and the previous value is retained. Only an unreadable document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// The report payload was not valid JSON.
    InvalidJson,
    /// The report payload was JSON but not an object.
    NotAnObject,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "payload is not valid JSON"),
            Self::NotAnObject => write!(f, "payload is not a JSON object"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

// ---------------------------------------------------------------------------
// Frame capture errors
// ---------------------------------------------------------------------------

/// Failures while snapshotting the live frame for resume-after-toggle.
/// Either way the prior snapshot, if any, is left intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    /// The configured strip length is outside the capturable range.
    LedCountOutOfRange(u16),
    /// The snapshot buffer could not be allocated.
    OutOfMemory,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LedCountOutOfRange(n) => {
                write!(f, "led count {n} outside capturable range 1-1000")
            }
            Self::OutOfMemory => write!(f, "snapshot buffer allocation failed"),
        }
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Self::Capture(e)
    }
}

// ---------------------------------------------------------------------------
// Strip errors
// ---------------------------------------------------------------------------

/// Failures while pushing a frame to the physical strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripError {
    /// The RMT transmission failed.
    WriteFailed,
    /// The frame length does not match the driver's pixel budget.
    LengthMismatch,
}

impl fmt::Display for StripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "RMT write failed"),
            Self::LengthMismatch => write!(f, "frame length mismatch"),
        }
    }
}

impl From<StripError> for Error {
    fn from(e: StripError) -> Self {
        Self::Strip(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
