//! Printer status interpretation.
//!
//! Turns noisy, partial, repeatedly-updated telemetry into one stable
//! discrete display state:
//!
//! ```text
//!   telemetry delta ──▶ ingest() ──▶ PrinterRuntimeState ──▶ DisplayState
//!                        │                                       │
//!                        ├── compare-and-set field updates       │
//!                        ├── thermal trend inference             ▼
//!                        ├── override timers (finish / error)  renderer
//!                        └── idle timeout → auto-off
//! ```
//!
//! The resolution precedence lives in [`state`]; [`monitor`] wraps the
//! runtime state in the single mutex that serialises the network callback
//! against the render loop.

pub mod monitor;
pub mod state;
pub mod telemetry;

pub use monitor::PrinterMonitor;
pub use state::{PrinterRuntimeState, StatusSnapshot};
pub use telemetry::TelemetryDelta;

// ---------------------------------------------------------------------------
// Raw printer status vocabulary
// ---------------------------------------------------------------------------

/// The printer's own unprocessed status token, before local interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawState {
    Idle,
    Running,
    Pause,
    Prepare,
    Finish,
    Failed,
    /// Anything the printer reports that we do not recognise, and the
    /// boot/disconnected default.
    Unknown,
}

impl RawState {
    /// Decode a status token from the telemetry feed.
    pub fn parse(token: &str) -> Self {
        match token {
            "IDLE" => Self::Idle,
            "RUNNING" => Self::Running,
            "PAUSE" => Self::Pause,
            "PREPARE" => Self::Prepare,
            "FINISH" => Self::Finish,
            "FAILED" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Pause => "PAUSE",
            Self::Prepare => "PREPARE",
            Self::Finish => "FINISH",
            Self::Failed => "FAILED",
            Self::Unknown => "unknown",
        }
    }

    /// States that wake the strip from auto-off.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Running | Self::Prepare | Self::Pause | Self::Finish | Self::Failed
        )
    }
}

// ---------------------------------------------------------------------------
// Display state
// ---------------------------------------------------------------------------

/// The single discrete value this core outputs, selected by precedence
/// among competing interpretive rules. Exactly one value at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Idle,
    Printing,
    Downloading,
    Paused,
    RecoverableError,
    Error,
    Heating,
    Cooling,
    Finished,
    AutoOff,
    Unknown,
}

impl DisplayState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Printing => "printing",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::RecoverableError => "recoverable_error",
            Self::Error => "error",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Finished => "finished",
            Self::AutoOff => "auto_off",
            Self::Unknown => "unknown",
        }
    }

    /// States whose animation is parameterised by a progress percentage.
    pub fn is_progress_state(self) -> bool {
        matches!(self, Self::Printing | Self::Downloading)
    }
}
