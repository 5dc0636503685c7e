//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them — log to serial, publish on the MQTT
//! status topic, update the web UI, etc.

use crate::printer::{DisplayState, StatusSnapshot};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic status snapshot for publication.
    StatusReport(StatusSnapshot),

    /// The display state changed.
    StateChanged {
        from: DisplayState,
        to: DisplayState,
    },

    /// The telemetry feed went silent and the printer now counts as
    /// disconnected.
    Disconnected,

    /// A lights toggle transition completed; `off` carries the new
    /// persisted override value.
    LightsToggled { off: bool },

    /// Settings were written to persistent storage.
    SettingsPersisted,

    /// The application service has started (carries initial state).
    Started(DisplayState),
}
