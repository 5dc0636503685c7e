//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the HTTP
//! configuration surface, the remote-command channel, a physical button)
//! that the [`AppService`](super::service::AppService) interprets and
//! acts upon.

use crate::config::LedSettings;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Switch the strip off with the capture + shrink transition.
    LightsOff,

    /// Switch the strip back on with the resume/reveal transition.
    LightsOn,

    /// Flip the strip between on and off, whichever applies.
    ToggleLights,

    /// Hot-swap settings (already validated at the configuration
    /// boundary) and queue a persist.
    UpdateSettings(LedSettings),

    /// Publish a status report immediately, bypassing the rate limit.
    PublishStatus,
}
