//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! The MQTT status-topic adapter implements the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::StatusReport(s) => {
                info!(
                    "STATUS | {} (raw {}) | print={}% dl={}% | layer {}/{} | \
                     bed={}/{}\u{00b0}C nozzle={}/{}\u{00b0}C | heat={} cool={} | \
                     err={} | connected={}",
                    s.display_state.as_str(),
                    s.raw_state.as_str(),
                    s.progress,
                    s.download_progress,
                    s.current_layer,
                    s.total_layers,
                    s.bed_temp,
                    s.bed_target,
                    s.nozzle_temp,
                    s.nozzle_target,
                    s.is_heating,
                    s.is_cooling,
                    s.error_code,
                    s.connected,
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.as_str(), to.as_str());
            }
            AppEvent::Disconnected => {
                info!("LINK  | telemetry feed lost");
            }
            AppEvent::LightsToggled { off } => {
                info!("LIGHT | strip {}", if *off { "off" } else { "on" });
            }
            AppEvent::SettingsPersisted => {
                info!("CONF  | settings written to NVS");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state.as_str());
            }
        }
    }
}
