//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the shared printer monitor and the animation
//! engine, and exposes a clean, hardware-agnostic API. All I/O flows
//! through port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  telemetry ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  (monitor)     │        AppService        │
//!   StripPort ◀──│  state machine · renderer│──▶ ConfigPort
//!                └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::LedSettings;
use crate::led::{LedRenderer, LightsCommit};
use crate::printer::{DisplayState, PrinterMonitor, TelemetryDelta};
use crate::error::TelemetryError;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ConfigPort, EventSink, StripPort};

/// Minimum spacing between state-change status reports.
const STATUS_REPORT_INTERVAL_MS: u64 = 1_000;

/// The application service orchestrates all domain logic.
pub struct AppService {
    monitor: PrinterMonitor,
    renderer: LedRenderer,
    last_state: DisplayState,
    last_report_ms: u64,
}

impl AppService {
    /// Construct the service from loaded settings. `seed` feeds the
    /// sparkle PRNG; any non-constant source will do.
    pub fn new(settings: LedSettings, seed: u32) -> Self {
        Self {
            monitor: PrinterMonitor::new(settings),
            renderer: LedRenderer::new(seed),
            last_state: DisplayState::Unknown,
            last_report_ms: 0,
        }
    }

    /// Announce startup through the sink.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.last_state));
        info!("AppService started in {:?}", self.last_state);
    }

    /// A cloneable handle for the network layer to push telemetry into.
    pub fn monitor(&self) -> PrinterMonitor {
        self.monitor.clone()
    }

    /// Decode and apply one raw telemetry report. Convenience wrapper the
    /// network callback uses; safe to call at arbitrary frequency.
    pub fn ingest_report(&self, payload: &str, now_ms: u64) -> Result<bool, TelemetryError> {
        let delta = TelemetryDelta::from_report_json(payload)?;
        Ok(self.monitor.ingest(&delta, now_ms))
    }

    /// Current display state as of the last tick.
    pub fn display_state(&self) -> DisplayState {
        self.last_state
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one driver cycle: timers → snapshot → render → strip →
    /// deferred persistence. Rate limiting lives in the renderer, so the
    /// loop may call this faster than the animation cadence.
    pub fn tick(
        &mut self,
        strip: &mut impl StripPort,
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) {
        if self.monitor.check_connection_timeout(now_ms) {
            sink.emit(&AppEvent::Disconnected);
        }
        let _ = self.monitor.poll(now_ms);

        let (snap, settings) = self.monitor.snapshot();

        if snap.display_state != self.last_state {
            sink.emit(&AppEvent::StateChanged {
                from: self.last_state,
                to: snap.display_state,
            });
            self.last_state = snap.display_state;

            if now_ms.saturating_sub(self.last_report_ms) > STATUS_REPORT_INTERVAL_MS {
                sink.emit(&AppEvent::StatusReport(snap));
                self.last_report_ms = now_ms;
            }
        }

        let outcome = self.renderer.render(&snap, &settings, now_ms);
        if outcome.frame_updated {
            if let Err(e) = strip.show(self.renderer.frame()) {
                warn!("strip refresh failed: {e}");
            }
        }

        if let Some(commit) = outcome.lights_commit {
            let off = commit == LightsCommit::Off;
            self.monitor.set_lights_off_override(off);
            sink.emit(&AppEvent::LightsToggled { off });
        }

        // Persistence writes stay outside the state lock.
        if let Some(to_save) = self.monitor.take_persist_request() {
            match config.save(&to_save) {
                Ok(()) => {
                    info!("settings persisted");
                    sink.emit(&AppEvent::SettingsPersisted);
                }
                Err(e) => warn!("settings persist failed: {e}"),
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (from the configuration surface, the
    /// remote-command channel, or a button).
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink, now_ms: u64) {
        match cmd {
            AppCommand::LightsOff => self.start_lights_off(now_ms),
            AppCommand::LightsOn => self.renderer.begin_lights_on(now_ms),
            AppCommand::ToggleLights => {
                if self.monitor.settings().lights_off_override {
                    self.renderer.begin_lights_on(now_ms);
                } else {
                    self.start_lights_off(now_ms);
                }
            }
            AppCommand::UpdateSettings(settings) => {
                self.monitor.update_settings(settings);
                info!("settings updated at runtime");
            }
            AppCommand::PublishStatus => {
                let (snap, _) = self.monitor.snapshot();
                sink.emit(&AppEvent::StatusReport(snap));
                self.last_report_ms = now_ms;
            }
        }
    }

    fn start_lights_off(&mut self, now_ms: u64) {
        let (snap, settings) = self.monitor.snapshot();
        self.renderer.begin_lights_off(&snap, &settings, now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::RawState;
    use smart_leds::RGB8;
    use std::cell::RefCell;

    struct MockStrip {
        frames: Vec<Vec<RGB8>>,
    }
    impl MockStrip {
        fn new() -> Self {
            Self { frames: Vec::new() }
        }
    }
    impl StripPort for MockStrip {
        fn show(&mut self, frame: &[RGB8]) -> Result<(), crate::error::StripError> {
            self.frames.push(frame.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        saved: RefCell<Vec<LedSettings>>,
    }
    impl MockConfig {
        fn new() -> Self {
            Self {
                saved: RefCell::new(Vec::new()),
            }
        }
    }
    impl ConfigPort for MockConfig {
        fn load(&self) -> Result<LedSettings, super::super::ports::ConfigError> {
            Err(super::super::ports::ConfigError::NotFound)
        }
        fn save(
            &self,
            settings: &LedSettings,
        ) -> Result<(), super::super::ports::ConfigError> {
            self.saved.borrow_mut().push(settings.clone());
            Ok(())
        }
    }

    struct CollectSink {
        events: Vec<AppEvent>,
    }
    impl CollectSink {
        fn new() -> Self {
            Self { events: Vec::new() }
        }
    }
    impl EventSink for CollectSink {
        fn emit(&mut self, event: &AppEvent) {
            self.events.push(event.clone());
        }
    }

    #[test]
    fn tick_renders_a_frame_to_the_strip() {
        let mut service = AppService::new(LedSettings::default(), 1);
        let mut strip = MockStrip::new();
        let config = MockConfig::new();
        let mut sink = CollectSink::new();

        service
            .ingest_report(r#"{"print": {"gcode_state": "RUNNING", "mc_percent": 30}}"#, 500)
            .unwrap();
        service.tick(&mut strip, &config, &mut sink, 1_000);

        assert_eq!(strip.frames.len(), 1);
        assert_eq!(strip.frames[0].len(), 60);
        assert!(sink.events.iter().any(|e| matches!(
            e,
            AppEvent::StateChanged {
                to: DisplayState::Printing,
                ..
            }
        )));
    }

    #[test]
    fn lights_toggle_commits_and_persists() {
        let mut service = AppService::new(LedSettings::default(), 1);
        let mut strip = MockStrip::new();
        let config = MockConfig::new();
        let mut sink = CollectSink::new();

        service
            .ingest_report(r#"{"print": {"gcode_state": "PAUSE"}}"#, 500)
            .unwrap();
        service.tick(&mut strip, &config, &mut sink, 1_000);

        service.handle_command(AppCommand::LightsOff, &mut sink, 1_100);
        // Drive the transition past its 1 s duration.
        for t in [1_200u64, 1_500, 1_800, 2_200] {
            service.tick(&mut strip, &config, &mut sink, t);
        }

        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::LightsToggled { off: true })));
        let saved = config.saved.borrow();
        assert!(saved.iter().any(|s| s.lights_off_override));
    }

    #[test]
    fn update_settings_is_persisted_on_next_tick() {
        let mut service = AppService::new(LedSettings::default(), 1);
        let mut strip = MockStrip::new();
        let config = MockConfig::new();
        let mut sink = CollectSink::new();

        let mut settings = LedSettings::default();
        settings.led_count = 120;
        service.handle_command(AppCommand::UpdateSettings(settings), &mut sink, 900);
        service.tick(&mut strip, &config, &mut sink, 1_000);

        assert_eq!(config.saved.borrow().len(), 1);
        assert_eq!(config.saved.borrow()[0].led_count, 120);
        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::SettingsPersisted)));
        // The new strip length is live immediately.
        assert_eq!(strip.frames.last().unwrap().len(), 120);
    }

    #[test]
    fn malformed_report_is_rejected_without_state_change() {
        let service = AppService::new(LedSettings::default(), 1);
        assert!(service.ingest_report("definitely not json", 100).is_err());
        let (snap, _) = service.monitor().snapshot();
        assert_eq!(snap.display_state, DisplayState::Unknown);
    }

    #[test]
    fn publish_status_bypasses_rate_limit() {
        let mut service = AppService::new(LedSettings::default(), 1);
        let mut sink = CollectSink::new();
        let delta = TelemetryDelta {
            raw_state: Some(RawState::Running),
            ..TelemetryDelta::default()
        };
        service.monitor().ingest(&delta, 100);

        service.handle_command(AppCommand::PublishStatus, &mut sink, 200);
        assert!(matches!(sink.events[0], AppEvent::StatusReport(s)
            if s.display_state == DisplayState::Printing));
    }
}
