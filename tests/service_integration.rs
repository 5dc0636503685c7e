//! Integration tests: telemetry reports → AppService → strip frames.
//!
//! Runs the full stack on the host: JSON report decoding, the status
//! state machine, the animation engine, the simulated strip, and the
//! in-memory NVS backend — all on a fixed clock.

#![cfg(not(target_os = "espidf"))]

use printglow::adapters::nvs::NvsConfigAdapter;
use printglow::app::commands::AppCommand;
use printglow::app::events::AppEvent;
use printglow::app::ports::{ConfigPort, EventSink};
use printglow::app::service::AppService;
use printglow::config::LedSettings;
use printglow::drivers::strip::SimStrip;
use printglow::printer::DisplayState;
use smart_leds::RGB8;

struct CollectSink {
    events: Vec<AppEvent>,
}

impl CollectSink {
    fn new() -> Self {
        Self { events: Vec::new() }
    }

    fn saw_state_change(&self, to: DisplayState) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, AppEvent::StateChanged { to: t, .. } if *t == to))
    }
}

impl EventSink for CollectSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

fn harness() -> (AppService, SimStrip, NvsConfigAdapter, CollectSink) {
    let service = AppService::new(LedSettings::default(), 42);
    (
        service,
        SimStrip::new(),
        NvsConfigAdapter::new().unwrap(),
        CollectSink::new(),
    )
}

const BLACK: RGB8 = RGB8::new(0, 0, 0);

#[test]
fn boot_without_telemetry_shows_the_rainbow() {
    let (mut service, mut strip, nvs, mut sink) = harness();

    service.tick(&mut strip, &nvs, &mut sink, 1_000);

    let frame = strip.last().expect("a frame was shown");
    assert_eq!(frame.len(), 60);
    // Rainbow offset 0, forward direction: pixel 0 sits at wheel(0) = red.
    assert_eq!(frame[0], RGB8::new(255, 0, 0));
    // No display-state churn without a feed.
    assert!(!sink.saw_state_change(DisplayState::Idle));
}

#[test]
fn printing_report_drives_the_progress_bar() {
    let (mut service, mut strip, nvs, mut sink) = harness();

    service
        .ingest_report(
            r#"{"print": {"gcode_state": "RUNNING", "mc_percent": 50}}"#,
            500,
        )
        .unwrap();
    service.tick(&mut strip, &nvs, &mut sink, 1_000);

    assert!(sink.saw_state_change(DisplayState::Printing));
    let frame = strip.last().unwrap();
    // 50% of 60 pixels lit with the printing colour; tail dark.
    assert_eq!(frame[5], RGB8::new(75, 0, 130));
    assert_eq!(frame[29], RGB8::new(75, 0, 130));
    assert_eq!(frame[45], BLACK);
}

#[test]
fn finish_celebration_times_out_into_idle_and_persists() {
    let (mut service, mut strip, nvs, mut sink) = harness();

    // The printer finishes and keeps repeating FINISH for two minutes.
    for t in [0u64, 30_000, 60_000, 90_000, 119_000] {
        service
            .ingest_report(r#"{"print": {"gcode_state": "FINISH"}}"#, t)
            .unwrap();
        service.tick(&mut strip, &nvs, &mut sink, t + 100);
    }
    assert!(sink.saw_state_change(DisplayState::Finished));
    assert_eq!(service.display_state(), DisplayState::Finished);

    // Deadline passes: forced idle, flag persisted to NVS.
    service.tick(&mut strip, &nvs, &mut sink, 121_000);
    assert_eq!(service.display_state(), DisplayState::Idle);
    assert!(nvs.load().unwrap().state_timeout_reached);
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::SettingsPersisted)));

    // A fresh print clears the persisted flag again.
    service
        .ingest_report(r#"{"print": {"gcode_state": "RUNNING"}}"#, 130_000)
        .unwrap();
    service.tick(&mut strip, &nvs, &mut sink, 130_100);
    assert_eq!(service.display_state(), DisplayState::Printing);
    assert!(!nvs.load().unwrap().state_timeout_reached);
}

#[test]
fn lights_toggle_round_trip_resumes_the_bar() {
    let (mut service, mut strip, nvs, mut sink) = harness();

    service
        .ingest_report(
            r#"{"print": {"gcode_state": "RUNNING", "mc_percent": 40}}"#,
            500,
        )
        .unwrap();
    service.tick(&mut strip, &nvs, &mut sink, 1_000);

    // Switch off: the 1 s shrink transition, then a blank strip.
    service.handle_command(AppCommand::LightsOff, &mut sink, 1_100);
    for t in [1_200u64, 1_500, 1_900, 2_150, 2_200] {
        service.tick(&mut strip, &nvs, &mut sink, t);
    }
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::LightsToggled { off: true })));
    assert!(nvs.load().unwrap().lights_off_override);
    assert!(strip.last().unwrap().iter().all(|px| *px == BLACK));

    // Progress drifts a little while the strip is dark.
    service
        .ingest_report(
            r#"{"print": {"gcode_state": "RUNNING", "mc_percent": 42}}"#,
            2_300,
        )
        .unwrap();

    // Switch on: resume is accepted (same state, drift ≤ 5) and the bar
    // re-reveals from the middle outward.
    service.handle_command(AppCommand::LightsOn, &mut sink, 2_500);
    service.tick(&mut strip, &nvs, &mut sink, 2_900);
    let mid_transition = strip.last().unwrap().to_vec();
    assert_eq!(mid_transition[0], BLACK);
    assert!(mid_transition[22..30].iter().any(|px| *px != BLACK));

    for t in [3_200u64, 3_550] {
        service.tick(&mut strip, &nvs, &mut sink, t);
    }
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::LightsToggled { off: false })));
    assert!(!nvs.load().unwrap().lights_off_override);
}

#[test]
fn telemetry_silence_falls_back_to_the_rainbow() {
    let (mut service, mut strip, nvs, mut sink) = harness();

    service
        .ingest_report(
            r#"{"print": {"gcode_state": "RUNNING", "mc_percent": 10}}"#,
            1_000,
        )
        .unwrap();
    service.tick(&mut strip, &nvs, &mut sink, 1_500);
    assert_eq!(service.display_state(), DisplayState::Printing);

    // 46 s of silence: the monitor declares the printer disconnected.
    service.tick(&mut strip, &nvs, &mut sink, 47_500);
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::Disconnected)));
    let (snap, _) = service.monitor().snapshot();
    assert_eq!(snap.display_state, DisplayState::Unknown);
    // And the strip is cycling the rainbow again.
    assert_eq!(strip.last().unwrap()[0], RGB8::new(255, 0, 0));
}

#[test]
fn night_mode_dims_every_state() {
    let (mut service, mut strip, nvs, mut sink) = harness();

    let mut settings = LedSettings::default();
    settings.night_mode_enabled = true;
    settings.night_brightness = 25;
    service.handle_command(AppCommand::UpdateSettings(settings), &mut sink, 100);

    service
        .ingest_report(
            r#"{"print": {"gcode_state": "RUNNING", "mc_percent": 100}}"#,
            500,
        )
        .unwrap();
    service.tick(&mut strip, &nvs, &mut sink, 1_000);

    let frame = strip.last().unwrap();
    assert!(frame
        .iter()
        .all(|px| px.r <= 25 && px.g <= 25 && px.b <= 25));
}
