//! Printer runtime state and the status resolution rules.
//!
//! [`PrinterRuntimeState`] is the single aggregate that owns every flag and
//! timer involved in turning raw telemetry into a display state. All
//! mutation goes through [`ingest`](PrinterRuntimeState::ingest) and
//! [`poll`](PrinterRuntimeState::poll); timestamps come in from the caller,
//! so every transition can be exercised with a fixed clock.
//!
//! Three wall-clock timers exist, and only three:
//!
//! | timer | duration | effect |
//! |---|---|---|
//! | thermal exit dwell | 5 s of no temperature change | drop heating/cooling |
//! | override deadline | 120 s in finish/error | force idle, persist flag |
//! | idle timeout | configured minutes | switch the strip off |

use log::{debug, info, warn};

use super::{DisplayState, RawState, TelemetryDelta};
use crate::config::LedSettings;

/// Temperature reading counter saturates here.
const TEMP_READINGS_MAX: u8 = 10;
/// Thermal inference needs this many readings before asserting anything.
const THERMAL_MIN_READINGS: u8 = 3;
/// Degrees a reading must move from the last significant value to count
/// as a change for hysteresis purposes.
const SIGNIFICANT_TEMP_DELTA: i16 = 1;
/// Dwell with no temperature change before a thermal flag is dropped.
const THERMAL_EXIT_DWELL_MS: u64 = 5_000;
/// How long the finish/error celebration holds before forcing idle.
const OVERRIDE_DEADLINE_MS: u64 = 120_000;

/// Why a generic status override is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideReason {
    FinishTimeout,
    ErrorTimeout,
}

impl OverrideReason {
    /// The raw state that armed the override; reports of it are suppressed
    /// while the override holds.
    fn trigger(self) -> RawState {
        match self {
            Self::FinishTimeout => RawState::Finish,
            Self::ErrorTimeout => RawState::Failed,
        }
    }
}

/// Hysteresis exit timer for a thermal flag.
#[derive(Debug, Clone, Copy, Default)]
struct ExitTimer {
    started: bool,
    at_ms: u64,
}

/// Time-boxed forced display state (finish/error celebration window).
#[derive(Debug, Clone, Copy, Default)]
struct OverrideTimer {
    active: bool,
    since_ms: u64,
}

/// A cheap read-only copy of everything the renderer and the status
/// publisher need. Taken under the monitor lock, consumed outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub display_state: DisplayState,
    pub raw_state: RawState,
    pub progress: u8,
    pub download_progress: u8,
    pub current_layer: u32,
    pub total_layers: u32,
    pub remaining_minutes: u32,
    pub bed_temp: i16,
    pub nozzle_temp: i16,
    pub bed_target: i16,
    pub nozzle_target: i16,
    pub is_heating: bool,
    pub is_cooling: bool,
    pub has_error: bool,
    pub error_code: u64,
    pub connected: bool,
}

impl StatusSnapshot {
    /// The strip falls back to the rainbow cycle in this condition.
    pub fn is_disconnected(&self) -> bool {
        !self.connected || self.display_state == DisplayState::Unknown
    }
}

/// The complete runtime state of the observed printer.
///
/// Created once at process start with all-zero/"unknown" defaults and
/// mutated in place for the process lifetime.
#[derive(Debug)]
pub struct PrinterRuntimeState {
    raw_state: RawState,
    display_state: DisplayState,
    last_stable_state: DisplayState,
    last_change_ms: u64,

    progress: u8,
    download_progress: u8,
    current_layer: u32,
    total_layers: u32,
    remaining_minutes: u32,

    bed_temp: i16,
    nozzle_temp: i16,
    bed_target: i16,
    nozzle_target: i16,
    prev_bed_temp: i16,
    prev_nozzle_temp: i16,
    last_significant_bed: i16,
    last_significant_nozzle: i16,
    last_temp_change_ms: u64,
    /// Saturates at [`TEMP_READINGS_MAX`]; gates thermal inference.
    reading_count: u8,

    is_heating: bool,
    is_cooling: bool,
    heating_since_ms: u64,
    cooling_since_ms: u64,
    heating_exit: ExitTimer,
    cooling_exit: ExitTimer,

    has_error: bool,
    error_code: u64,

    finish_override: OverrideTimer,
    error_override: OverrideTimer,
    status_override: Option<OverrideReason>,
    status_override_since_ms: u64,

    idle_since_ms: Option<u64>,
    auto_off_active: bool,

    connected: bool,
    last_telemetry_ms: u64,

    /// Set when this state machine flipped a persisted settings flag;
    /// drained by the monitor into a deferred persist request.
    settings_dirty: bool,
}

impl Default for PrinterRuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterRuntimeState {
    pub fn new() -> Self {
        Self {
            raw_state: RawState::Unknown,
            display_state: DisplayState::Unknown,
            last_stable_state: DisplayState::Unknown,
            last_change_ms: 0,
            progress: 0,
            download_progress: 0,
            current_layer: 0,
            total_layers: 0,
            remaining_minutes: 0,
            bed_temp: 0,
            nozzle_temp: 0,
            bed_target: 0,
            nozzle_target: 0,
            prev_bed_temp: 0,
            prev_nozzle_temp: 0,
            last_significant_bed: 0,
            last_significant_nozzle: 0,
            last_temp_change_ms: 0,
            reading_count: 0,
            is_heating: false,
            is_cooling: false,
            heating_since_ms: 0,
            cooling_since_ms: 0,
            heating_exit: ExitTimer::default(),
            cooling_exit: ExitTimer::default(),
            has_error: false,
            error_code: 0,
            finish_override: OverrideTimer::default(),
            error_override: OverrideTimer::default(),
            status_override: None,
            status_override_since_ms: 0,
            idle_since_ms: None,
            auto_off_active: false,
            connected: false,
            last_telemetry_ms: 0,
            settings_dirty: false,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn display_state(&self) -> DisplayState {
        self.display_state
    }

    pub fn raw_state(&self) -> RawState {
        self.raw_state
    }

    pub fn is_heating(&self) -> bool {
        self.is_heating
    }

    pub fn is_cooling(&self) -> bool {
        self.is_cooling
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_telemetry_ms(&self) -> u64 {
        self.last_telemetry_ms
    }

    pub fn last_stable_state(&self) -> DisplayState {
        self.last_stable_state
    }

    /// When the display state last changed.
    pub fn last_change_ms(&self) -> u64 {
        self.last_change_ms
    }

    /// When the current heating indication started (if heating).
    pub fn heating_since_ms(&self) -> u64 {
        self.heating_since_ms
    }

    /// When the current cooling indication started (if cooling).
    pub fn cooling_since_ms(&self) -> u64 {
        self.cooling_since_ms
    }

    /// When a temperature last moved by more than a degree.
    pub fn last_temp_change_ms(&self) -> u64 {
        self.last_temp_change_ms
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            display_state: self.display_state,
            raw_state: self.raw_state,
            progress: self.progress,
            download_progress: self.download_progress,
            current_layer: self.current_layer,
            total_layers: self.total_layers,
            remaining_minutes: self.remaining_minutes,
            bed_temp: self.bed_temp,
            nozzle_temp: self.nozzle_temp,
            bed_target: self.bed_target,
            nozzle_target: self.nozzle_target,
            is_heating: self.is_heating,
            is_cooling: self.is_cooling,
            has_error: self.has_error,
            error_code: self.error_code,
            connected: self.connected,
        }
    }

    /// Drain the "a persisted settings flag was flipped" marker.
    pub fn take_settings_dirty(&mut self) -> bool {
        core::mem::take(&mut self.settings_dirty)
    }

    // ── Ingest ────────────────────────────────────────────────

    /// Apply one telemetry delta, run thermal inference, and resolve the
    /// display state. Returns `true` if any tracked field or the display
    /// state changed; an identical consecutive delta reports `false`.
    pub fn ingest(
        &mut self,
        delta: &TelemetryDelta,
        settings: &mut LedSettings,
        now_ms: u64,
    ) -> bool {
        self.connected = true;
        self.last_telemetry_ms = now_ms;

        let mut changed = false;

        // Raw state, with override suppression: while an override holds,
        // reports of the state that armed it are ignored so the override
        // stays stable; any other state cancels it immediately.
        if let Some(new_raw) = delta.raw_state {
            let mut suppress = false;
            if let Some(reason) = self.status_override {
                if new_raw == reason.trigger() || new_raw == self.raw_state {
                    suppress = true;
                } else {
                    info!(
                        "status override cancelled after {}ms: raw state moved {} -> {}",
                        now_ms.saturating_sub(self.status_override_since_ms),
                        self.raw_state.as_str(),
                        new_raw.as_str()
                    );
                    self.status_override = None;
                }
            }
            if !suppress && self.raw_state != new_raw {
                self.raw_state = new_raw;
                changed = true;
            }
        }

        if let Some(p) = delta.progress {
            if p != self.progress {
                self.progress = p;
                changed = true;
            }
        }
        if let Some(p) = delta.download_progress {
            if p != self.download_progress {
                self.download_progress = p;
                changed = true;
            }
        }
        if let Some((layer, total)) = delta.layers {
            if layer != self.current_layer || total != self.total_layers {
                self.current_layer = layer;
                self.total_layers = total;
                changed = true;
            }
        }
        if let Some(t) = delta.remaining_minutes {
            if t != self.remaining_minutes {
                self.remaining_minutes = t;
                changed = true;
            }
        }

        changed |= self.apply_temperatures(delta, now_ms);
        changed |= self.update_thermal(now_ms);

        if let Some(code) = delta.error_code {
            let has_error = code != 0;
            if has_error != self.has_error {
                self.has_error = has_error;
                self.error_code = code;
                if has_error {
                    warn!("printer error detected: code {code}");
                } else {
                    info!("printer error cleared");
                }
                changed = true;
            }
        }

        let status_changed = self.resolve_display_state(settings, now_ms);
        changed || status_changed
    }

    /// Re-run only the status resolution so the override deadlines and the
    /// idle timeout can fire between telemetry deltas. Called by the
    /// fixed-cadence driver loop. Without a live feed there is nothing to
    /// resolve — the disconnected indication stands.
    pub fn poll(&mut self, settings: &mut LedSettings, now_ms: u64) -> bool {
        if !self.connected {
            return false;
        }
        self.resolve_display_state(settings, now_ms)
    }

    /// Telemetry silence exceeded the connection timeout: forget everything
    /// we inferred and fall back to the disconnected indication.
    pub fn mark_disconnected(&mut self, now_ms: u64) {
        warn!("telemetry feed silent - marking printer disconnected");
        self.connected = false;
        self.display_state = DisplayState::Unknown;
        self.raw_state = RawState::Unknown;
        self.reading_count = 0;
        self.is_heating = false;
        self.is_cooling = false;
        self.heating_exit.started = false;
        self.cooling_exit.started = false;
        self.last_temp_change_ms = now_ms;
        self.error_override.active = false;
    }

    // ── Temperature tracking ──────────────────────────────────

    fn apply_temperatures(&mut self, delta: &TelemetryDelta, now_ms: u64) -> bool {
        let mut changed = false;
        let mut has_new_temp = false;

        if let Some(t) = delta.bed_temp {
            if t != self.bed_temp {
                if self.reading_count == 0 {
                    self.prev_bed_temp = t;
                }
                if (t - self.last_significant_bed).abs() > SIGNIFICANT_TEMP_DELTA {
                    self.last_temp_change_ms = now_ms;
                    self.last_significant_bed = t;
                    self.heating_exit.started = false;
                    self.cooling_exit.started = false;
                }
                self.bed_temp = t;
                has_new_temp = true;
                changed = true;
            }
        }
        if let Some(t) = delta.nozzle_temp {
            if t != self.nozzle_temp {
                if self.reading_count == 0 {
                    self.prev_nozzle_temp = t;
                }
                if (t - self.last_significant_nozzle).abs() > SIGNIFICANT_TEMP_DELTA {
                    self.last_temp_change_ms = now_ms;
                    self.last_significant_nozzle = t;
                    self.heating_exit.started = false;
                    self.cooling_exit.started = false;
                }
                self.nozzle_temp = t;
                has_new_temp = true;
                changed = true;
            }
        }

        if has_new_temp && self.reading_count < TEMP_READINGS_MAX {
            self.reading_count += 1;
        }

        if let Some(t) = delta.bed_target {
            if t != self.bed_target {
                self.bed_target = t;
                changed = true;
            }
        }
        if let Some(t) = delta.nozzle_target {
            if t != self.nozzle_target {
                self.nozzle_target = t;
                changed = true;
            }
        }

        changed
    }

    /// Thermal trend inference with hysteresis.
    ///
    /// Heating: target meaningfully above ambient and the axis is still
    /// climbing toward it (or far below it). Cooling: hot with no target
    /// and not climbing. The two are mutually exclusive; heating wins.
    /// Either flag is dropped only after [`THERMAL_EXIT_DWELL_MS`] with
    /// both trends flat.
    fn update_thermal(&mut self, now_ms: u64) -> bool {
        if self.reading_count < THERMAL_MIN_READINGS {
            return false;
        }

        let nozzle_trend = self.nozzle_temp - self.prev_nozzle_temp;
        let bed_trend = self.bed_temp - self.prev_bed_temp;

        let nozzle_heating_target =
            self.nozzle_target > 40 && self.nozzle_temp < self.nozzle_target - 3;
        let bed_heating_target = self.bed_target > 40 && self.bed_temp < self.bed_target - 3;

        let active_heating = (nozzle_heating_target
            && (nozzle_trend > 0 || self.nozzle_temp < self.nozzle_target - 8))
            || (bed_heating_target && (bed_trend > 0 || self.bed_temp < self.bed_target - 8));

        let nozzle_cooling = self.nozzle_temp > 50
            && (self.nozzle_target <= 40 || self.nozzle_target == 0)
            && nozzle_trend <= 0;
        let bed_cooling = self.bed_temp > 50
            && (self.bed_target <= 40 || self.bed_target == 0)
            && bed_trend <= 0;
        let active_cooling = nozzle_cooling || bed_cooling;

        let no_temp_change = nozzle_trend == 0 && bed_trend == 0;

        let mut heating = self.is_heating;
        let mut cooling = self.is_cooling;

        if active_heating {
            if !heating {
                self.heating_since_ms = now_ms;
                self.last_temp_change_ms = now_ms;
            }
            heating = true;
            cooling = false;
            self.cooling_exit.started = false;
        } else if active_cooling {
            if !cooling {
                self.cooling_since_ms = now_ms;
                self.last_temp_change_ms = now_ms;
            }
            heating = false;
            cooling = true;
            self.heating_exit.started = false;
        } else {
            if heating {
                if no_temp_change && !self.heating_exit.started {
                    self.heating_exit = ExitTimer {
                        started: true,
                        at_ms: now_ms,
                    };
                    debug!("temperatures level - starting heating exit dwell");
                } else if self.heating_exit.started
                    && now_ms.saturating_sub(self.heating_exit.at_ms) >= THERMAL_EXIT_DWELL_MS
                {
                    info!("heating ended - no temperature change for 5s");
                    heating = false;
                    self.heating_exit.started = false;
                }
            }
            if cooling {
                if no_temp_change && !self.cooling_exit.started {
                    self.cooling_exit = ExitTimer {
                        started: true,
                        at_ms: now_ms,
                    };
                    debug!("temperatures level - starting cooling exit dwell");
                } else if self.cooling_exit.started
                    && now_ms.saturating_sub(self.cooling_exit.at_ms) >= THERMAL_EXIT_DWELL_MS
                {
                    info!("cooling ended - no temperature change for 5s");
                    cooling = false;
                    self.cooling_exit.started = false;
                }
            }
        }

        let flags_changed = heating != self.is_heating || cooling != self.is_cooling;
        if flags_changed {
            self.is_heating = heating;
            self.is_cooling = cooling;
            info!("thermal flags: heating={heating} cooling={cooling}");
        }

        self.prev_bed_temp = self.bed_temp;
        self.prev_nozzle_temp = self.nozzle_temp;

        flags_changed
    }

    // ── Status resolution ─────────────────────────────────────

    /// Recompute `display_state` from current fields. The rules form an
    /// ordered precedence table — the first rule that produces a state
    /// wins, and the evaluation order is load-bearing. Returns `true`
    /// when the display state changed.
    fn resolve_display_state(&mut self, settings: &mut LedSettings, now_ms: u64) -> bool {
        let current = self.display_state;
        let raw = self.raw_state;

        // 1. Idle timeout: a long-enough idle stretch switches the strip
        //    off. Holding auto-off outranks every other rule; only raw
        //    activity or a thermal flag wakes the strip again.
        if settings.idle_timeout_enabled
            && !self.auto_off_active
            && current == DisplayState::Idle
        {
            if let Some(since) = self.idle_since_ms {
                if now_ms.saturating_sub(since) >= settings.idle_timeout_ms() {
                    info!(
                        "idle timeout reached ({} min) - switching strip off",
                        settings.idle_timeout_minutes
                    );
                    self.auto_off_active = true;
                    return self.commit_status(current, DisplayState::AutoOff, raw, settings, now_ms);
                }
            }
        }
        if self.auto_off_active {
            if raw.is_active() || self.is_heating || self.is_cooling {
                info!("printer active - leaving auto-off");
                self.auto_off_active = false;
                self.idle_since_ms = None;
            } else {
                return self.commit_status(current, DisplayState::AutoOff, raw, settings, now_ms);
            }
        }

        // 2. A previous celebration ran out before a restart; stay idle
        //    while the printer keeps repeating it. Any other raw state
        //    falls through to the normal rules, whose commit bookkeeping
        //    then resets the flag.
        if settings.state_timeout_reached
            && matches!(raw, RawState::Finish | RawState::Failed)
        {
            return self.commit_status(current, DisplayState::Idle, raw, settings, now_ms);
        }

        // 3. Finish celebration window.
        if self.finish_override.active {
            if now_ms.saturating_sub(self.finish_override.since_ms) >= OVERRIDE_DEADLINE_MS {
                self.finish_override.active = false;
                self.status_override = Some(OverrideReason::FinishTimeout);
                self.status_override_since_ms = now_ms;
                settings.state_timeout_reached = true;
                self.settings_dirty = true;
                info!("finish window elapsed - forcing idle");
                return self.commit_status(current, DisplayState::Idle, raw, settings, now_ms);
            } else if raw != RawState::Finish {
                self.finish_override.active = false;
                info!("finish window dropped - raw state moved on");
            } else {
                return self.commit_status(current, DisplayState::Finished, raw, settings, now_ms);
            }
        }

        // 4. Error window, symmetric to the finish window.
        if self.error_override.active {
            if now_ms.saturating_sub(self.error_override.since_ms) >= OVERRIDE_DEADLINE_MS {
                self.error_override.active = false;
                self.status_override = Some(OverrideReason::ErrorTimeout);
                self.status_override_since_ms = now_ms;
                settings.state_timeout_reached = true;
                self.settings_dirty = true;
                info!("error window elapsed - forcing idle");
                return self.commit_status(current, DisplayState::Idle, raw, settings, now_ms);
            } else if raw != RawState::Failed && (!self.has_error || raw == RawState::Pause) {
                self.error_override.active = false;
                info!("error window dropped - error resolved");
            } else {
                return self.commit_status(current, DisplayState::Error, raw, settings, now_ms);
            }
        }

        // 5. Thermal indications.
        if self.is_heating && self.reading_count >= THERMAL_MIN_READINGS {
            return self.commit_status(current, DisplayState::Heating, raw, settings, now_ms);
        }
        if self.is_cooling && self.reading_count >= THERMAL_MIN_READINGS {
            // Compatibility mode: some printers pulse the bed heater
            // mid-print, which reads as cooling; keep showing progress.
            let status = if settings.compatibility_mode && self.progress > 0 && self.progress < 100
            {
                DisplayState::Printing
            } else {
                DisplayState::Cooling
            };
            return self.commit_status(current, status, raw, settings, now_ms);
        }

        // 6. Generic override with no thermal activity reads as idle.
        if self.status_override.is_some() {
            return self.commit_status(current, DisplayState::Idle, raw, settings, now_ms);
        }

        // 7. Plain raw-state mapping and fallbacks.
        let mapped = self.map_raw_state(current, now_ms);
        self.commit_status(current, mapped, raw, settings, now_ms)
    }

    /// Plain raw-state mapping, used once no timer or override claims the
    /// display. Arms the finish/error windows on first entry.
    fn map_raw_state(&mut self, current: DisplayState, now_ms: u64) -> DisplayState {
        match self.raw_state {
            RawState::Prepare => DisplayState::Downloading,
            RawState::Running => DisplayState::Printing,
            RawState::Pause => {
                if self.has_error {
                    DisplayState::RecoverableError
                } else {
                    DisplayState::Paused
                }
            }
            RawState::Finish => {
                if !self.finish_override.active {
                    self.finish_override = OverrideTimer {
                        active: true,
                        since_ms: now_ms,
                    };
                    info!("print finished - starting 2-minute celebration window");
                }
                DisplayState::Finished
            }
            RawState::Failed => {
                self.arm_error_override(now_ms);
                DisplayState::Error
            }
            _ if self.has_error => {
                // Error reported outside PAUSE/FAILED still shows as error.
                self.arm_error_override(now_ms);
                DisplayState::Error
            }
            RawState::Idle => DisplayState::Idle,
            RawState::Unknown => {
                if self.progress > 0 {
                    DisplayState::Printing
                } else if current == DisplayState::Unknown {
                    debug!("unknown raw status - defaulting to idle");
                    DisplayState::Idle
                } else {
                    current
                }
            }
        }
    }

    fn arm_error_override(&mut self, now_ms: u64) {
        if !self.error_override.active {
            self.error_override = OverrideTimer {
                active: true,
                since_ms: now_ms,
            };
            info!("print error - starting 2-minute error window");
        }
    }

    /// Record a display state change and run the entry/exit bookkeeping.
    fn commit_status(
        &mut self,
        current: DisplayState,
        new_status: DisplayState,
        raw: RawState,
        settings: &mut LedSettings,
        now_ms: u64,
    ) -> bool {
        if current == new_status {
            return false;
        }

        info!(
            "status changed '{}' -> '{}'",
            current.as_str(),
            new_status.as_str()
        );

        if new_status == DisplayState::Idle && current != DisplayState::Idle {
            self.idle_since_ms = Some(now_ms);
        } else if new_status != DisplayState::Idle && new_status != DisplayState::AutoOff {
            self.idle_since_ms = None;
        }

        if settings.state_timeout_reached
            && new_status != DisplayState::Finished
            && new_status != DisplayState::Error
            && raw != RawState::Finish
            && raw != RawState::Failed
        {
            settings.state_timeout_reached = false;
            self.settings_dirty = true;
            info!("persisted timeout flag reset");
        }

        self.last_stable_state = current;
        self.display_state = new_status;
        self.last_change_ms = now_ms;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LedSettings {
        LedSettings::default()
    }

    fn delta() -> TelemetryDelta {
        TelemetryDelta::default()
    }

    fn raw(state: RawState) -> TelemetryDelta {
        TelemetryDelta {
            raw_state: Some(state),
            ..TelemetryDelta::default()
        }
    }

    fn nozzle(temp: i16, target: i16) -> TelemetryDelta {
        TelemetryDelta {
            nozzle_temp: Some(temp),
            nozzle_target: Some(target),
            ..TelemetryDelta::default()
        }
    }

    #[test]
    fn boots_unknown_and_disconnected() {
        let s = PrinterRuntimeState::new();
        assert_eq!(s.display_state(), DisplayState::Unknown);
        assert_eq!(s.raw_state(), RawState::Unknown);
        assert!(!s.is_connected());
        assert!(s.snapshot().is_disconnected());
    }

    #[test]
    fn raw_states_map_to_display_states() {
        let cases = [
            (RawState::Running, DisplayState::Printing),
            (RawState::Prepare, DisplayState::Downloading),
            (RawState::Pause, DisplayState::Paused),
            (RawState::Idle, DisplayState::Idle),
        ];
        for (input, expected) in cases {
            let mut s = PrinterRuntimeState::new();
            let mut cfg = settings();
            assert!(s.ingest(&raw(input), &mut cfg, 1_000));
            assert_eq!(s.display_state(), expected, "raw {input:?}");
        }
    }

    #[test]
    fn ingest_twice_reports_no_change() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        let d = TelemetryDelta {
            raw_state: Some(RawState::Running),
            progress: Some(42),
            ..delta()
        };
        assert!(s.ingest(&d, &mut cfg, 1_000));
        assert!(!s.ingest(&d, &mut cfg, 2_000));
        assert_eq!(s.display_state(), DisplayState::Printing);
    }

    #[test]
    fn pause_with_error_is_recoverable() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        let d = TelemetryDelta {
            raw_state: Some(RawState::Pause),
            error_code: Some(0x0300_0001),
            ..delta()
        };
        s.ingest(&d, &mut cfg, 1_000);
        assert_eq!(s.display_state(), DisplayState::RecoverableError);
    }

    #[test]
    fn error_outside_pause_shows_error() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        let d = TelemetryDelta {
            raw_state: Some(RawState::Idle),
            error_code: Some(77),
            ..delta()
        };
        s.ingest(&d, &mut cfg, 1_000);
        assert_eq!(s.display_state(), DisplayState::Error);

        // Code 0 clears the latch and drops the error window.
        let clear = TelemetryDelta {
            error_code: Some(0),
            ..delta()
        };
        s.ingest(&clear, &mut cfg, 2_000);
        assert_eq!(s.display_state(), DisplayState::Idle);
        assert!(!s.snapshot().has_error);
    }

    // ── Thermal inference ─────────────────────────────────────

    #[test]
    fn heating_needs_three_readings() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&nozzle(150, 200), &mut cfg, 0);
        assert!(!s.is_heating());
        s.ingest(&nozzle(160, 200), &mut cfg, 1_000);
        assert!(!s.is_heating());
        s.ingest(&nozzle(170, 200), &mut cfg, 2_000);
        assert!(s.is_heating());
        assert_eq!(s.display_state(), DisplayState::Heating);
    }

    #[test]
    fn heating_holds_while_far_below_target() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&nozzle(150, 200), &mut cfg, 0);
        s.ingest(&nozzle(160, 200), &mut cfg, 1_000);
        s.ingest(&nozzle(170, 200), &mut cfg, 2_000);
        assert!(s.is_heating());
        // Trend goes flat, but 170 is still more than 8 below target:
        // the indication holds without any dwell timer.
        for t in [8_000u64, 14_000, 20_000] {
            s.ingest(&delta(), &mut cfg, t);
            assert!(s.is_heating(), "at {t}");
        }
    }

    #[test]
    fn heating_exits_after_dwell_near_target() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&nozzle(150, 200), &mut cfg, 0);
        s.ingest(&nozzle(180, 200), &mut cfg, 1_000);
        s.ingest(&nozzle(195, 200), &mut cfg, 2_000);
        assert!(s.is_heating());

        // Flat readings: first starts the 5 s dwell, later one past the
        // deadline clears the flag.
        s.ingest(&delta(), &mut cfg, 3_000);
        assert!(s.is_heating());
        s.ingest(&delta(), &mut cfg, 7_900);
        assert!(s.is_heating());
        s.ingest(&delta(), &mut cfg, 8_100);
        assert!(!s.is_heating());
    }

    #[test]
    fn temperature_blip_restarts_exit_dwell() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&nozzle(150, 200), &mut cfg, 0);
        s.ingest(&nozzle(180, 200), &mut cfg, 1_000);
        s.ingest(&nozzle(195, 200), &mut cfg, 2_000);
        s.ingest(&delta(), &mut cfg, 3_000); // dwell starts

        // A 2-degree move cancels the dwell...
        let blip = TelemetryDelta {
            nozzle_temp: Some(197),
            ..delta()
        };
        s.ingest(&blip, &mut cfg, 6_000);
        assert!(s.is_heating());

        // ...so flat readings must dwell the full 5 s again.
        s.ingest(&delta(), &mut cfg, 7_000);
        s.ingest(&delta(), &mut cfg, 11_500);
        assert!(s.is_heating());
        s.ingest(&delta(), &mut cfg, 12_100);
        assert!(!s.is_heating());
    }

    #[test]
    fn cooling_asserted_when_hot_with_no_target() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&nozzle(180, 0), &mut cfg, 0);
        s.ingest(&nozzle(170, 0), &mut cfg, 1_000);
        s.ingest(&nozzle(160, 0), &mut cfg, 2_000);
        assert!(s.is_cooling());
        assert!(!s.is_heating());
        assert_eq!(s.display_state(), DisplayState::Cooling);
    }

    #[test]
    fn heating_and_cooling_are_mutually_exclusive() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        // Bed cooling down while the nozzle heats up: heating wins.
        let d1 = TelemetryDelta {
            bed_temp: Some(80),
            nozzle_temp: Some(150),
            nozzle_target: Some(220),
            bed_target: Some(0),
            ..delta()
        };
        s.ingest(&d1, &mut cfg, 0);
        let d2 = TelemetryDelta {
            bed_temp: Some(75),
            nozzle_temp: Some(170),
            ..delta()
        };
        s.ingest(&d2, &mut cfg, 1_000);
        let d3 = TelemetryDelta {
            bed_temp: Some(70),
            nozzle_temp: Some(190),
            ..delta()
        };
        s.ingest(&d3, &mut cfg, 2_000);
        assert!(s.is_heating());
        assert!(!s.is_cooling());
    }

    #[test]
    fn compatibility_mode_reports_printing_instead_of_cooling() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        cfg.compatibility_mode = true;
        let with_progress = TelemetryDelta {
            progress: Some(55),
            ..nozzle(180, 0)
        };
        s.ingest(&with_progress, &mut cfg, 0);
        s.ingest(&nozzle(170, 0), &mut cfg, 1_000);
        s.ingest(&nozzle(160, 0), &mut cfg, 2_000);
        assert!(s.is_cooling());
        assert_eq!(s.display_state(), DisplayState::Printing);
    }

    // ── Override windows ──────────────────────────────────────

    #[test]
    fn finish_window_expires_into_idle_and_persists_flag() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&raw(RawState::Finish), &mut cfg, 0);
        assert_eq!(s.display_state(), DisplayState::Finished);

        assert!(!s.poll(&mut cfg, 119_000));
        assert_eq!(s.display_state(), DisplayState::Finished);

        assert!(s.poll(&mut cfg, 120_000));
        assert_eq!(s.display_state(), DisplayState::Idle);
        assert!(cfg.state_timeout_reached);
        assert!(s.take_settings_dirty());
    }

    #[test]
    fn stale_finish_reports_stay_suppressed() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&raw(RawState::Finish), &mut cfg, 0);
        s.poll(&mut cfg, 120_000);
        assert_eq!(s.display_state(), DisplayState::Idle);

        // The printer keeps repeating FINISH; the override holds.
        assert!(!s.ingest(&raw(RawState::Finish), &mut cfg, 130_000));
        assert_eq!(s.display_state(), DisplayState::Idle);
    }

    #[test]
    fn timeout_flag_clears_once_printer_runs_again() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&raw(RawState::Finish), &mut cfg, 0);
        s.poll(&mut cfg, 120_000);
        let _ = s.take_settings_dirty();
        assert!(cfg.state_timeout_reached);

        assert!(s.ingest(&raw(RawState::Running), &mut cfg, 150_000));
        assert_eq!(s.display_state(), DisplayState::Printing);
        assert!(!cfg.state_timeout_reached);
        assert!(s.take_settings_dirty());
    }

    #[test]
    fn finish_window_drops_when_raw_state_moves_on() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&raw(RawState::Finish), &mut cfg, 0);
        assert_eq!(s.display_state(), DisplayState::Finished);
        s.ingest(&raw(RawState::Running), &mut cfg, 30_000);
        assert_eq!(s.display_state(), DisplayState::Printing);

        // Window is disarmed, so no forced idle fires later.
        assert!(!s.poll(&mut cfg, 200_000));
        assert_eq!(s.display_state(), DisplayState::Printing);
        assert!(!cfg.state_timeout_reached);
    }

    #[test]
    fn error_window_expires_into_idle() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&raw(RawState::Failed), &mut cfg, 0);
        assert_eq!(s.display_state(), DisplayState::Error);

        assert!(s.poll(&mut cfg, 121_000));
        assert_eq!(s.display_state(), DisplayState::Idle);
        assert!(cfg.state_timeout_reached);
    }

    // ── Idle timeout / auto-off ───────────────────────────────

    #[test]
    fn idle_timeout_switches_to_auto_off() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        cfg.idle_timeout_enabled = true;
        cfg.idle_timeout_minutes = 1;

        s.ingest(&raw(RawState::Idle), &mut cfg, 0);
        assert_eq!(s.display_state(), DisplayState::Idle);

        assert!(!s.poll(&mut cfg, 59_000));
        assert!(s.poll(&mut cfg, 60_000));
        assert_eq!(s.display_state(), DisplayState::AutoOff);
    }

    #[test]
    fn auto_off_wakes_on_activity() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        cfg.idle_timeout_enabled = true;
        cfg.idle_timeout_minutes = 1;
        s.ingest(&raw(RawState::Idle), &mut cfg, 0);
        s.poll(&mut cfg, 60_000);
        assert_eq!(s.display_state(), DisplayState::AutoOff);

        s.ingest(&raw(RawState::Running), &mut cfg, 70_000);
        assert_eq!(s.display_state(), DisplayState::Printing);
    }

    #[test]
    fn auto_off_holds_while_idle() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        cfg.idle_timeout_enabled = true;
        cfg.idle_timeout_minutes = 1;
        s.ingest(&raw(RawState::Idle), &mut cfg, 0);
        s.poll(&mut cfg, 60_000);

        assert!(!s.ingest(&raw(RawState::Idle), &mut cfg, 90_000));
        assert_eq!(s.display_state(), DisplayState::AutoOff);
    }

    // ── Fallbacks ─────────────────────────────────────────────

    #[test]
    fn progress_without_raw_state_implies_printing() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        let d = TelemetryDelta {
            progress: Some(40),
            ..delta()
        };
        s.ingest(&d, &mut cfg, 1_000);
        assert_eq!(s.display_state(), DisplayState::Printing);
    }

    #[test]
    fn unknown_raw_state_defaults_to_idle() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&raw(RawState::Unknown), &mut cfg, 1_000);
        assert_eq!(s.display_state(), DisplayState::Idle);
    }

    #[test]
    fn disconnect_resets_inferred_state() {
        let mut s = PrinterRuntimeState::new();
        let mut cfg = settings();
        s.ingest(&nozzle(150, 200), &mut cfg, 0);
        s.ingest(&nozzle(160, 200), &mut cfg, 1_000);
        s.ingest(&nozzle(170, 200), &mut cfg, 2_000);
        assert!(s.is_heating());

        s.mark_disconnected(50_000);
        assert!(!s.is_connected());
        assert!(!s.is_heating());
        assert_eq!(s.display_state(), DisplayState::Unknown);
        assert_eq!(s.raw_state(), RawState::Unknown);
    }
}
