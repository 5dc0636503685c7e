//! Shared access to the printer runtime state.
//!
//! Telemetry arrives asynchronously from the network layer while the render
//! loop runs on its own cadence; a single mutex serialises the two. The
//! lock is held only for field updates and snapshot copies — never across
//! a render tick, a persistence write, or any I/O. Persist requests raised
//! under the lock are drained and serviced outside it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::state::{PrinterRuntimeState, StatusSnapshot};
use super::TelemetryDelta;
use crate::config::LedSettings;

/// Telemetry silence after which the printer counts as disconnected.
const CONNECTION_TIMEOUT_MS: u64 = 45_000;

struct MonitorInner {
    state: PrinterRuntimeState,
    settings: LedSettings,
    persist_pending: bool,
}

/// Mutex-guarded owner of [`PrinterRuntimeState`] and the live settings.
///
/// Cloneable handle (`Arc` inside); the network layer keeps one for
/// `ingest`, the driver loop keeps one for everything else.
#[derive(Clone)]
pub struct PrinterMonitor {
    inner: Arc<Mutex<MonitorInner>>,
}

impl PrinterMonitor {
    pub fn new(settings: LedSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                state: PrinterRuntimeState::new(),
                settings,
                persist_pending: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        // A panic while holding the lock leaves plain data, not a broken
        // invariant; recover the guard and continue.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Telemetry entry point (network callback) ──────────────

    /// Apply one telemetry delta. Returns `true` if anything changed.
    pub fn ingest(&self, delta: &TelemetryDelta, now_ms: u64) -> bool {
        let mut inner = self.lock();
        let inner = &mut *inner;
        let changed = inner.state.ingest(delta, &mut inner.settings, now_ms);
        inner.persist_pending |= inner.state.take_settings_dirty();
        changed
    }

    // ── Driver loop entry points ──────────────────────────────

    /// Let the wall-clock timers fire without fresh telemetry.
    pub fn poll(&self, now_ms: u64) -> bool {
        let mut inner = self.lock();
        let inner = &mut *inner;
        let changed = inner.state.poll(&mut inner.settings, now_ms);
        inner.persist_pending |= inner.state.take_settings_dirty();
        changed
    }

    /// Mark the printer disconnected after prolonged telemetry silence.
    /// Returns `true` if the connection state flipped.
    pub fn check_connection_timeout(&self, now_ms: u64) -> bool {
        let mut inner = self.lock();
        if inner.state.is_connected()
            && now_ms.saturating_sub(inner.state.last_telemetry_ms()) > CONNECTION_TIMEOUT_MS
        {
            inner.state.mark_disconnected(now_ms);
            return true;
        }
        false
    }

    /// Copy out everything the renderer needs in one lock acquisition.
    pub fn snapshot(&self) -> (StatusSnapshot, LedSettings) {
        let inner = self.lock();
        (inner.state.snapshot(), inner.settings.clone())
    }

    pub fn settings(&self) -> LedSettings {
        self.lock().settings.clone()
    }

    // ── Settings mutation (configuration surface / lights toggle) ──

    /// Replace the live settings (already validated at the configuration
    /// boundary) and queue a persist.
    pub fn update_settings(&self, settings: LedSettings) {
        let mut inner = self.lock();
        inner.settings = settings;
        inner.persist_pending = true;
    }

    /// Commit the lights-off override flag at the end of a toggle
    /// transition and queue a persist.
    pub fn set_lights_off_override(&self, off: bool) {
        let mut inner = self.lock();
        if inner.settings.lights_off_override != off {
            inner.settings.lights_off_override = off;
            inner.persist_pending = true;
        }
    }

    /// Drain the pending persist request, if any. The caller performs the
    /// actual write outside the lock.
    pub fn take_persist_request(&self) -> Option<LedSettings> {
        let mut inner = self.lock();
        if inner.persist_pending {
            inner.persist_pending = false;
            Some(inner.settings.clone())
        } else {
            None
        }
    }
}
