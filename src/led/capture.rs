//! Single-slot frame capture, the resume policy, and the lights toggle.
//!
//! Switching the strip off captures the live frame; switching it back on
//! either resumes from that snapshot (if the printer is still showing
//! materially the same thing) or reveals the new state fresh. Both
//! directions run a 1 s eased radial mask from the strip edges; the
//! persisted `lights_off_override` flag is committed only when the
//! transition completes.

use log::{info, warn};
use smart_leds::RGB8;

use super::animations::{LedRenderer, LightsCommit, RenderOutcome, MAX_LED_COUNT};
use super::context::{LightsTransition, SavedFrame};
use super::frame;
use crate::config::{ColorSlot, LedSettings};
use crate::error::CaptureError;
use crate::printer::{DisplayState, StatusSnapshot};

/// Duration of the lights on/off reveal.
const LIGHTS_TRANSITION_MS: u64 = 1_000;

impl LedRenderer {
    // ── Capture / resume ──────────────────────────────────────

    /// Snapshot the live frame into the single slot, overwriting any
    /// previous snapshot. If the printer is currently disconnected the
    /// rainbow offset is frozen alongside so the cycle can resume where
    /// it left off.
    pub fn capture(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        now_ms: u64,
    ) -> Result<(), CaptureError> {
        if settings.led_count == 0 || settings.led_count > MAX_LED_COUNT {
            return Err(CaptureError::LedCountOutOfRange(settings.led_count));
        }

        let mut pixels: Vec<RGB8> = Vec::new();
        pixels
            .try_reserve_exact(self.frame.len())
            .map_err(|_| CaptureError::OutOfMemory)?;
        pixels.extend_from_slice(self.frame.pixels());

        let progress = match snap.display_state {
            DisplayState::Printing => snap.progress,
            DisplayState::Downloading => snap.download_progress,
            _ => 0,
        };

        if snap.is_disconnected() {
            self.ctx.saved_rainbow_offset = self.ctx.rainbow_offset;
            self.ctx.saved_rainbow_ms = self.ctx.last_rainbow_ms;
            self.ctx.rainbow_paused = true;
            info!("rainbow paused at offset {}", self.ctx.saved_rainbow_offset);
        } else {
            self.ctx.rainbow_paused = false;
        }

        info!(
            "frame captured: state={}, progress={}%, pixels={}",
            snap.display_state.as_str(),
            progress,
            pixels.len()
        );
        self.ctx.saved = Some(SavedFrame {
            pixels,
            state: snap.display_state,
            progress,
            captured_at_ms: now_ms,
        });
        Ok(())
    }

    /// Whether the saved snapshot is still a valid continuation of what
    /// the strip should show now.
    ///
    /// Resume is allowed when the frozen rainbow is still applicable, or
    /// the state is unchanged and — for progress-bearing states — the
    /// progress moved by at most 5 points. Anything else starts fresh.
    pub fn should_resume(&self, snap: &StatusSnapshot) -> bool {
        let Some(saved) = &self.ctx.saved else {
            return false;
        };

        if self.ctx.rainbow_paused && snap.is_disconnected() {
            return true;
        }

        let same_state = saved.state == snap.display_state;
        if same_state && saved.state.is_progress_state() {
            let current = if saved.state == DisplayState::Printing {
                snap.progress
            } else {
                snap.download_progress
            };
            let diff = (i16::from(current) - i16::from(saved.progress)).abs();
            return diff <= 5;
        }

        same_state
    }

    // ── Lights toggle ─────────────────────────────────────────

    /// Start the lights-off transition: capture the live frame, then
    /// shrink the visible band from the edges inward.
    pub fn begin_lights_off(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        now_ms: u64,
    ) {
        if let Err(e) = self.capture(snap, settings, now_ms) {
            warn!("frame capture skipped: {e}");
        }
        self.ctx.transition = LightsTransition::TurningOff { started_ms: now_ms };
        info!("lights off transition started");
    }

    /// Start the lights-on transition: grow the visible band from the
    /// middle outward, blending toward the current state.
    pub fn begin_lights_on(&mut self, now_ms: u64) {
        self.ctx.transition = LightsTransition::TurningOn { started_ms: now_ms };
        info!("lights on transition started");
    }

    /// True while a toggle transition is running.
    pub fn lights_transition_active(&self) -> bool {
        self.ctx.transition != LightsTransition::Inactive
    }

    /// Render one step of the toggle transition. At 100% the persisted
    /// flag commit is reported and the frame is left as-is.
    pub(crate) fn render_lights_transition(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        now_ms: u64,
    ) -> RenderOutcome {
        let (started_ms, turning_off) = match self.ctx.transition {
            LightsTransition::TurningOff { started_ms } => (started_ms, true),
            LightsTransition::TurningOn { started_ms } => (started_ms, false),
            LightsTransition::Inactive => return RenderOutcome::default(),
        };

        let elapsed = now_ms.saturating_sub(started_ms);
        let progress = elapsed as f32 / LIGHTS_TRANSITION_MS as f32;

        if progress >= 1.0 {
            self.ctx.transition = LightsTransition::Inactive;
            let commit = if turning_off {
                info!("lights off transition complete");
                LightsCommit::Off
            } else {
                info!("lights on transition complete");
                LightsCommit::On
            };
            return RenderOutcome {
                frame_updated: false,
                lights_commit: Some(commit),
            };
        }

        let eased = 1.0 - (1.0 - progress).powi(3);
        let total = self.frame.len();
        let middle = total / 2;
        let mask_radius = (eased * (total as f32 / 2.0)) as usize;

        if turning_off {
            self.render_off_step(snap, settings, middle, mask_radius);
        } else {
            self.render_on_step(snap, settings, eased, middle, mask_radius);
        }

        RenderOutcome {
            frame_updated: true,
            lights_commit: None,
        }
    }

    /// Shrinking band: the captured frame with a growing dark margin.
    fn render_off_step(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        middle: usize,
        mask_radius: usize,
    ) {
        let total = self.frame.len();

        if let Some(saved) = &self.ctx.saved {
            self.frame.copy_from(&saved.pixels);
        } else {
            // No snapshot to shrink; fall back to a solid state colour.
            self.frame.clear();
            if !snap.is_disconnected() {
                let color = match snap.display_state {
                    DisplayState::Idle => frame::state_color(settings, ColorSlot::Idle),
                    DisplayState::Printing => frame::state_color(settings, ColorSlot::Printing),
                    DisplayState::Downloading => {
                        frame::state_color(settings, ColorSlot::Downloading)
                    }
                    _ => RGB8::new(255, 255, 255),
                };
                self.frame.fill(color);
            }
        }

        for i in 0..mask_radius {
            let left = i;
            let right = total - 1 - i;
            if left < middle {
                self.frame.set(left, RGB8::default());
            }
            if right >= middle {
                self.frame.set(right, RGB8::default());
            }
        }
    }

    /// Growing band: blend the snapshot toward the freshly generated
    /// current frame, or reveal the state colour when resume is refused.
    fn render_on_step(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        eased: f32,
        middle: usize,
        mask_radius: usize,
    ) {
        let total = self.frame.len();
        self.frame.clear();

        if self.should_resume(snap) && self.ctx.saved.is_some() {
            if self.ctx.rainbow_paused && snap.is_disconnected() {
                self.ctx.rainbow_offset = self.ctx.saved_rainbow_offset;
                self.ctx.last_rainbow_ms = self.ctx.saved_rainbow_ms;
                self.ctx.rainbow_paused = false;
                info!("rainbow state restored: offset={}", self.ctx.rainbow_offset);
            }

            let current = self.state_frame(snap, settings);
            if let Some(saved) = &self.ctx.saved {
                let n = total.min(saved.pixels.len()).min(current.len());
                for i in 0..n {
                    let blended = frame::blend(saved.pixels[i], current[i], eased);
                    self.frame.set(i, blended);
                }
            }

            // Mask everything outside the revealed band.
            for i in mask_radius..middle {
                let right = middle + i;
                if let Some(left) = middle.checked_sub(i + 1) {
                    self.frame.set(left, RGB8::default());
                }
                if right < total {
                    self.frame.set(right, RGB8::default());
                }
            }
        } else {
            let color = if snap.is_disconnected() {
                RGB8::new(255, 255, 255)
            } else {
                match snap.display_state {
                    DisplayState::Idle => frame::state_color(settings, ColorSlot::Idle),
                    DisplayState::Printing => frame::state_color(settings, ColorSlot::Printing),
                    DisplayState::Downloading => {
                        frame::state_color(settings, ColorSlot::Downloading)
                    }
                    DisplayState::Paused => frame::state_color(settings, ColorSlot::Paused),
                    DisplayState::Error => frame::state_color(settings, ColorSlot::Error),
                    DisplayState::Heating => frame::state_color(settings, ColorSlot::Heating),
                    DisplayState::Cooling => frame::state_color(settings, ColorSlot::Cooling),
                    DisplayState::Finished => frame::state_color(settings, ColorSlot::Finished),
                    _ => RGB8::new(255, 255, 255),
                }
            };

            for i in 0..mask_radius {
                let right = middle + i;
                if let Some(left) = middle.checked_sub(i + 1) {
                    self.frame.set(left, color);
                }
                if right < total {
                    self.frame.set(right, color);
                }
            }
        }
    }
}
