//! Per-state frame rendering.
//!
//! One renderer function per display state, all driven by caller-supplied
//! milliseconds and honouring the active brightness multiplier. Channel
//! values are 0–255 throughout.
//!
//! | state | effect |
//! |---|---|
//! | printing / downloading | progress bar with a moving white head |
//! | paused / finished | whole-strip breathing (finished adds sparkles) |
//! | error | square-wave blink |
//! | recoverable error | alternating paused/error colour |
//! | heating / cooling | traveling multi-wave gradient |
//! | idle | multi-wave shimmer with a traveling sparkle |
//! | auto-off | dark |
//! | disconnected / unknown | rainbow cycle |

use core::f32::consts::PI;

use smart_leds::RGB8;

use super::context::{AnimationContext, LightsTransition};
use super::frame::{self, Frame};
use crate::config::{ColorSlot, LedSettings};
use crate::printer::{DisplayState, StatusSnapshot};

/// Minimum spacing between standard animation frames.
pub(crate) const ANIMATION_INTERVAL_MS: u64 = 50;
/// Minimum spacing between rainbow steps.
pub(crate) const RAINBOW_INTERVAL_MS: u64 = 20;
/// Hard bound applied to `led_count` in buffer-sizing code.
pub(crate) const MAX_LED_COUNT: u16 = 1_000;

/// Persisted-flag commit produced when a lights toggle transition
/// completes. The caller writes the flag back and persists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightsCommit {
    /// Lights-off transition finished; `lights_off_override` becomes true.
    Off,
    /// Lights-on transition finished; `lights_off_override` becomes false.
    On,
}

/// What one render tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOutcome {
    /// The frame changed and should be pushed to the strip.
    pub frame_updated: bool,
    /// A lights toggle transition just completed.
    pub lights_commit: Option<LightsCommit>,
}

/// The animation engine: owns the live frame and all effect state.
pub struct LedRenderer {
    pub(crate) ctx: AnimationContext,
    pub(crate) frame: Frame,
}

impl LedRenderer {
    pub fn new(seed: u32) -> Self {
        Self {
            ctx: AnimationContext::new(seed),
            frame: Frame::new(0),
        }
    }

    /// The most recently rendered frame.
    pub fn frame(&self) -> &[RGB8] {
        self.frame.pixels()
    }

    pub fn context(&self) -> &AnimationContext {
        &self.ctx
    }

    /// Produce the next frame for the current status.
    ///
    /// Rate limiting happens inside (50 ms for standard states, 20 ms for
    /// the rainbow), so the driver loop may tick faster without speeding
    /// the animations up; `frame_updated` says whether the strip needs a
    /// refresh.
    pub fn render(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        now_ms: u64,
    ) -> RenderOutcome {
        self.ensure_frame(settings);

        if self.ctx.transition != LightsTransition::Inactive {
            return self.render_lights_transition(snap, settings, now_ms);
        }

        if settings.lights_off_override {
            self.frame.clear();
            return RenderOutcome {
                frame_updated: true,
                lights_commit: None,
            };
        }

        if snap.is_disconnected() {
            return RenderOutcome {
                frame_updated: self.render_rainbow(settings, now_ms),
                lights_commit: None,
            };
        }

        if now_ms.saturating_sub(self.ctx.last_update_ms) < ANIMATION_INTERVAL_MS {
            return RenderOutcome::default();
        }
        self.ctx.last_update_ms = now_ms;

        self.frame.clear();
        match snap.display_state {
            DisplayState::AutoOff => {} // stays dark
            DisplayState::Downloading => self.render_download_progress(snap, settings, now_ms),
            DisplayState::Printing => self.render_printing_progress(snap, settings, now_ms),
            DisplayState::Paused => self.render_paused(settings, now_ms),
            DisplayState::RecoverableError => self.render_recoverable_error(settings, now_ms),
            DisplayState::Error => self.render_error(settings, now_ms),
            DisplayState::Heating => self.render_heating(settings, now_ms),
            DisplayState::Cooling => self.render_cooling(settings, now_ms),
            DisplayState::Finished => self.render_finished(settings, now_ms),
            DisplayState::Idle => self.render_idle(settings, now_ms),
            DisplayState::Unknown => {
                // Unreachable through the disconnected check above; keep
                // the strip dark rather than guessing.
            }
        }

        RenderOutcome {
            frame_updated: true,
            lights_commit: None,
        }
    }

    /// Reallocate the frame when the configured strip length changes.
    fn ensure_frame(&mut self, settings: &LedSettings) {
        let count = usize::from(settings.led_count.clamp(1, MAX_LED_COUNT));
        if self.frame.len() != count {
            self.frame.resize(count);
        }
    }

    // ── Progress bars ─────────────────────────────────────────

    fn render_download_progress(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        now_ms: u64,
    ) {
        let count = self.frame.len();
        let progress = snap.download_progress;
        let lit = progress_pixels(progress, count);

        // Re-anchor the head cycle when progress moves.
        if progress != self.ctx.download_last_progress {
            if lit > 0 {
                let elapsed = cycle_elapsed(self.ctx.download_cycle_start_ms, now_ms);
                if self.ctx.download_cycle_start_ms == 0 || elapsed >= lit as u64 * 80 {
                    self.ctx.download_cycle_start_ms = now_ms;
                }
            } else {
                self.ctx.download_cycle_start_ms = 0;
            }
            self.ctx.download_last_progress = progress;
        }

        let dir = settings.download_direction;
        let color = frame::state_color(settings, ColorSlot::Downloading);
        for i in 0..lit {
            self.frame.set(mirror(i, count, dir), color);
        }

        if lit > 0 {
            let brightness = settings.effective_brightness();
            if let Some(head) = head_position(lit, self.ctx.download_cycle_start_ms, now_ms) {
                let led = if dir > 0 {
                    head
                } else {
                    (count - lit) + (lit - 1 - head)
                };
                self.frame.set(led, RGB8::new(brightness, brightness, brightness));
            }
        }

        // Long bars get two low-amplitude moving sparkles.
        if lit > 5 {
            let brightness = settings.effective_brightness();
            let s1 = (now_ms / 200) as usize % lit;
            let s2 = ((now_ms / 300) as usize + 10) % lit;
            let b1 = frame::scale_channel(150, brightness);
            let b2 = frame::scale_channel(100, brightness);
            let blue = frame::scale_channel(255, brightness);
            self.frame.set(mirror(s1, count, dir), RGB8::new(b1, b1, blue));
            self.frame.set(mirror(s2, count, dir), RGB8::new(b2, b2, blue));
        }
    }

    fn render_printing_progress(
        &mut self,
        snap: &StatusSnapshot,
        settings: &LedSettings,
        now_ms: u64,
    ) {
        let count = self.frame.len();
        let progress = snap.progress;

        let exact = f32::from(progress) / 100.0 * count as f32;
        let full = (exact as usize).min(count);
        let partial = exact - full as f32;
        let lit = full + usize::from(partial > 0.5);

        if progress != self.ctx.print_last_progress {
            if lit > 0 {
                let elapsed = cycle_elapsed(self.ctx.print_cycle_start_ms, now_ms);
                if self.ctx.print_cycle_start_ms == 0 || elapsed >= lit as u64 * 80 {
                    self.ctx.print_cycle_start_ms = now_ms;
                }
            } else {
                self.ctx.print_cycle_start_ms = 0;
            }
            self.ctx.print_last_progress = progress;
        }

        let dir = settings.printing_direction;
        let color = frame::state_color(settings, ColorSlot::Printing);
        for i in 0..count {
            let led = mirror(i, count, dir);
            if i < full {
                self.frame.set(led, color);
            } else if i == full && partial > 0.0 {
                // Fractional trailing pixel.
                let px = RGB8::new(
                    (f32::from(color.r) * partial) as u8,
                    (f32::from(color.g) * partial) as u8,
                    (f32::from(color.b) * partial) as u8,
                );
                self.frame.set(led, px);
            } else {
                self.frame.set(led, RGB8::default());
            }
        }

        if full > 0 {
            if let Some(head) = head_position(lit, self.ctx.print_cycle_start_ms, now_ms) {
                let led = if dir > 0 {
                    head
                } else {
                    (count - lit) + (lit - 1 - head)
                };
                let brightness = settings.effective_brightness();
                self.frame.set(led, RGB8::new(brightness, brightness, brightness));
            }
        }
    }

    // ── Whole-strip effects ───────────────────────────────────

    fn render_paused(&mut self, settings: &LedSettings, now_ms: u64) {
        let level = breath_level(now_ms, 1_000);
        let color = frame::scale(frame::state_color(settings, ColorSlot::Paused), level);
        self.frame.fill(color);
    }

    fn render_finished(&mut self, settings: &LedSettings, now_ms: u64) {
        let level = breath_level(now_ms, 2_000);
        let color = frame::scale(frame::state_color(settings, ColorSlot::Finished), level);
        self.frame.fill(color);

        // Roughly once a second, one random celebratory sparkle.
        if (now_ms / 100) % 10 == 0 {
            let count = self.frame.len();
            let pos = self.ctx.rng.range(0, count as u32) as usize;
            let b = settings.effective_brightness();
            self.frame.set(pos, RGB8::new(b, b, b));
        }
    }

    fn render_error(&mut self, settings: &LedSettings, now_ms: u64) {
        let on = (now_ms / 250) % 2 == 1;
        if on {
            self.frame.fill(frame::state_color(settings, ColorSlot::Error));
        }
    }

    fn render_recoverable_error(&mut self, settings: &LedSettings, now_ms: u64) {
        let slot = if now_ms % 1_000 < 500 {
            ColorSlot::Paused
        } else {
            ColorSlot::Error
        };
        self.frame.fill(frame::state_color(settings, slot));
    }

    // ── Thermal gradients ─────────────────────────────────────

    fn render_heating(&mut self, settings: &LedSettings, now_ms: u64) {
        let count = self.frame.len();
        let base = frame::state_color(settings, ColorSlot::Heating);
        let scroll = now_ms as f32 / 1_000.0 * 2.0;

        for i in 0..count {
            let x = i as f32;
            let wave1 = (x * 0.35 - scroll * 3.0).sin() * 0.5 + 0.5;
            let wave2 = (x * 0.5 - scroll * 4.5).sin() * 0.3 + 0.4;
            let buildup = (x * 0.2 - scroll * 2.0).sin() * 0.2 + 0.8;
            let combined = wave1 * 0.5 + wave2 * 0.4 + buildup * 0.1;
            let level = (combined * 255.0).min(255.0) as u8;

            let position = x / count as f32;
            let r = frame::scale_channel(base.r, level);
            let g = (f32::from(frame::scale_channel(base.g, level)) * (1.0 - 0.3 * position)) as u8;
            let b = frame::scale_channel(base.b, level);
            self.frame.set(i, RGB8::new(r, g, b));
        }
    }

    fn render_cooling(&mut self, settings: &LedSettings, now_ms: u64) {
        let count = self.frame.len();
        let base = frame::state_color(settings, ColorSlot::Cooling);
        // The cooling gradient always flows toward the strip start.
        let t = now_ms as f32 / 1_000.0 * -1.0;

        for i in 0..count {
            let x = (count - 1 - i) as f32;
            let wave1 = (x * 0.25 + t * 2.5).sin() * 0.5 + 0.5;
            let wave2 = (x * 0.4 + t * 3.5).sin() * 0.3 + 0.3;
            let drop = (x * 0.15 + t * 1.5).sin() * 0.2 + 0.8;
            let combined = wave1 * 0.6 + wave2 * 0.3 + drop * 0.1;
            let level = (combined * 255.0).min(255.0) as u8;

            let position = i as f32 / count as f32;
            let r = frame::scale_channel(base.r, level);
            let g = (f32::from(frame::scale_channel(base.g, level)) * (0.7 + 0.3 * position)) as u8;
            let b = frame::scale_channel(base.b, level);
            self.frame.set(i, RGB8::new(r, g, b));
        }
    }

    // ── Idle ambient ──────────────────────────────────────────

    fn render_idle(&mut self, settings: &LedSettings, now_ms: u64) {
        let count = self.frame.len();
        let base = frame::state_color(settings, ColorSlot::Idle);
        let dir = settings.idle_direction;

        self.ctx.wave_phase += 0.08 * f32::from(dir);
        self.ctx.breath_phase += 0.02;
        self.ctx.sparkle_phase += 0.05;

        let global_breath = self.ctx.breath_phase.sin() * 0.15 + 0.85;

        for i in 0..count {
            let position = i as f32 / count as f32;

            let wave1 = (position * 6.28 + self.ctx.wave_phase).sin() * 0.5 + 0.5;
            let wave2 = (position * 12.56 + self.ctx.wave_phase * 1.3).sin() * 0.3 + 0.3;
            let wave3 = (position * 18.84 + self.ctx.sparkle_phase * 2.0).sin() * 0.2 + 0.2;

            let intensity = (wave1 * 0.6 + wave2 * 0.3 + wave3 * 0.1) * global_breath;
            let gradient = (position * PI).sin() * 0.2 + 0.8;

            let mut r = (f32::from(base.r) * intensity * gradient) as u8;
            let mut g = (f32::from(base.g) * intensity * gradient) as u8;
            let mut b = (f32::from(base.b) * intensity * gradient) as u8;

            // Crests get a white highlight.
            if intensity > 0.8 {
                let highlight = (intensity - 0.8) * 5.0;
                let lift = (highlight * 40.0) as u8;
                r = r.saturating_add(lift);
                g = g.saturating_add(lift);
                b = b.saturating_add(lift);
            }

            self.frame.set(i, RGB8::new(r, g, b));
        }

        self.render_idle_sparkle(base, settings, dir, now_ms);
    }

    /// A sparkle spawns every 3–5 s, travels end-to-end over 2 s with a
    /// sine intensity envelope, and leaves a 3-pixel decaying trail built
    /// from whatever colour is already in the frame (additive, not
    /// overwrite).
    fn render_idle_sparkle(&mut self, base: RGB8, settings: &LedSettings, dir: i8, now_ms: u64) {
        let count = self.frame.len();
        let sparkle = &mut self.ctx.idle_sparkle;

        if now_ms.saturating_sub(sparkle.last_spawn_ms) > sparkle.gap_ms {
            sparkle.last_spawn_ms = now_ms;
            sparkle.started_ms = now_ms;
            sparkle.active = true;
            sparkle.gap_ms = u64::from(self.ctx.rng.range(3_000, 5_000));
        }

        if !self.ctx.idle_sparkle.active {
            return;
        }

        let age = now_ms.saturating_sub(self.ctx.idle_sparkle.started_ms);
        if age >= 2_000 {
            self.ctx.idle_sparkle.active = false;
            return;
        }

        let progress = age as f32 / 2_000.0;
        let travel = if dir > 0 {
            progress * count as f32
        } else {
            (1.0 - progress) * count as f32
        };
        let center = travel as usize;
        let intensity = (progress * PI).sin() * 0.8 + 0.2;
        let brightness_factor = f32::from(settings.effective_brightness()) / 255.0;

        if center < count {
            let lift = (intensity * 100.0 * brightness_factor) as u8;
            self.frame.set(center, frame::boost(base, lift));
        }

        for trail in 1..=3i32 {
            let pos = center as i32 - trail * i32::from(dir);
            if pos >= 0 && (pos as usize) < count {
                let trail_intensity = intensity / (trail + 1) as f32;
                let lift = (trail_intensity * 50.0 * brightness_factor) as u8;
                let existing = self.frame.get(pos as usize);
                self.frame.set(pos as usize, frame::boost(existing, lift));
            }
        }
    }

    // ── Rainbow fallback ──────────────────────────────────────

    /// Advance the rainbow cycle by one step if its interval elapsed.
    /// Returns whether the frame was refreshed.
    pub(crate) fn render_rainbow(&mut self, settings: &LedSettings, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.ctx.last_rainbow_ms) < RAINBOW_INTERVAL_MS {
            return false;
        }
        self.ctx.last_rainbow_ms = now_ms;

        let count = self.frame.len();
        let brightness = settings.effective_brightness();
        let dir = i32::from(settings.rainbow_direction);
        let offset = i32::from(self.ctx.rainbow_offset);

        for i in 0..count {
            let pos = ((i as i32 * dir + offset * dir) & 255) as u8;
            self.frame.set(i, frame::scale(frame::wheel(pos), brightness));
        }

        self.ctx.rainbow_offset += i16::from(settings.rainbow_direction);
        if self.ctx.rainbow_offset >= 256 || self.ctx.rainbow_offset < 0 {
            self.ctx.rainbow_offset = if dir > 0 { 0 } else { 255 };
        }
        true
    }

    /// Generate the static representation of a state without touching any
    /// live animation bookkeeping. Used as the blend target while the
    /// lights turn back on.
    pub fn state_frame(&self, snap: &StatusSnapshot, settings: &LedSettings) -> Vec<RGB8> {
        let count = usize::from(settings.led_count.clamp(1, MAX_LED_COUNT));
        let mut pixels = vec![RGB8::default(); count];

        if snap.is_disconnected() {
            let brightness = settings.effective_brightness();
            let dir = i32::from(settings.rainbow_direction);
            let offset = i32::from(self.ctx.rainbow_offset);
            for (i, px) in pixels.iter_mut().enumerate() {
                let pos = ((i as i32 * dir + offset * dir) & 255) as u8;
                *px = frame::scale(frame::wheel(pos), brightness);
            }
            return pixels;
        }

        match snap.display_state {
            DisplayState::Printing => {
                let lit = progress_pixels(snap.progress, count);
                let color = frame::state_color(settings, ColorSlot::Printing);
                for i in 0..lit {
                    pixels[mirror(i, count, settings.printing_direction)] = color;
                }
            }
            DisplayState::Downloading => {
                let lit = progress_pixels(snap.download_progress, count);
                let color = frame::state_color(settings, ColorSlot::Downloading);
                for i in 0..lit {
                    pixels[mirror(i, count, settings.download_direction)] = color;
                }
            }
            DisplayState::Heating => {
                pixels.fill(frame::state_color(settings, ColorSlot::Heating));
            }
            DisplayState::Cooling => {
                pixels.fill(frame::state_color(settings, ColorSlot::Cooling));
            }
            other => {
                let slot = match other {
                    DisplayState::Paused => ColorSlot::Paused,
                    DisplayState::Error | DisplayState::RecoverableError => ColorSlot::Error,
                    DisplayState::Finished => ColorSlot::Finished,
                    _ => ColorSlot::Idle,
                };
                pixels.fill(frame::state_color(settings, slot));
            }
        }

        pixels
    }
}

// ── Shared math ───────────────────────────────────────────────

/// Map a direction flag over the strip: forward leaves indices alone,
/// reverse mirrors the whole strip.
pub(crate) fn mirror(index: usize, count: usize, direction: i8) -> usize {
    if direction > 0 {
        index
    } else {
        count - 1 - index
    }
}

/// Number of lit pixels for a progress percentage.
pub(crate) fn progress_pixels(progress: u8, count: usize) -> usize {
    (usize::from(progress) * count / 100).min(count)
}

/// Milliseconds per pixel for the moving head; slower on long bars,
/// clamped to 30–80.
pub(crate) fn head_speed(lit: usize) -> u64 {
    (80i64 - lit as i64).clamp(30, 80) as u64
}

/// Full head cycle period: one traversal plus a rest gap.
pub(crate) fn head_cycle_period(lit: usize) -> u64 {
    lit as u64 * head_speed(lit) + 2_500
}

/// Where the head currently is, or `None` during the rest gap.
fn head_position(lit: usize, cycle_start_ms: u64, now_ms: u64) -> Option<usize> {
    if lit == 0 {
        return None;
    }
    let speed = head_speed(lit);
    let period = head_cycle_period(lit);
    let time_in_cycle = if cycle_start_ms > 0 {
        now_ms.saturating_sub(cycle_start_ms) % period
    } else {
        0
    };
    let movement = lit as u64 * speed;
    if time_in_cycle < movement {
        Some((time_in_cycle / speed) as usize % lit)
    } else {
        None
    }
}

fn cycle_elapsed(cycle_start_ms: u64, now_ms: u64) -> u64 {
    if cycle_start_ms > 0 {
        now_ms.saturating_sub(cycle_start_ms)
    } else {
        0
    }
}

/// Sinusoidal breathing level for a full-strip fade.
/// `period_ms` is the named period; the divisor is half of it.
fn breath_level(now_ms: u64, period_ms: u64) -> u8 {
    let divisor = (period_ms / 2) as f32;
    (((now_ms as f32 / divisor).sin() + 1.0) * 127.0) as u8
}
