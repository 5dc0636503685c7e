//! Persisted LED strip configuration.
//!
//! All user-tunable parameters for the PrintGlow system. Values are edited
//! through the configuration surface (external), persisted via NVS, and
//! consumed read-only by the core every tick — with two exceptions: the
//! `state_timeout_reached` and `lights_off_override` flags, which the core
//! itself writes back through a deferred persist request.

use serde::{Deserialize, Serialize};
use smart_leds::RGB8;

/// Number of per-state colour slots.
pub const STATE_COLOR_SLOTS: usize = 8;

/// An RGB colour triple, each channel 0–255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to the strip pixel type.
    pub fn rgb8(self) -> RGB8 {
        RGB8::new(self.r, self.g, self.b)
    }
}

/// Index into the per-state colour table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum ColorSlot {
    Idle = 0,
    Printing = 1,
    Downloading = 2,
    Paused = 3,
    Error = 4,
    Heating = 5,
    Cooling = 6,
    Finished = 7,
}

/// Core system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedSettings {
    // --- Hardware ---
    /// Number of addressable pixels on the strip (1–300).
    pub led_count: u16,

    // --- Colours ---
    /// Per-state colours, indexed by [`ColorSlot`].
    pub colors: [Color; STATE_COLOR_SLOTS],

    // --- Animation directions (1 = normal, -1 = reversed) ---
    pub rainbow_direction: i8,
    pub idle_direction: i8,
    pub printing_direction: i8,
    pub download_direction: i8,

    // --- Brightness ---
    /// Global brightness multiplier (1–255).
    pub global_brightness: u8,
    /// Brightness multiplier used while night mode is enabled (1–255).
    pub night_brightness: u8,
    pub night_mode_enabled: bool,

    // --- Behaviour ---
    /// Suppress the cooling indication while a print is in progress
    /// (workaround for printers that pulse the bed heater mid-print).
    pub compatibility_mode: bool,

    // --- Idle timeout ---
    pub idle_timeout_enabled: bool,
    /// Minutes of continuous idle before the strip switches itself off (1–120).
    pub idle_timeout_minutes: u16,

    // --- Flags persisted across restarts, written back by the core ---
    /// A finish/error override ran to its deadline; keeps the strip idle
    /// across a power cycle until the printer reports a fresh state.
    pub state_timeout_reached: bool,
    /// The user switched the strip off; restored on boot.
    pub lights_off_override: bool,
}

impl Default for LedSettings {
    fn default() -> Self {
        Self {
            led_count: 60,
            colors: [
                Color::new(0, 50, 0),     // idle
                Color::new(75, 0, 130),   // printing
                Color::new(0, 0, 255),    // downloading
                Color::new(255, 255, 0),  // paused
                Color::new(255, 0, 0),    // error
                Color::new(255, 100, 0),  // heating
                Color::new(0, 255, 255),  // cooling
                Color::new(0, 255, 0),    // finished
            ],
            rainbow_direction: 1,
            idle_direction: 1,
            printing_direction: 1,
            download_direction: 1,
            global_brightness: 255,
            night_brightness: 25,
            night_mode_enabled: false,
            compatibility_mode: false,
            idle_timeout_enabled: false,
            idle_timeout_minutes: 5,
            state_timeout_reached: false,
            lights_off_override: false,
        }
    }
}

impl LedSettings {
    /// The brightness multiplier in effect right now.
    pub fn effective_brightness(&self) -> u8 {
        if self.night_mode_enabled {
            self.night_brightness
        } else {
            self.global_brightness
        }
    }

    /// Raw (unscaled) colour for a state slot.
    pub fn color(&self, slot: ColorSlot) -> RGB8 {
        self.colors[slot as usize].rgb8()
    }

    /// Idle-timeout deadline in milliseconds.
    pub fn idle_timeout_ms(&self) -> u64 {
        u64::from(self.idle_timeout_minutes) * 60_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let s = LedSettings::default();
        assert!((1..=300).contains(&s.led_count));
        assert!(s.global_brightness >= 1);
        assert!(s.night_brightness >= 1);
        assert!((1..=120).contains(&s.idle_timeout_minutes));
        assert_eq!(s.rainbow_direction.abs(), 1);
        assert_eq!(s.printing_direction.abs(), 1);
        assert!(!s.state_timeout_reached);
        assert!(!s.lights_off_override);
    }

    #[test]
    fn effective_brightness_tracks_night_mode() {
        let mut s = LedSettings::default();
        assert_eq!(s.effective_brightness(), 255);
        s.night_mode_enabled = true;
        assert_eq!(s.effective_brightness(), 25);
    }

    #[test]
    fn color_slots_match_table_order() {
        let s = LedSettings::default();
        assert_eq!(s.color(ColorSlot::Idle), RGB8::new(0, 50, 0));
        assert_eq!(s.color(ColorSlot::Error), RGB8::new(255, 0, 0));
        assert_eq!(s.color(ColorSlot::Finished), RGB8::new(0, 255, 0));
    }

    #[test]
    fn serde_roundtrip() {
        let s = LedSettings::default();
        let json = serde_json::to_string(&s).unwrap();
        let s2: LedSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, s2);
    }

    #[test]
    fn postcard_roundtrip() {
        let s = LedSettings::default();
        let bytes = postcard::to_allocvec(&s).unwrap();
        let s2: LedSettings = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(s, s2);
    }
}
