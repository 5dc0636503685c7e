#![allow(dead_code)] // Referenced by the ESP-IDF binary only

//! GPIO / peripheral pin assignments for the PrintGlow board.
//!
//! Single source of truth — the binary references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// LED strip (WS2812B, RMT-driven)
// ---------------------------------------------------------------------------

/// Data line for the addressable strip.
pub const LED_STRIP_DATA_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// User button (active-low with external pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button: short press toggles the lights.
pub const BUTTON_GPIO: i32 = 16;
