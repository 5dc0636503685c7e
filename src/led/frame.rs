//! Frame buffer and pixel arithmetic.
//!
//! A [`Frame`] is one complete ordered sequence of per-pixel colours equal
//! in length to the configured strip size. Out-of-range accesses are
//! silent no-ops, mirroring how addressable strip drivers behave.

use smart_leds::RGB8;

use crate::config::{ColorSlot, LedSettings};

/// Owned, resizable pixel buffer keyed to the configured strip length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<RGB8>,
}

impl Frame {
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![RGB8::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// All pixels off.
    pub fn clear(&mut self) {
        self.pixels.fill(RGB8::default());
    }

    pub fn fill(&mut self, color: RGB8) {
        self.pixels.fill(color);
    }

    /// Set one pixel; out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, color: RGB8) {
        if let Some(px) = self.pixels.get_mut(index) {
            *px = color;
        }
    }

    /// Read one pixel; out-of-range reads return black.
    pub fn get(&self, index: usize) -> RGB8 {
        self.pixels.get(index).copied().unwrap_or_default()
    }

    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    /// Copy pixels from a saved buffer, bounded by the shorter of the two.
    pub fn copy_from(&mut self, source: &[RGB8]) {
        let n = self.pixels.len().min(source.len());
        self.pixels[..n].copy_from_slice(&source[..n]);
    }

    /// Reallocate for a new strip length. Only called between renders.
    pub fn resize(&mut self, len: usize) {
        self.pixels.resize(len, RGB8::default());
    }
}

// ── Pixel arithmetic ──────────────────────────────────────────

/// Scale one channel by a 0–255 brightness multiplier.
pub fn scale_channel(value: u8, brightness: u8) -> u8 {
    ((u16::from(value) * u16::from(brightness)) / 255) as u8
}

/// Scale a colour by a 0–255 brightness multiplier.
pub fn scale(color: RGB8, brightness: u8) -> RGB8 {
    if brightness == 255 {
        return color;
    }
    RGB8::new(
        scale_channel(color.r, brightness),
        scale_channel(color.g, brightness),
        scale_channel(color.b, brightness),
    )
}

/// Linear blend between two colours, `t` in 0.0–1.0.
pub fn blend(from: RGB8, to: RGB8, t: f32) -> RGB8 {
    let ch = |a: u8, b: u8| -> u8 {
        let a = f32::from(a);
        let b = f32::from(b);
        (a + (b - a) * t) as u8
    };
    RGB8::new(ch(from.r, to.r), ch(from.g, to.g), ch(from.b, to.b))
}

/// Add a white boost to a colour, saturating per channel.
pub fn boost(color: RGB8, amount: u8) -> RGB8 {
    RGB8::new(
        color.r.saturating_add(amount),
        color.g.saturating_add(amount),
        color.b.saturating_add(amount),
    )
}

/// The colour configured for a state slot, scaled by the brightness
/// multiplier currently in effect.
pub fn state_color(settings: &LedSettings, slot: ColorSlot) -> RGB8 {
    scale(settings.color(slot), settings.effective_brightness())
}

/// 256-step colour wheel: a 3-segment piecewise-linear hue ramp
/// (red→blue, blue→green, green→red) producing full-saturation colours.
pub fn wheel(pos: u8) -> RGB8 {
    let pos = 255 - pos;
    if pos < 85 {
        RGB8::new(255 - pos * 3, 0, pos * 3)
    } else if pos < 170 {
        let pos = pos - 85;
        RGB8::new(0, pos * 3, 255 - pos * 3)
    } else {
        let pos = pos - 170;
        RGB8::new(pos * 3, 255 - pos * 3, 0)
    }
}
