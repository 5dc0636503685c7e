//! Animation bookkeeping owned by the render loop.
//!
//! Every effect-local phase, cycle anchor, and the single-slot saved frame
//! live here as explicit fields. The engine is a singleton per strip, but
//! function-local statics would obscure ownership and block testing with
//! fixed clocks, so the state is carried in one owned aggregate instead.

use smart_leds::RGB8;

use crate::printer::DisplayState;

/// Small deterministic PRNG for sparkle timing and placement.
///
/// Plain xorshift32; animation jitter has no quality requirements, and a
/// seedable generator keeps effect tests reproducible.
#[derive(Debug, Clone)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0xBAD5_EED5 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform-ish value in `lo..hi`.
    pub fn range(&mut self, lo: u32, hi: u32) -> u32 {
        debug_assert!(lo < hi);
        lo + self.next_u32() % (hi - lo)
    }
}

/// The single-slot saved frame used for resume-after-toggle.
/// Capturing overwrites any previous snapshot — it is not a stack.
#[derive(Debug, Clone)]
pub struct SavedFrame {
    pub pixels: Vec<RGB8>,
    pub state: DisplayState,
    /// Progress (or download progress) at capture time; 0 for
    /// non-progress states.
    pub progress: u8,
    pub captured_at_ms: u64,
}

/// Phase of the lights on/off toggle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightsTransition {
    Inactive,
    TurningOff { started_ms: u64 },
    TurningOn { started_ms: u64 },
}

/// Traveling sparkle state for the idle ambient effect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdleSparkle {
    pub last_spawn_ms: u64,
    pub gap_ms: u64,
    pub active: bool,
    pub started_ms: u64,
}

/// All animation-local state, owned by [`LedRenderer`](super::LedRenderer)
/// and only ever touched from the render loop.
#[derive(Debug, Clone)]
pub struct AnimationContext {
    // Frame pacing.
    pub(crate) last_update_ms: u64,
    pub(crate) last_rainbow_ms: u64,

    // Rainbow cycle.
    pub(crate) rainbow_offset: i16,

    // Idle ambient phases.
    pub(crate) wave_phase: f32,
    pub(crate) breath_phase: f32,
    pub(crate) sparkle_phase: f32,
    pub(crate) idle_sparkle: IdleSparkle,

    // Moving-head cycle anchors for the progress bars.
    pub(crate) print_last_progress: u8,
    pub(crate) print_cycle_start_ms: u64,
    pub(crate) download_last_progress: u8,
    pub(crate) download_cycle_start_ms: u64,

    // Single-slot snapshot and rainbow freeze for resume-after-toggle.
    pub(crate) saved: Option<SavedFrame>,
    pub(crate) rainbow_paused: bool,
    pub(crate) saved_rainbow_offset: i16,
    pub(crate) saved_rainbow_ms: u64,

    // Lights on/off toggle.
    pub(crate) transition: LightsTransition,

    pub(crate) rng: XorShift32,
}

impl AnimationContext {
    pub fn new(seed: u32) -> Self {
        let mut rng = XorShift32::new(seed);
        let first_gap = u64::from(rng.range(3_000, 5_000));
        Self {
            last_update_ms: 0,
            last_rainbow_ms: 0,
            rainbow_offset: 0,
            wave_phase: 0.0,
            breath_phase: 0.0,
            sparkle_phase: 0.0,
            idle_sparkle: IdleSparkle {
                last_spawn_ms: 0,
                gap_ms: first_gap,
                active: false,
                started_ms: 0,
            },
            print_last_progress: 0,
            print_cycle_start_ms: 0,
            download_last_progress: 0,
            download_cycle_start_ms: 0,
            saved: None,
            rainbow_paused: false,
            saved_rainbow_offset: 0,
            saved_rainbow_ms: 0,
            transition: LightsTransition::Inactive,
            rng,
        }
    }

    /// Whether a saved frame currently occupies the slot.
    pub fn has_saved_frame(&self) -> bool {
        self.saved.is_some()
    }

    pub fn rainbow_offset(&self) -> i16 {
        self.rainbow_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xorshift_is_deterministic() {
        let mut a = XorShift32::new(7);
        let mut b = XorShift32::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn xorshift_range_stays_in_bounds() {
        let mut rng = XorShift32::new(42);
        for _ in 0..1_000 {
            let v = rng.range(3_000, 5_000);
            assert!((3_000..5_000).contains(&v));
        }
    }

    #[test]
    fn zero_seed_is_replaced() {
        let mut rng = XorShift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn fresh_context_has_empty_slot() {
        let ctx = AnimationContext::new(1);
        assert!(!ctx.has_saved_frame());
        assert_eq!(ctx.transition, LightsTransition::Inactive);
        assert!((3_000..5_000).contains(&ctx.idle_sparkle.gap_ms));
    }
}
