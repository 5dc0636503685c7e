//! Debounced user-button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switch with external pull-up. The GPIO fires on
//! the falling edge; the ISR records the raw timestamp into an atomic,
//! and `tick()` (called from the driver loop) runs the debounce and
//! press classification.
//!
//! | Gesture     | Condition        | Action (wired in `main`)        |
//! |-------------|------------------|---------------------------------|
//! | Short press | Release < 3s     | Toggle the lights               |
//! | Long press  | Hold >= 3s       | Reset settings to defaults      |

use core::sync::atomic::{AtomicU32, Ordering};

const DEBOUNCE_MS: u32 = 50;
const LONG_PRESS_MS: u32 = 3_000;

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
/// Written by the ISR, read by the driver loop.
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

/// Button events emitted after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
}

pub struct ButtonDriver {
    gpio: i32,
    state: PressState,
    last_isr_ms: u32,
}

impl ButtonDriver {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            state: PressState::Idle,
            last_isr_ms: 0,
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Call from the driver loop on every tick.
    /// Returns a classified press event, if any.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
        let new_press = isr_ms != self.last_isr_ms && isr_ms != 0;

        match self.state {
            PressState::Idle => {
                if new_press {
                    self.last_isr_ms = isr_ms;
                    self.state = PressState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            PressState::DebounceWait { since_ms } => {
                if now_ms.wrapping_sub(since_ms) >= DEBOUNCE_MS {
                    self.state = PressState::Pressed { since_ms: now_ms };
                }
                None
            }

            PressState::Pressed { since_ms } => {
                let held_ms = now_ms.wrapping_sub(since_ms);

                if held_ms >= LONG_PRESS_MS {
                    self.state = PressState::Idle;
                    return Some(ButtonEvent::LongPress);
                }

                if !Self::is_pressed_hw() && held_ms >= DEBOUNCE_MS {
                    self.state = PressState::Idle;
                    return Some(ButtonEvent::ShortPress);
                }

                None
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn is_pressed_hw() -> bool {
        // Active low: pressed reads 0.
        unsafe { esp_idf_svc::sys::gpio_get_level(crate::pins::BUTTON_GPIO) == 0 }
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_pressed_hw() -> bool {
        false
    }
}

/// ISR handler — register this on the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
#[allow(unused)]
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
}
