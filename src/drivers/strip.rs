//! WS2812B strip driver.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-bangs the 800 kHz WS2812 protocol through the RMT
//! peripheral (one pulse pair per bit, GRB channel order).
//! On host/test: records frames in memory so the service layer can be
//! exercised end to end.

#[cfg(not(target_os = "espidf"))]
use smart_leds::RGB8;

#[cfg(not(target_os = "espidf"))]
use crate::app::ports::StripPort;
#[cfg(not(target_os = "espidf"))]
use crate::error::StripError;

// ---------------------------------------------------------------------------
// ESP-IDF implementation
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
mod esp {
    use core::time::Duration;

    use esp_idf_hal::gpio::OutputPin;
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::rmt::config::TransmitConfig;
    use esp_idf_hal::rmt::{PinState, Pulse, RmtChannel, TxRmtDriver, VariableLengthSignal};
    use log::info;
    use smart_leds::RGB8;

    use crate::app::ports::StripPort;
    use crate::error::StripError;

    // WS2812B bit timings (±150 ns tolerance per datasheet).
    const T0H_NS: u64 = 350;
    const T0L_NS: u64 = 800;
    const T1H_NS: u64 = 700;
    const T1L_NS: u64 = 600;

    /// RMT-driven WS2812B strip.
    pub struct Ws2812Strip<'d> {
        tx: TxRmtDriver<'d>,
        t0h: Pulse,
        t0l: Pulse,
        t1h: Pulse,
        t1l: Pulse,
    }

    impl<'d> Ws2812Strip<'d> {
        pub fn new(
            channel: impl Peripheral<P = impl RmtChannel> + 'd,
            pin: impl Peripheral<P = impl OutputPin> + 'd,
        ) -> Result<Self, StripError> {
            let config = TransmitConfig::new().clock_divider(1);
            let tx = TxRmtDriver::new(channel, pin, &config)
                .map_err(|_| StripError::WriteFailed)?;
            let ticks_hz = tx.counter_clock().map_err(|_| StripError::WriteFailed)?;

            let pulse = |state: PinState, ns: u64| {
                Pulse::new_with_duration(ticks_hz, state, &Duration::from_nanos(ns))
                    .map_err(|_| StripError::WriteFailed)
            };
            let strip = Self {
                t0h: pulse(PinState::High, T0H_NS)?,
                t0l: pulse(PinState::Low, T0L_NS)?,
                t1h: pulse(PinState::High, T1H_NS)?,
                t1l: pulse(PinState::Low, T1L_NS)?,
                tx,
            };
            info!("WS2812 strip driver ready (RMT)");
            Ok(strip)
        }
    }

    impl StripPort for Ws2812Strip<'_> {
        fn show(&mut self, frame: &[RGB8]) -> Result<(), StripError> {
            let mut signal = VariableLengthSignal::new();
            for px in frame {
                // GRB, most significant bit first.
                let word =
                    (u32::from(px.g) << 16) | (u32::from(px.r) << 8) | u32::from(px.b);
                for bit in (0..24).rev() {
                    if (word >> bit) & 1 == 1 {
                        signal
                            .push([&self.t1h, &self.t1l])
                            .map_err(|_| StripError::WriteFailed)?;
                    } else {
                        signal
                            .push([&self.t0h, &self.t0l])
                            .map_err(|_| StripError::WriteFailed)?;
                    }
                }
            }
            self.tx
                .start_blocking(&signal)
                .map_err(|_| StripError::WriteFailed)
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::Ws2812Strip;

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------

/// In-memory strip for host tests: records every shown frame.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimStrip {
    pub frames: Vec<Vec<RGB8>>,
}

#[cfg(not(target_os = "espidf"))]
impl SimStrip {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently shown frame, if any.
    pub fn last(&self) -> Option<&[RGB8]> {
        self.frames.last().map(Vec::as_slice)
    }
}

#[cfg(not(target_os = "espidf"))]
impl StripPort for SimStrip {
    fn show(&mut self, frame: &[RGB8]) -> Result<(), StripError> {
        self.frames.push(frame.to_vec());
        Ok(())
    }
}
