//! Rolling bus-load estimator (§4.2).

use crate::types::NOMINAL_BITRATE_BPS;
use crate::util::Timer;

const WINDOW_SIZE: usize = 100;
const SAMPLE_INTERVAL_MS: u32 = 100;
/// Multiplier approximating bit-stuffing overhead on the physical layer.
const STUFF_BIT_FACTOR: f32 = 1.2;

/// A 100-sample ring of per-100ms bit counts, used to estimate percentage
/// bus utilization against the nominal 250 kbit/s bitrate.
pub struct BusLoad {
    samples: [u32; WINDOW_SIZE],
    index: usize,
    filled: usize,
    accumulator_bits: u32,
    timer: Timer,
}

impl Default for BusLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl BusLoad {
    pub fn new() -> Self {
        let mut timer = Timer::new(SAMPLE_INTERVAL_MS, true);
        timer.start();
        BusLoad {
            samples: [0; WINDOW_SIZE],
            index: 0,
            filled: 0,
            accumulator_bits: 0,
            timer,
        }
    }

    /// Record one CAN frame crossing the wire (either direction).
    pub fn record_frame(&mut self, dlc: u8) {
        let bits = (67 + dlc as u32 * 8) as f32 * STUFF_BIT_FACTOR;
        self.accumulator_bits += bits as u32;
    }

    /// Advance the sampling window. Call once per `NetworkManager::update`.
    pub fn update(&mut self, elapsed_ms: u32) {
        if self.timer.update(elapsed_ms) {
            self.samples[self.index] = self.accumulator_bits;
            self.accumulator_bits = 0;
            self.index = (self.index + 1) % WINDOW_SIZE;
            self.filled = (self.filled + 1).min(WINDOW_SIZE);
        }
    }

    /// Percentage of nominal bandwidth consumed over the current window.
    pub fn load_percent(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        let total_bits: u32 = self.samples[..self.filled].iter().sum();
        let window_seconds = (self.filled as f32 * SAMPLE_INTERVAL_MS as f32) / 1000.0;
        if window_seconds <= 0.0 {
            return 0.0;
        }
        (total_bits as f32 / (window_seconds * NOMINAL_BITRATE_BPS as f32)) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_bus_reports_zero_load() {
        let mut bl = BusLoad::new();
        bl.update(100);
        assert_eq!(bl.load_percent(), 0.0);
    }

    #[test]
    fn busy_bus_reports_nonzero_load() {
        let mut bl = BusLoad::new();
        for _ in 0..50 {
            bl.record_frame(8);
        }
        bl.update(100);
        assert!(bl.load_percent() > 0.0);
    }
}
