//! Device configuration parameters
//!
//! All tunable timings for the SmartMed dispenser.
//! Values can be overridden via NVS (blob `syscfg` in the `smartmed` namespace).

use serde::{Deserialize, Serialize};

/// BLE advertised name, also used as the GAP device name.
pub const DEFAULT_DEVICE_NAME: &str = "SmartMed-ESP32";

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Link ---
    /// GAP device name (advertised).
    pub device_name: heapless::String<24>,

    // --- Timing ---
    /// Minimum spacing between scheduler scans (milliseconds)
    pub scheduler_interval_ms: u32,
    /// Main loop sleep between iterations (milliseconds)
    pub loop_interval_ms: u32,
    /// Lead time applied by `startNow` (milliseconds)
    pub start_now_lead_ms: u32,

    // --- Dispense cycle ---
    pub dispense: DispenseTiming,
}

/// Timings of one dispense-verify cycle.
///
/// A burst is `burst_ms` of motor drive, a drop window polled every
/// `drop_poll_ms` for `drop_window_ms`, then a pause polled every
/// `pause_poll_ms` for `pause_ms`.  The hand check runs `hand_cycles`
/// cycles of `hand_cycle_ms`, each made of cue periods
/// (`cue_on_ms` + `cue_off_ms`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseTiming {
    pub max_bursts: u32,
    pub burst_ms: u32,
    pub drop_window_ms: u32,
    pub drop_poll_ms: u32,
    pub pause_ms: u32,
    pub pause_poll_ms: u32,

    pub hand_cycles: u32,
    pub hand_cycle_ms: u32,
    pub cue_on_ms: u32,
    pub cue_off_ms: u32,

    /// Settle delay after a drop failure.
    pub fail_settle_ms: u32,
    /// Settle delay after a taken/missed outcome.
    pub outcome_settle_ms: u32,
}

impl DispenseTiming {
    /// Number of sensor polls in the post-burst drop window.
    pub fn drop_polls(&self) -> u32 {
        self.drop_window_ms / self.drop_poll_ms.max(1)
    }

    /// Number of sensor polls in the inter-burst pause.
    pub fn pause_polls(&self) -> u32 {
        self.pause_ms / self.pause_poll_ms.max(1)
    }

    /// Cue periods per hand-check cycle (at least one).
    pub fn cue_periods_per_cycle(&self) -> u32 {
        let period = (self.cue_on_ms + self.cue_off_ms).max(1);
        self.hand_cycle_ms.div_ceil(period).max(1)
    }

    /// Total cue periods before the hand check gives up.
    pub fn total_cue_periods(&self) -> u32 {
        self.cue_periods_per_cycle() * self.hand_cycles
    }
}

impl Default for DispenseTiming {
    fn default() -> Self {
        Self {
            max_bursts: 20,
            burst_ms: 50,
            drop_window_ms: 30,
            drop_poll_ms: 5,
            pause_ms: 150,
            pause_poll_ms: 10,

            hand_cycles: 2,
            hand_cycle_ms: 30_000,
            cue_on_ms: 300,
            cue_off_ms: 700,

            fail_settle_ms: 1500,
            outcome_settle_ms: 1200,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        // Fits: 14 bytes into 24.
        let _ = device_name.push_str(DEFAULT_DEVICE_NAME);
        Self {
            device_name,

            // Timing
            scheduler_interval_ms: 1500,
            loop_interval_ms: 10,
            start_now_lead_ms: 100,

            dispense: DispenseTiming::default(),
        }
    }
}
