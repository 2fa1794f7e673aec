use crate::core::events::{PowerReading, PowerState};

/// Thresholds that shape classification. Loaded once from user
/// configuration, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateThresholds {
    pub low_battery_percent: u8,
}

impl Default for StateThresholds {
    fn default() -> Self {
        Self {
            low_battery_percent: 20,
        }
    }
}

/// Map a raw reading to a power state.
///
/// Mains power always wins over battery percentage. A missing percentage
/// while on battery classifies as `OnBattery`: without a reading we cannot
/// assert low battery, so we fail open to the less disruptive state.
pub fn classify(reading: PowerReading, thresholds: StateThresholds) -> PowerState {
    if reading.on_ac {
        return PowerState::OnAC;
    }

    match reading.battery_percent {
        Some(pct) if pct <= thresholds.low_battery_percent => PowerState::LowBattery,
        _ => PowerState::OnBattery,
    }
}
