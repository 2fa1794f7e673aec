use std::fmt;

/// Classified power source state. Exactly one is active at a time;
/// transitions are detected by identity comparison only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    OnAC,
    OnBattery,
    LowBattery,
}

impl PowerState {
    /// Config section name for this state.
    pub fn section(&self) -> &'static str {
        match self {
            PowerState::OnAC => "on_ac",
            PowerState::OnBattery => "on_battery",
            PowerState::LowBattery => "low_battery",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::OnAC => write!(f, "On AC"),
            PowerState::OnBattery => write!(f, "On Battery"),
            PowerState::LowBattery => write!(f, "Low Battery"),
        }
    }
}

/// Snapshot of raw power-supply facts. Produced fresh per monitored
/// event, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerReading {
    pub on_ac: bool,
    pub battery_percent: Option<u8>,
}

/// Messages feeding the daemon loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonMsg {
    Reading { reading: PowerReading, now_ms: u64 },
}
