use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr, eyre};
use ini::Ini;

use crate::core::classify::StateThresholds;
use crate::core::events::PowerState;

pub const DEFAULT_LOCK_COMMAND: &str = "hyprlock";
pub const DEFAULT_HYPRIDLE_COMMAND: &str = "hypridle";
const DEFAULT_NOTIFICATION_TIMEOUT_MS: u32 = 5000;
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Idle actions for one power state. A `None` timeout disables the
/// action; a configured timeout of 0 counts as disabled too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionProfile {
    pub dim_timeout: Option<u32>,
    pub dim_command: Option<String>,
    pub dim_resume_command: Option<String>,

    pub lock_timeout: Option<u32>,

    pub screenoff_timeout: Option<u32>,
    pub screenoff_command: Option<String>,
    pub screenoff_resume_command: Option<String>,

    pub suspend_timeout: Option<u32>,
    pub suspend_command: Option<String>,
}

/// Lid-close commands, one per power state. Absent = no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LidProfile {
    pub on_ac_command: Option<String>,
    pub on_battery_command: Option<String>,
    pub low_battery_command: Option<String>,
}

impl LidProfile {
    pub fn command_for(&self, state: PowerState) -> Option<&str> {
        match state {
            PowerState::OnAC => self.on_ac_command.as_deref(),
            PowerState::OnBattery => self.on_battery_command.as_deref(),
            PowerState::LowBattery => self.low_battery_command.as_deref(),
        }
    }
}

/// Everything loaded from the user's INI file. Immutable after load.
#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: StateThresholds,
    pub lock_command: String,
    pub hypridle_config_path: PathBuf,
    pub hypridle_command: String,
    pub systemd_unit: Option<String>,
    pub enable_notifications: bool,
    pub notification_timeout_ms: u32,
    pub debounce_ms: u64,
    pub poll_interval_secs: u64,

    pub on_ac: ActionProfile,
    pub on_battery: ActionProfile,
    pub low_battery: ActionProfile,

    pub lid: LidProfile,
}

impl Settings {
    pub fn profile_for(&self, state: PowerState) -> &ActionProfile {
        match state {
            PowerState::OnAC => &self.on_ac,
            PowerState::OnBattery => &self.on_battery,
            PowerState::LowBattery => &self.low_battery,
        }
    }
}

/// Determine the default config path: user config first, then system.
pub fn resolve_default_config_path() -> Result<PathBuf> {
    if let Some(mut path) = dirs::home_dir() {
        path.push(".config/idlewatch/config.ini");
        if path.exists() {
            return Ok(path);
        }
    }

    let system_path = PathBuf::from("/etc/idlewatch/config.ini");
    if system_path.exists() {
        return Ok(system_path);
    }

    Err(eyre!(
        "no configuration found (expected ~/.config/idlewatch/config.ini or /etc/idlewatch/config.ini)"
    ))
}

pub fn load_from_path(path: &Path) -> Result<Settings> {
    let ini = Ini::load_from_file(path)
        .wrap_err_with(|| format!("failed to read configuration {}", path.display()))?;
    parse(&ini).wrap_err_with(|| format!("invalid configuration {}", path.display()))
}

fn parse(ini: &Ini) -> Result<Settings> {
    let general = ini.section(Some("general"));

    let get = |key: &str| -> Option<String> {
        general
            .and_then(|s| s.get(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let low_battery_percent = match get("low_battery_percentage") {
        Some(raw) => raw
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| eyre!("general.low_battery_percentage must be an integer 0..=100"))?,
        None => StateThresholds::default().low_battery_percent,
    };

    let hypridle_config_path = get("hypridle_config_path")
        .map(|p| expand_home(&p))
        .ok_or_else(|| eyre!("general.hypridle_config_path is required"))?;

    let enable_notifications = match get("enable_notifications") {
        Some(raw) => parse_bool(&raw)
            .ok_or_else(|| eyre!("general.enable_notifications must be true or false"))?,
        None => true,
    };

    let notification_timeout_ms = parse_opt_int::<u32>(
        get("notification_timeout").as_deref(),
        "general.notification_timeout",
    )?
    .unwrap_or(DEFAULT_NOTIFICATION_TIMEOUT_MS);

    let debounce_ms = parse_opt_int::<u64>(get("debounce_ms").as_deref(), "general.debounce_ms")?
        .unwrap_or(DEFAULT_DEBOUNCE_MS);

    let poll_interval_secs = parse_opt_int::<u64>(
        get("poll_interval_secs").as_deref(),
        "general.poll_interval_secs",
    )?
    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
    .max(1);

    let settings = Settings {
        thresholds: StateThresholds { low_battery_percent },
        lock_command: get("lock_command").unwrap_or_else(|| DEFAULT_LOCK_COMMAND.to_string()),
        hypridle_config_path,
        hypridle_command: get("hypridle_command")
            .unwrap_or_else(|| DEFAULT_HYPRIDLE_COMMAND.to_string()),
        systemd_unit: get("systemd_unit"),
        enable_notifications,
        notification_timeout_ms,
        debounce_ms,
        poll_interval_secs,
        on_ac: parse_profile(ini, PowerState::OnAC.section())?,
        on_battery: parse_profile(ini, PowerState::OnBattery.section())?,
        low_battery: parse_profile(ini, PowerState::LowBattery.section())?,
        lid: parse_lid(ini),
    };

    Ok(settings)
}

fn parse_profile(ini: &Ini, section: &str) -> Result<ActionProfile> {
    let Some(props) = ini.section(Some(section)) else {
        // A missing state section means every action is disabled there.
        return Ok(ActionProfile::default());
    };

    let get = |key: &str| -> Option<String> {
        props
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let timeout = |key: &str| -> Result<Option<u32>> {
        let v = parse_opt_int::<u32>(get(key).as_deref(), &format!("{section}.{key}"))?;
        Ok(v.filter(|t| *t > 0))
    };

    let profile = ActionProfile {
        dim_timeout: timeout("dim_timeout")?,
        dim_command: get("dim_command"),
        dim_resume_command: get("dim_resume_command"),
        lock_timeout: timeout("lock_timeout")?,
        screenoff_timeout: timeout("screenoff_timeout")?,
        screenoff_command: get("screenoff_command"),
        screenoff_resume_command: get("screenoff_resume_command"),
        suspend_timeout: timeout("suspend_timeout")?,
        suspend_command: get("suspend_command"),
    };

    // Running with an enabled action but no command would generate a
    // broken listener block, so refuse at startup.
    if profile.dim_timeout.is_some() && profile.dim_command.is_none() {
        return Err(eyre!("{section}.dim_timeout is set but dim_command is missing"));
    }
    if profile.screenoff_timeout.is_some() && profile.screenoff_command.is_none() {
        return Err(eyre!(
            "{section}.screenoff_timeout is set but screenoff_command is missing"
        ));
    }
    if profile.suspend_timeout.is_some() && profile.suspend_command.is_none() {
        return Err(eyre!(
            "{section}.suspend_timeout is set but suspend_command is missing"
        ));
    }

    Ok(profile)
}

fn parse_lid(ini: &Ini) -> LidProfile {
    let Some(props) = ini.section(Some("lid_switch")) else {
        return LidProfile::default();
    };

    let get = |key: &str| -> Option<String> {
        props
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    LidProfile {
        on_ac_command: get("on_ac_command"),
        on_battery_command: get("on_battery_command"),
        low_battery_command: get("low_battery_command"),
    }
}

fn parse_opt_int<T: std::str::FromStr>(raw: Option<&str>, key: &str) -> Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| eyre!("{key} must be a non-negative integer")),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(contents: &str) -> Result<Settings> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        load_from_path(file.path())
    }

    const MINIMAL: &str = "\
[general]
hypridle_config_path = /tmp/hypridle.conf
";

    #[test]
    fn minimal_config_uses_defaults() {
        let s = load_str(MINIMAL).unwrap();
        assert_eq!(s.thresholds.low_battery_percent, 20);
        assert_eq!(s.lock_command, "hyprlock");
        assert_eq!(s.hypridle_command, "hypridle");
        assert!(s.enable_notifications);
        assert_eq!(s.debounce_ms, 500);
        assert_eq!(s.on_ac, ActionProfile::default());
        assert_eq!(s.lid.command_for(PowerState::OnAC), None);
    }

    #[test]
    fn missing_config_path_is_fatal() {
        assert!(load_str("[general]\nlock_command = swaylock\n").is_err());
    }

    #[test]
    fn malformed_threshold_is_fatal() {
        let cfg = "[general]\nhypridle_config_path = /tmp/h.conf\nlow_battery_percentage = lots\n";
        assert!(load_str(cfg).is_err());
    }

    #[test]
    fn enabled_action_without_command_is_fatal() {
        let cfg = "\
[general]
hypridle_config_path = /tmp/h.conf

[on_battery]
dim_timeout = 60
";
        assert!(load_str(cfg).is_err());
    }

    #[test]
    fn zero_timeout_disables_action() {
        let cfg = "\
[general]
hypridle_config_path = /tmp/h.conf

[on_ac]
dim_timeout = 0
dim_command = brightnessctl set 10%
";
        let s = load_str(cfg).unwrap();
        assert_eq!(s.on_ac.dim_timeout, None);
    }

    #[test]
    fn full_profile_parses() {
        let cfg = "\
[general]
hypridle_config_path = /tmp/h.conf
low_battery_percentage = 25
lock_command = swaylock -f

[low_battery]
dim_timeout = 30
dim_command = brightnessctl -s set 10%
dim_resume_command = brightnessctl -r
lock_timeout = 120
screenoff_timeout = 180
screenoff_command = hyprctl dispatch dpms off
screenoff_resume_command = hyprctl dispatch dpms on
suspend_timeout = 300
suspend_command = systemctl suspend

[lid_switch]
on_ac_command = hyprctl dispatch dpms off
low_battery_command = systemctl suspend
";
        let s = load_str(cfg).unwrap();
        assert_eq!(s.thresholds.low_battery_percent, 25);
        assert_eq!(s.lock_command, "swaylock -f");

        let p = s.profile_for(PowerState::LowBattery);
        assert_eq!(p.dim_timeout, Some(30));
        assert_eq!(p.lock_timeout, Some(120));
        assert_eq!(p.screenoff_timeout, Some(180));
        assert_eq!(p.suspend_timeout, Some(300));
        assert_eq!(p.suspend_command.as_deref(), Some("systemctl suspend"));

        assert_eq!(
            s.lid.command_for(PowerState::LowBattery),
            Some("systemctl suspend")
        );
        assert_eq!(s.lid.command_for(PowerState::OnBattery), None);
    }
}
