use std::path::Path;
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::events::PowerReading;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Read current power-supply facts straight from sysfs.
///
/// This is the polling fallback for the event monitor and the direct
/// source for the one-shot lid-switch path. A machine with no battery
/// and no readable mains supply reads as on AC.
pub fn read_power_reading() -> PowerReading {
    read_power_reading_from(Path::new(POWER_SUPPLY_ROOT))
}

pub fn read_power_reading_from(root: &Path) -> PowerReading {
    let mut mains_online: Option<bool> = None;
    let mut battery_percent: Option<u8> = None;

    let entries = match std::fs::read_dir(root) {
        Ok(e) => e,
        Err(_) => {
            return PowerReading {
                on_ac: true,
                battery_percent: None,
            };
        }
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        let kind = match std::fs::read_to_string(dir.join("type")) {
            Ok(s) => s,
            Err(_) => continue,
        };

        match kind.trim() {
            "Mains" => {
                if let Ok(online) = std::fs::read_to_string(dir.join("online")) {
                    let plugged = online.trim() == "1";
                    mains_online = Some(mains_online.unwrap_or(false) || plugged);
                }
            }
            "Battery" => {
                if battery_percent.is_none() {
                    if let Ok(cap) = std::fs::read_to_string(dir.join("capacity")) {
                        battery_percent = cap.trim().parse::<u8>().ok().map(|p| p.min(100));
                    }
                }
            }
            _ => {}
        }
    }

    // No battery at all: treat as a desktop on mains.
    if battery_percent.is_none() && mains_online.is_none() {
        return PowerReading {
            on_ac: true,
            battery_percent: None,
        };
    }

    PowerReading {
        on_ac: mains_online.unwrap_or(false),
        battery_percent,
    }
}

/// Fire-and-forget shell command, output discarded.
///
/// Nothing else ever waits on this child, so a background thread reaps
/// it; dropping the handle unwaited would leave a zombie for the
/// daemon's lifetime.
pub fn run_shell_command_silent(command: &str) -> std::io::Result<()> {
    let mut child = std::process::Command::new("sh")
        .arg("-lc")
        .arg(command)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    std::thread::spawn(move || {
        let _ = child.wait();
    });

    Ok(())
}

/// Quote argv elements back into a single shell command string, so
/// arguments with spaces or quotes survive the round-trip through
/// `sh -lc`.
pub fn shell_join(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| format!("'{}'", escape_single_quotes(p)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a shell command and wait for it, reporting success.
pub fn run_shell_command_status(command: &str) -> std::io::Result<bool> {
    let status = std::process::Command::new("sh")
        .arg("-lc")
        .arg(command)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(status.success())
}

pub fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn supply(root: &Path, name: &str, kind: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("type"), kind).unwrap();
        for (file, contents) in files {
            fs::write(dir.join(file), contents).unwrap();
        }
    }

    #[test]
    fn reads_mains_and_battery() {
        let tmp = tempfile::tempdir().unwrap();
        supply(tmp.path(), "AC0", "Mains", &[("online", "1\n")]);
        supply(tmp.path(), "BAT0", "Battery", &[("capacity", "42\n")]);

        let r = read_power_reading_from(tmp.path());
        assert!(r.on_ac);
        assert_eq!(r.battery_percent, Some(42));
    }

    #[test]
    fn unplugged_with_battery() {
        let tmp = tempfile::tempdir().unwrap();
        supply(tmp.path(), "AC0", "Mains", &[("online", "0\n")]);
        supply(tmp.path(), "BAT0", "Battery", &[("capacity", "17\n")]);

        let r = read_power_reading_from(tmp.path());
        assert!(!r.on_ac);
        assert_eq!(r.battery_percent, Some(17));
    }

    #[test]
    fn no_supplies_reads_as_ac() {
        let tmp = tempfile::tempdir().unwrap();
        let r = read_power_reading_from(tmp.path());
        assert!(r.on_ac);
        assert_eq!(r.battery_percent, None);
    }

    /// Children of this process currently in zombie state, per
    /// /proc/<pid>/stat (field 3 = state, field 4 = ppid, counted
    /// after the parenthesized comm).
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return 0;
        };

        let mut count = 0;
        for entry in entries.flatten() {
            let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            let Some(rest) = stat.rfind(')').map(|i| &stat[i + 1..]) else {
                continue;
            };
            let mut fields = rest.split_whitespace();
            let state = fields.next();
            let ppid = fields.next();
            if state == Some("Z") && ppid == Some(me.as_str()) {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn silent_command_child_is_reaped() {
        run_shell_command_silent("true").unwrap();

        // The reaper runs on its own thread; give it a moment.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while zombie_children() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        assert_eq!(zombie_children(), 0, "spawned child was never reaped");
    }

    #[test]
    fn shell_join_preserves_spaced_arguments() {
        let parts: Vec<String> = ["swaylock", "-c", "a b c"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(shell_join(&parts), "'swaylock' '-c' 'a b c'");
    }

    #[test]
    fn shell_join_escapes_single_quotes() {
        let parts: Vec<String> = vec!["echo".to_string(), "it's".to_string()];
        assert_eq!(shell_join(&parts), r"'echo' 'it'\''s'");
    }

    #[test]
    fn capacity_clamped_to_100() {
        let tmp = tempfile::tempdir().unwrap();
        supply(tmp.path(), "BAT0", "Battery", &[("capacity", "103\n")]);

        let r = read_power_reading_from(tmp.path());
        assert_eq!(r.battery_percent, Some(100));
    }
}
