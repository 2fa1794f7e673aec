use eyre::{Result, eyre};

use crate::cli::{Args, Command};
use crate::core::classify;
use crate::core::utils;
use crate::daemon::{LockGuard, LockOutcome};
use crate::iinfo;

/// Dispatch a one-shot subcommand. Returns the process exit code.
pub fn run(args: &Args, command: &Command) -> Result<i32> {
    match command {
        Command::LidSwitch => crate::app::lid_switch::run(args),
        Command::RunLock { command } => run_lock(command),
        Command::Status => status(args).map(|_| 0),
    }
}

/// Mediated lock-command launch: at most one instance system-wide. A
/// busy guard means the session is already locking; report and succeed.
/// Argv is re-quoted element by element so arguments carrying spaces or
/// quotes survive the trip back through the shell.
fn run_lock(command: &[String]) -> Result<i32> {
    if command.iter().all(|p| p.trim().is_empty()) {
        return Err(eyre!("run-lock: no command given"));
    }
    let command = utils::shell_join(command);

    match LockGuard::run_exclusive(&command)? {
        LockOutcome::Ran(code) => Ok(code),
        LockOutcome::AlreadyRunning => {
            iinfo!("lock", "lock command already running, not starting another");
            Ok(0)
        }
    }
}

fn status(args: &Args) -> Result<()> {
    let config_path = match args.config.as_deref() {
        Some(p) => p.to_path_buf(),
        None => crate::config::resolve_default_config_path()?,
    };
    let settings = crate::config::load_from_path(&config_path)?;

    let reading = utils::read_power_reading();
    let state = classify::classify(reading, settings.thresholds);

    println!("power state:      {state}");
    match reading.battery_percent {
        Some(pct) => println!("battery:          {pct}%"),
        None => println!("battery:          (no reading)"),
    }
    println!(
        "generated config: {}",
        settings.hypridle_config_path.display()
    );

    Ok(())
}
