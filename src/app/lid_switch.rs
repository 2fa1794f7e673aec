use eyre::{Result, eyre};

use crate::cli::Args;
use crate::core::classify;
use crate::core::utils;
use crate::iinfo;

/// One-shot lid-close reaction, invoked by an external binding (e.g. a
/// Hyprland `bindl` on the lid switch). Reads power status directly
/// rather than from the daemon, classifies it and runs the configured
/// command for that state synchronously.
///
/// No config regeneration, no restart. A state with no configured
/// command is a silent, successful no-op.
pub fn run(args: &Args) -> Result<i32> {
    let config_path = match args.config.as_deref() {
        Some(p) => p.to_path_buf(),
        None => crate::config::resolve_default_config_path()?,
    };
    let settings = crate::config::load_from_path(&config_path)?;

    let reading = utils::read_power_reading();
    let state = classify::classify(reading, settings.thresholds);

    match settings.lid.command_for(state) {
        Some(command) => {
            iinfo!("lid", "lid closed on {state}, running: {command}");
            if utils::run_shell_command_status(command)? {
                Ok(0)
            } else {
                Err(eyre!("lid command `{command}` exited with failure"))
            }
        }
        None => {
            iinfo!("lid", "lid closed on {state}, no command configured");
            Ok(0)
        }
    }
}
