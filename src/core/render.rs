use std::fmt::Write;

use crate::config::ActionProfile;

const DEFAULT_SCREEN_RESUME: &str = "hyprctl dispatch dpms on";

/// Render the hypridle configuration for one action profile.
///
/// One `listener` block per enabled action; an absent (or zero) timeout
/// omits the block entirely. The lock command is not invoked directly:
/// hypridle gets a `run-lock` wrapper invocation so that at most one
/// lock process can ever be live, a guarantee hypridle itself does not
/// provide.
///
/// Output is byte-deterministic for a given input; the supervisor hangs
/// its checksum comparison off that.
pub fn render(profile: &ActionProfile, lock_command: &str, wrapper_exe: &str) -> String {
    let lock_cmd = wrapped_lock_command(lock_command, wrapper_exe);
    let screen_resume = profile
        .screenoff_resume_command
        .as_deref()
        .unwrap_or(DEFAULT_SCREEN_RESUME);

    let mut out = String::new();

    let _ = write!(
        out,
        "general {{\n    lock_cmd = {lock_cmd}\n    before_sleep_cmd = loginctl lock-session\n    after_sleep_cmd = {screen_resume}\n}}\n"
    );

    if let (Some(timeout), Some(command)) = (profile.dim_timeout, profile.dim_command.as_deref()) {
        let _ = write!(
            out,
            "\nlistener {{\n    timeout = {timeout}\n    on-timeout = {command}\n"
        );
        if let Some(resume) = profile.dim_resume_command.as_deref() {
            let _ = writeln!(out, "    on-resume = {resume}");
        }
        out.push_str("}\n");
    }

    if let Some(timeout) = profile.lock_timeout {
        let _ = write!(
            out,
            "\nlistener {{\n    timeout = {timeout}\n    on-timeout = {lock_cmd}\n}}\n"
        );
    }

    if let (Some(timeout), Some(command)) = (
        profile.screenoff_timeout,
        profile.screenoff_command.as_deref(),
    ) {
        let _ = write!(
            out,
            "\nlistener {{\n    timeout = {timeout}\n    on-timeout = {command}\n    on-resume = {screen_resume}\n}}\n"
        );
    }

    if let (Some(timeout), Some(command)) =
        (profile.suspend_timeout, profile.suspend_command.as_deref())
    {
        let _ = write!(
            out,
            "\nlistener {{\n    timeout = {timeout}\n    on-timeout = {command}\n}}\n"
        );
    }

    out
}

/// The lock invocation hypridle actually runs: our own binary mediates
/// via the lock guard so concurrent triggers collapse to one instance.
/// The exe path is quoted; install prefixes with spaces must not split.
pub fn wrapped_lock_command(lock_command: &str, wrapper_exe: &str) -> String {
    format!(
        "'{}' run-lock -- {lock_command}",
        crate::core::utils::escape_single_quotes(wrapper_exe)
    )
}
