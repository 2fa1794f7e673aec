pub mod command;
pub mod daemon_mode;
pub mod lid_switch;
pub mod platform;
