use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "idlewatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keeps hypridle's configuration in sync with power state"
)]
pub struct Args {
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        name = "lid-switch",
        about = "React once to a lid-close event (bind this in your compositor)"
    )]
    LidSwitch,

    #[command(
        name = "run-lock",
        about = "Run a lock command, guaranteeing a single live instance"
    )]
    RunLock {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    #[command(about = "Show the currently classified power state")]
    Status,
}
