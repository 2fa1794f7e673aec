mod app;
mod cli;
mod config;
mod core;
mod daemon;
mod log;
mod services;

use clap::Parser;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    log::set_verbose(args.verbose);

    let outcome = match args.command.clone() {
        Some(command) => app::command::run(&args, &command),
        None => app::daemon_mode::run(args).await.map(|_| 0),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("idlewatch: {e}");
            std::process::exit(1);
        }
    }
}
