mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rampart::commands::Exit;
use rampart::utils::{install_terminal_panic_hook, reset_terminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cli::{dispatch, Cli};

/// Exit status after a second Ctrl-C (128 + SIGINT)
const FORCED_EXIT: i32 = 130;

fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();

    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            reset_terminal();
            std::process::exit(FORCED_EXIT);
        }
        eprintln!(
            "\n{} finishing the current step, then stopping. Press Ctrl-C again to exit now.",
            "Interrupted:".yellow().bold()
        );
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(interrupted)
}

fn main() {
    install_terminal_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                Exit::Usage.code()
            } else {
                Exit::Success.code()
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let result = install_interrupt_handler().and_then(|flag| dispatch(cli.command, flag));
    match result {
        Ok(exit) => std::process::exit(exit.code()),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            std::process::exit(Exit::Failure.code());
        }
    }
}
