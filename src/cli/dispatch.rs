use anyhow::Result;
use rampart::commands::run::RunOptions;
use rampart::commands::{plan, restore, run, Exit};
use rampart::completions::{generate_completions, Shell};
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::{Cli, Commands};

pub fn dispatch(command: Commands, interrupt: Arc<AtomicBool>) -> Result<Exit> {
    match command {
        Commands::Run {
            config,
            ssh_port,
            user,
            generate_keys,
            yes,
            dry_run,
            report_json,
            verbose,
        } => run::execute(
            RunOptions {
                config,
                ssh_port,
                user,
                generate_keys,
                yes,
                dry_run,
                report_json,
                verbose,
            },
            interrupt,
        ),
        Commands::Plan { config } => plan::execute(config).map(|()| Exit::Success),
        Commands::Restore {
            file,
            original,
            yes,
        } => restore::execute(file, original, yes).map(|()| Exit::Success),
        Commands::Completions { shell } => {
            let shell = Shell::from_str(&shell)?;
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate_completions(&mut cmd, shell, &mut std::io::stdout());
            Ok(Exit::Success)
        }
    }
}
