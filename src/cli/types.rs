use clap::{Parser, Subcommand};
use rampart::validation::{clap_port_validator, clap_username_validator};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "
   ┬─┐┌─┐┌┬┐┌─┐┌─┐┬─┐┌┬┐
   ├┬┘├─┤│││├─┘├─┤├┬┘ │
   ┴└─┴ ┴┴ ┴┴  ┴ ┴┴└─ ┴

{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}";

#[derive(Parser)]
#[command(name = "rampart")]
#[command(about = "Transactional hardening for a single Debian host", long_about = None)]
#[command(version)]
#[command(help_template = HELP_TEMPLATE)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harden this host, asking before each step
    Run {
        /// Configuration file (default: /etc/rampart/rampart.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port sshd should listen on
        #[arg(long, value_parser = clap_port_validator)]
        ssh_port: Option<u16>,

        /// Administrative user who keeps SSH access
        #[arg(short, long, value_parser = clap_username_validator)]
        user: Option<String>,

        /// Generate an ed25519 key pair for the admin user
        #[arg(long)]
        generate_keys: bool,

        /// Answer yes to every step and no to the reboot prompt (requires --user)
        #[arg(short, long)]
        yes: bool,

        /// Log commands and file writes instead of performing them
        #[arg(long)]
        dry_run: bool,

        /// Write the run summary as JSON to this path
        #[arg(long)]
        report_json: Option<PathBuf>,

        /// Debug logging on stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the ordered steps and the files they touch
    Plan {
        /// Configuration file (default: /etc/rampart/rampart.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Restore a configuration file from the copy kept by a previous run
    Restore {
        /// File to restore, e.g. /etc/ssh/sshd_config
        file: PathBuf,

        /// Use the copy taken the first time rampart touched the file
        #[arg(long)]
        original: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate shell completion script
    Completions {
        /// Shell to generate completions for (bash, zsh, fish)
        shell: String,
    },
}
