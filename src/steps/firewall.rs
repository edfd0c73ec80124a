use std::path::PathBuf;
use tracing::{info, warn};

use super::{current_ssh_ports, HardeningStep, Host};
use crate::models::{Criticality, RunContext, StepOutcome};

/// Default-deny inbound firewall with ufw.
///
/// Both the chosen SSH port and the ports sshd listens on today are
/// allowed, since the daemon only moves later (and may not move at all).
/// The firewall is only enabled once every one of those rules shows up in
/// `ufw show added`; enabling it without them would cut off the session
/// running this tool.
pub struct Firewall {
    extra_allow: Vec<String>,
    sshd_config: PathBuf,
}

impl Firewall {
    pub fn new(extra_allow: Vec<String>, sshd_config: PathBuf) -> Self {
        Self {
            extra_allow,
            sshd_config,
        }
    }

    /// Target port first, then the current ones
    fn ssh_ports(&self, ctx: &RunContext, host: &Host) -> Vec<u16> {
        let mut ports = vec![ctx.ssh_port()];
        for port in current_ssh_ports(host.fs, &self.sshd_config) {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
        ports
    }
}

/// Whether `ufw show added` output contains an allow rule for `port`
fn has_allow_rule(added: &str, port: u16) -> bool {
    let tcp = format!("{port}/tcp");
    let bare = port.to_string();
    added.lines().any(|line| {
        let mut words = line.split_whitespace().skip_while(|w| *w != "allow");
        words.next().is_some() && words.next().is_some_and(|w| w == tcp || w == bare)
    })
}

impl HardeningStep for Firewall {
    fn name(&self) -> &'static str {
        "firewall"
    }

    fn criticality(&self) -> Criticality {
        Criticality::FatalOnFailure
    }

    fn confirmation_prompt(&self, ctx: &RunContext) -> String {
        format!(
            "Configure the firewall (deny incoming, allow SSH on port {})?",
            ctx.ssh_port()
        )
    }

    fn run(&self, ctx: &RunContext, host: &Host) -> StepOutcome {
        let ports = self.ssh_ports(ctx, host);
        let ssh_rules: Vec<String> = ports.iter().map(|port| format!("{port}/tcp")).collect();

        let mut commands: Vec<Vec<&str>> = vec![
            vec!["apt-get", "-y", "install", "ufw"],
            vec!["ufw", "default", "deny", "incoming"],
            vec!["ufw", "default", "allow", "outgoing"],
        ];
        commands.extend(ssh_rules.iter().map(|rule| vec!["ufw", "allow", rule.as_str()]));
        commands.extend(self.extra_allow.iter().map(|rule| vec!["ufw", "allow", rule.as_str()]));

        for cmd in &commands {
            let result = if cmd[0] == "apt-get" {
                host.exec_package(cmd)
            } else {
                host.exec(cmd)
            };
            if let Err(reason) = result {
                return StepOutcome::failed(reason);
            }
        }

        if host.dry_run {
            info!("dry run: not checking ufw rules");
        } else {
            let added = match host.exec(&["ufw", "show", "added"]) {
                Ok(output) => output.stdout,
                Err(reason) => return StepOutcome::failed(reason),
            };
            if let Some(&port) = ports.iter().find(|&&port| !has_allow_rule(&added, port)) {
                warn!(port, "SSH rule missing, leaving firewall disabled");
                return StepOutcome::failed(format!(
                    "no ufw rule allows {port}/tcp; firewall left disabled to keep SSH reachable"
                ));
            }
        }

        match host.exec(&["ufw", "--force", "enable"]) {
            Ok(_) => StepOutcome::Succeeded,
            Err(reason) => StepOutcome::failed(reason),
        }
    }
}
