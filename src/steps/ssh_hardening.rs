use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::{apply_block, restart_or_rollback, HardeningStep, Host, Target};
use crate::config::{PathsConfig, SshConfig};
use crate::fs::{read_to_string, FileSystem};
use crate::models::{Criticality, RunContext, StepOutcome};
use crate::process::argv;
use crate::transaction::{ManagedBlock, RewriteError, Validator};

/// sshd keeps the first value it reads for most keywords, and directives
/// after a `Match` line only apply to matching connections. The managed
/// block goes above the first `Include` (drop-ins would win otherwise) or
/// `Match`, whichever comes first.
pub const GLOBAL_SECTION_END: &str = r"(?i)^\s*(Include|Match)\s";

/// Port sshd listens on when `sshd_config` names none
const SSHD_DEFAULT_PORT: u16 = 22;

/// Ports named by active `Port` lines of the global section, in file order.
pub fn listening_ports(text: &str) -> Vec<u16> {
    let mut ports = Vec::new();
    for line in text.lines() {
        let mut words = line
            .split(|c: char| c.is_whitespace() || c == '=')
            .filter(|w| !w.is_empty());
        let Some(keyword) = words.next() else {
            continue;
        };
        if keyword.eq_ignore_ascii_case("match") {
            break;
        }
        if !keyword.eq_ignore_ascii_case("port") {
            continue;
        }
        if let Some(port) = words.next().and_then(|w| w.parse::<u16>().ok()) {
            if port != 0 && !ports.contains(&port) {
                ports.push(port);
            }
        }
    }
    if ports.is_empty() {
        ports.push(SSHD_DEFAULT_PORT);
    }
    ports
}

/// Ports the SSH daemon is configured to listen on right now
pub fn current_ssh_ports(fs: &dyn FileSystem, sshd_config: &Path) -> Vec<u16> {
    match read_to_string(fs, sshd_config) {
        Ok(text) => listening_ports(&text),
        Err(e) => {
            warn!(path = %sshd_config.display(), error = %e, "Cannot read sshd_config, assuming port 22");
            vec![SSHD_DEFAULT_PORT]
        }
    }
}

/// Rewrite `sshd_config`, check it with `sshd -t` and restart the daemon.
///
/// Once the daemon runs on the new port, the firewall rules for the ports
/// it left are removed unless they are listed in `kept_rules`.
pub struct SshHardening {
    ssh: SshConfig,
    paths: PathsConfig,
    validator_timeout: Duration,
    kept_rules: Vec<String>,
}

impl SshHardening {
    pub fn new(ssh: SshConfig, paths: PathsConfig, validator_timeout: Duration) -> Self {
        Self {
            ssh,
            paths,
            validator_timeout,
            kept_rules: Vec::new(),
        }
    }

    /// ufw rules the operator asked for explicitly; never removed
    pub fn with_kept_rules(mut self, rules: Vec<String>) -> Self {
        self.kept_rules = rules;
        self
    }

    /// Directives owned by this step. Earlier settings of the same keys,
    /// commented out or not, are removed from the file.
    pub fn block(&self, ctx: &RunContext) -> Result<ManagedBlock, RewriteError> {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };

        let mut block = ManagedBlock::new()
            .directive("Port", ctx.ssh_port())
            .directive("PermitRootLogin", &self.ssh.permit_root_login)
            .directive("PasswordAuthentication", yes_no(self.ssh.password_authentication))
            .directive("PermitEmptyPasswords", "no")
            .directive("KbdInteractiveAuthentication", "no")
            .strip_key("ChallengeResponseAuthentication")
            .directive("PubkeyAuthentication", "yes")
            .directive("MaxAuthTries", self.ssh.max_auth_tries)
            .directive("ClientAliveInterval", self.ssh.client_alive_interval)
            .directive("ClientAliveCountMax", self.ssh.client_alive_count_max)
            .directive("X11Forwarding", "no");

        if !self.ssh.allow_users.is_empty() {
            let mut users = vec![ctx.username().to_string()];
            for user in &self.ssh.allow_users {
                if !users.contains(user) {
                    users.push(user.clone());
                }
            }
            block = block.directive("AllowUsers", users.join(" "));
        }

        block.insert_before(GLOBAL_SECTION_END)
    }

    fn is_kept(&self, port: u16) -> bool {
        let tcp = format!("{port}/tcp");
        let bare = port.to_string();
        self.kept_rules.iter().any(|rule| *rule == tcp || *rule == bare)
    }

    /// Best effort: a stale rule left behind only keeps a closed port open
    fn close_previous_ports(&self, host: &Host, previous: &[u16], current: u16) {
        for &port in previous.iter().filter(|&&p| p != current && !self.is_kept(p)) {
            let rule = format!("{port}/tcp");
            match host.exec(&["ufw", "delete", "allow", rule.as_str()]) {
                Ok(_) => info!(port, "Removed firewall rule for previous SSH port"),
                Err(reason) => warn!(port, reason = %reason, "Could not remove firewall rule for previous SSH port"),
            }
        }
    }

    /// Disabling password logins without a usable key locks the admin out
    fn has_authorized_key(&self, ctx: &RunContext, host: &Host) -> bool {
        let path = self.paths.authorized_keys_of(ctx.username());
        match read_to_string(host.fs, &path) {
            Ok(text) => text.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read authorized_keys");
                false
            }
        }
    }
}

impl HardeningStep for SshHardening {
    fn name(&self) -> &'static str {
        "ssh-hardening"
    }

    fn criticality(&self) -> Criticality {
        Criticality::FatalOnFailure
    }

    fn confirmation_prompt(&self, ctx: &RunContext) -> String {
        format!(
            "Harden the SSH daemon (port {}, key-only login for {})?",
            ctx.ssh_port(),
            ctx.username()
        )
    }

    fn run(&self, ctx: &RunContext, host: &Host) -> StepOutcome {
        if !self.ssh.password_authentication
            && self.ssh.require_authorized_keys
            && !self.has_authorized_key(ctx, host)
        {
            return StepOutcome::skipped(format!(
                "{} has no authorized SSH key; password login left enabled",
                ctx.username()
            ));
        }

        let block = match self.block(ctx) {
            Ok(block) => block,
            Err(e) => return StepOutcome::failed(e.to_string()),
        };
        let validator = Validator::command(argv(["sshd", "-t", "-f", "{path}"]))
            .with_timeout(self.validator_timeout);

        let previous = current_ssh_ports(host.fs, &self.paths.sshd_config);
        let mut tx = match apply_block(
            host,
            &self.paths.sshd_config,
            Target::Existing,
            &block,
            &validator,
        ) {
            Ok(tx) => tx,
            Err(outcome) => return outcome,
        };

        let outcome = restart_or_rollback(host, &mut tx, &self.ssh.service);
        if outcome == StepOutcome::Succeeded {
            info!(port = ctx.ssh_port(), "SSH daemon restarted with hardened configuration");
            self.close_previous_ports(host, &previous, ctx.ssh_port());
        }
        outcome
    }
}
