use nix::unistd::User;
use std::path::Path;
use tracing::info;

use super::{HardeningStep, Host};
use crate::config::PathsConfig;
use crate::error::HardenError;
use crate::fs::read_to_string;
use crate::models::{Criticality, RunContext, StepOutcome};
use crate::transaction::{ConfigTransaction, Validator};

const SSH_DIR_MODE: u32 = 0o700;
const AUTHORIZED_KEYS_MODE: u32 = 0o600;
const PRIVATE_KEY_MODE: u32 = 0o600;
const KEY_NAME: &str = "id_ed25519";

/// Generate an ed25519 key pair for the admin user and authorize it.
///
/// Runs only when the operator asked for key generation; an existing key
/// pair is reused.
pub struct SshKeys {
    paths: PathsConfig,
}

struct Account {
    uid: u32,
    gid: u32,
}

impl SshKeys {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    fn lookup(username: &str) -> Result<Account, String> {
        match User::from_name(username) {
            Ok(Some(user)) => Ok(Account {
                uid: user.uid.as_raw(),
                gid: user.gid.as_raw(),
            }),
            Ok(None) => Err(format!("user '{username}' does not exist")),
            Err(e) => Err(format!("cannot look up user '{username}': {e}")),
        }
    }

    fn own(host: &Host, path: &Path, account: &Account, mode: u32) -> Result<(), HardenError> {
        host.fs.set_mode(path, mode)?;
        host.fs.set_owner(path, account.uid, account.gid)
    }

    fn generate(&self, ctx: &RunContext, host: &Host) -> Result<(), String> {
        let account = Self::lookup(ctx.username())?;
        let ssh_dir = self.paths.home_of(ctx.username()).join(".ssh");
        let private_key = ssh_dir.join(KEY_NAME);
        let public_key = ssh_dir.join(format!("{KEY_NAME}.pub"));

        host.fs
            .create_dir_all(&ssh_dir)
            .and_then(|()| Self::own(host, &ssh_dir, &account, SSH_DIR_MODE))
            .map_err(|e| e.to_string())?;

        if host.fs.exists(&private_key) {
            info!(path = %private_key.display(), "Reusing existing key pair");
        } else {
            let comment = format!("{}@rampart", ctx.username());
            let key_path = private_key.display().to_string();
            host.exec(&[
                "ssh-keygen", "-q", "-t", "ed25519", "-N", "", "-C", comment.as_str(), "-f", key_path.as_str(),
            ])?;
            if host.dry_run {
                info!(path = %key_path, "dry run: key pair not generated, nothing to authorize");
                return Ok(());
            }
        }

        Self::own(host, &private_key, &account, PRIVATE_KEY_MODE)
            .and_then(|()| host.fs.set_owner(&public_key, account.uid, account.gid))
            .map_err(|e| e.to_string())?;

        let key_line = read_to_string(host.fs, &public_key)
            .map_err(|e| e.to_string())?
            .trim()
            .to_string();
        if key_line.is_empty() {
            return Err(format!("{} is empty", public_key.display()));
        }

        let authorized_keys = ssh_dir.join("authorized_keys");
        let mut tx = ConfigTransaction::open_or_create(host.fs, &authorized_keys)
            .map_err(|e| e.to_string())?;
        tx.rewrite(|lines| {
            let mut out = lines.to_vec();
            if !out.iter().any(|l| l.trim() == key_line) {
                out.push(key_line.clone());
            }
            Ok(out)
        })
        .and_then(|()| tx.validate(&Validator::None, host.runner))
        .and_then(|()| Self::own(host, &authorized_keys, &account, AUTHORIZED_KEYS_MODE))
        .map_err(|e| e.to_string())?;

        info!(user = ctx.username(), path = %authorized_keys.display(), "Public key authorized");
        Ok(())
    }
}

impl HardeningStep for SshKeys {
    fn name(&self) -> &'static str {
        "ssh-keys"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Recoverable
    }

    /// Asked once up front through `--generate-keys` or the interactive
    /// question; the run context carries the answer.
    fn requires_confirmation(&self) -> bool {
        false
    }

    fn confirmation_prompt(&self, ctx: &RunContext) -> String {
        format!("Generate an SSH key pair for {}?", ctx.username())
    }

    fn run(&self, ctx: &RunContext, host: &Host) -> StepOutcome {
        if !ctx.generate_keys() {
            return StepOutcome::skipped("key generation not requested");
        }
        match self.generate(ctx, host) {
            Ok(()) => StepOutcome::Succeeded,
            Err(reason) => StepOutcome::failed(reason),
        }
    }
}
