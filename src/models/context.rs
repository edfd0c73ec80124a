//! Operator-supplied parameters shared read-only by every step

use anyhow::Result;
use serde::Serialize;

use crate::validation::{validate_port, validate_username};

/// Parameters gathered once before the first step runs.
///
/// Fields are private so nothing can change them once the run has started;
/// steps receive `&RunContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    ssh_port: u16,
    generate_keys: bool,
    username: String,
}

impl RunContext {
    pub fn new(ssh_port: u16, generate_keys: bool, username: impl Into<String>) -> Result<Self> {
        let username = username.into();
        validate_port(ssh_port)?;
        validate_username(&username)?;
        Ok(Self {
            ssh_port,
            generate_keys,
            username,
        })
    }

    /// Port the SSH daemon listens on after hardening
    pub fn ssh_port(&self) -> u16 {
        self.ssh_port
    }

    /// Whether to create a key pair for the admin user
    pub fn generate_keys(&self) -> bool {
        self.generate_keys
    }

    /// Administrator account that must keep remote access
    pub fn username(&self) -> &str {
        &self.username
    }
}
