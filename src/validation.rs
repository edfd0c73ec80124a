//! Validation of operator-supplied input.
//!
//! Usernames and ports end up in file paths, command arguments and daemon
//! configuration, so they are checked before a run context is built.

use anyhow::{bail, Result};

/// Maximum username length accepted by shadow-utils `useradd`.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Validates that a username is a portable POSIX login name.
///
/// A username is valid if:
/// - It is not empty and at most MAX_USERNAME_LENGTH characters
/// - It starts with a lowercase letter or underscore
/// - It contains only lowercase letters, digits, `_` and `-`, with an optional trailing `$`
///
/// # Examples
///
/// ```
/// use rampart::validation::validate_username;
///
/// assert!(validate_username("admin").is_ok());
/// assert!(validate_username("deploy-bot").is_ok());
/// assert!(validate_username("").is_err());
/// assert!(validate_username("../root").is_err());
/// ```
pub fn validate_username(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Username cannot be empty");
    }

    if name.len() > MAX_USERNAME_LENGTH {
        bail!(
            "Username too long: {} characters (max {})",
            name.len(),
            MAX_USERNAME_LENGTH
        );
    }

    let body = name.strip_suffix('$').unwrap_or(name);
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => bail!("Username '{name}' must start with a lowercase letter or underscore"),
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        bail!("Username '{name}' contains invalid characters. Use only lowercase letters, digits, dashes (-), and underscores (_)");
    }

    Ok(())
}

/// Parses a TCP port for the SSH daemon.
///
/// Port 0 is rejected since sshd would pick an arbitrary port.
pub fn parse_port(value: &str) -> Result<u16> {
    let port: u16 = match value.trim().parse() {
        Ok(p) => p,
        Err(_) => bail!("Invalid port '{value}': expected a number between 1 and 65535"),
    };
    validate_port(port)?;
    Ok(port)
}

pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        bail!("Invalid port 0: expected a number between 1 and 65535");
    }
    Ok(())
}

/// Clap value parser for validating username arguments.
///
/// ```ignore
/// #[arg(long, value_parser = clap_username_validator)]
/// user: Option<String>,
/// ```
pub fn clap_username_validator(s: &str) -> Result<String, String> {
    validate_username(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}

/// Clap value parser for port arguments.
pub fn clap_port_validator(s: &str) -> Result<u16, String> {
    parse_port(s).map_err(|e| e.to_string())
}
