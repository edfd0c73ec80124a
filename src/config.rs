//! Configuration file for rampart
//!
//! Every section is optional; missing keys take the defaults below. Paths are
//! configurable so the whole run can be pointed at a scratch directory.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::validation::{validate_port, validate_username};

/// Location read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rampart/rampart.toml";

const PERMIT_ROOT_LOGIN_VALUES: &[&str] = &[
    "yes",
    "no",
    "prohibit-password",
    "without-password",
    "forced-commands-only",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub firewall: FirewallConfig,

    #[serde(default)]
    pub kernel: KernelConfig,

    #[serde(default)]
    pub fail2ban: Fail2banConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SSH daemon settings written by the hardening step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Port used when `--ssh-port` is not given
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_permit_root_login")]
    pub permit_root_login: String,

    #[serde(default)]
    pub password_authentication: bool,

    #[serde(default = "default_max_auth_tries")]
    pub max_auth_tries: u32,

    #[serde(default = "default_client_alive_interval")]
    pub client_alive_interval: u32,

    #[serde(default = "default_client_alive_count_max")]
    pub client_alive_count_max: u32,

    /// Accounts allowed in addition to the admin user. Empty means no
    /// `AllowUsers` restriction is written.
    #[serde(default)]
    pub allow_users: Vec<String>,

    /// Refuse to disable password logins unless the admin user has a key
    #[serde(default = "default_true")]
    pub require_authorized_keys: bool,

    /// systemd unit restarted after the configuration changes
    #[serde(default = "default_ssh_service")]
    pub service: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            permit_root_login: default_permit_root_login(),
            password_authentication: false,
            max_auth_tries: default_max_auth_tries(),
            client_alive_interval: default_client_alive_interval(),
            client_alive_count_max: default_client_alive_count_max(),
            allow_users: Vec::new(),
            require_authorized_keys: true,
            service: default_ssh_service(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// Extra `ufw allow` rules such as `80/tcp` or `443`
    #[serde(default)]
    pub extra_allow: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// sysctl keys and values, written in key order
    #[serde(default = "default_kernel_params")]
    pub params: BTreeMap<String, String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            params: default_kernel_params(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fail2banConfig {
    #[serde(default = "default_bantime")]
    pub bantime: String,

    #[serde(default = "default_findtime")]
    pub findtime: String,

    #[serde(default = "default_maxretry")]
    pub maxretry: u32,
}

impl Default for Fail2banConfig {
    fn default() -> Self {
        Self {
            bantime: default_bantime(),
            findtime: default_findtime(),
            maxretry: default_maxretry(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Units disabled by service minimization when they are enabled
    #[serde(default = "default_disable_services")]
    pub disable: Vec<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            disable: default_disable_services(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_sshd_config")]
    pub sshd_config: PathBuf,

    #[serde(default = "default_sysctl_conf")]
    pub sysctl_conf: PathBuf,

    #[serde(default = "default_jail_local")]
    pub jail_local: PathBuf,

    #[serde(default = "default_auto_upgrades")]
    pub auto_upgrades: PathBuf,

    /// Parent of ordinary users' home directories
    #[serde(default = "default_home_root")]
    pub home_root: PathBuf,

    #[serde(default = "default_root_home")]
    pub root_home: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sshd_config: default_sshd_config(),
            sysctl_conf: default_sysctl_conf(),
            jail_local: default_jail_local(),
            auto_upgrades: default_auto_upgrades(),
            home_root: default_home_root(),
            root_home: default_root_home(),
        }
    }
}

impl PathsConfig {
    pub fn home_of(&self, username: &str) -> PathBuf {
        if username == "root" {
            self.root_home.clone()
        } else {
            self.home_root.join(username)
        }
    }

    pub fn authorized_keys_of(&self, username: &str) -> PathBuf {
        self.home_of(username).join(".ssh").join("authorized_keys")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Ordinary commands (ufw, systemctl, ssh-keygen)
    #[serde(default = "default_command_secs")]
    pub command_secs: u64,

    /// apt-get operations
    #[serde(default = "default_package_secs")]
    pub package_secs: u64,

    #[serde(default = "default_validator_secs")]
    pub validator_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            command_secs: default_command_secs(),
            package_secs: default_package_secs(),
            validator_secs: default_validator_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn package(&self) -> Duration {
        Duration::from_secs(self.package_secs)
    }

    pub fn validator(&self) -> Duration {
        Duration::from_secs(self.validator_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load the configuration file at `path`.
    ///
    /// A missing file is an error only when the operator named it
    /// (`explicit`); the default location may be absent.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !path.exists() {
            if explicit {
                bail!("Configuration file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_port(self.ssh.port).context("[ssh] port")?;

        if !PERMIT_ROOT_LOGIN_VALUES.contains(&self.ssh.permit_root_login.as_str()) {
            bail!(
                "[ssh] permit_root_login must be one of {}, got '{}'",
                PERMIT_ROOT_LOGIN_VALUES.join(", "),
                self.ssh.permit_root_login
            );
        }
        if self.ssh.max_auth_tries == 0 {
            bail!("[ssh] max_auth_tries must be at least 1");
        }
        if self.ssh.service.trim().is_empty() {
            bail!("[ssh] service cannot be empty");
        }
        for user in &self.ssh.allow_users {
            validate_username(user).context("[ssh] allow_users")?;
        }

        for rule in &self.firewall.extra_allow {
            if rule.trim().is_empty() || rule.chars().any(char::is_whitespace) {
                bail!("[firewall] extra_allow entry '{rule}' must be a single ufw rule token");
            }
        }

        for (key, value) in &self.kernel.params {
            if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c == '=' || c == '#') {
                bail!("[kernel] invalid parameter name '{key}'");
            }
            if value.contains('\n') {
                bail!("[kernel] value of '{key}' spans multiple lines");
            }
        }

        if self.fail2ban.bantime.trim().is_empty() || self.fail2ban.findtime.trim().is_empty() {
            bail!("[fail2ban] bantime and findtime cannot be empty");
        }
        if self.fail2ban.maxretry == 0 {
            bail!("[fail2ban] maxretry must be at least 1");
        }

        if self.services.disable.iter().any(|s| s.trim().is_empty()) {
            bail!("[services] disable contains an empty service name");
        }

        if self.timeouts.command_secs == 0
            || self.timeouts.package_secs == 0
            || self.timeouts.validator_secs == 0
        {
            bail!("[timeouts] values must be greater than zero");
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "[logging] level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            );
        }

        Ok(())
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_ssh_port() -> u16 {
    22
}

fn default_permit_root_login() -> String {
    "no".to_string()
}

fn default_max_auth_tries() -> u32 {
    3
}

fn default_client_alive_interval() -> u32 {
    300
}

fn default_client_alive_count_max() -> u32 {
    2
}

fn default_ssh_service() -> String {
    "ssh".to_string()
}

fn default_kernel_params() -> BTreeMap<String, String> {
    [
        ("fs.protected_hardlinks", "1"),
        ("fs.protected_symlinks", "1"),
        ("kernel.dmesg_restrict", "1"),
        ("kernel.kptr_restrict", "2"),
        ("kernel.randomize_va_space", "2"),
        ("kernel.yama.ptrace_scope", "1"),
        ("net.ipv4.conf.all.accept_redirects", "0"),
        ("net.ipv4.conf.all.accept_source_route", "0"),
        ("net.ipv4.conf.all.log_martians", "1"),
        ("net.ipv4.conf.all.rp_filter", "1"),
        ("net.ipv4.conf.all.send_redirects", "0"),
        ("net.ipv4.conf.default.rp_filter", "1"),
        ("net.ipv4.icmp_echo_ignore_broadcasts", "1"),
        ("net.ipv4.tcp_syncookies", "1"),
        ("net.ipv6.conf.all.accept_redirects", "0"),
        ("net.ipv6.conf.all.accept_source_route", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_bantime() -> String {
    "1h".to_string()
}

fn default_findtime() -> String {
    "10m".to_string()
}

fn default_maxretry() -> u32 {
    5
}

fn default_disable_services() -> Vec<String> {
    ["avahi-daemon", "cups", "bluetooth", "rpcbind"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sshd_config() -> PathBuf {
    PathBuf::from("/etc/ssh/sshd_config")
}

fn default_sysctl_conf() -> PathBuf {
    PathBuf::from("/etc/sysctl.conf")
}

fn default_jail_local() -> PathBuf {
    PathBuf::from("/etc/fail2ban/jail.local")
}

fn default_auto_upgrades() -> PathBuf {
    PathBuf::from("/etc/apt/apt.conf.d/20auto-upgrades")
}

fn default_home_root() -> PathBuf {
    PathBuf::from("/home")
}

fn default_root_home() -> PathBuf {
    PathBuf::from("/root")
}

fn default_command_secs() -> u64 {
    120
}

fn default_package_secs() -> u64 {
    1800
}

fn default_validator_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
