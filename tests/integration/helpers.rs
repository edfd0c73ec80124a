//! Shared test helpers for hardening integration tests

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use rampart::config::PathsConfig;
use rampart::fs::{FileSystem, RealFs};
use rampart::Result;

/// Stock Debian `sshd_config` excerpt: no active `Port`, password login on
pub const DEBIAN_SSHD: &str = "\
Include /etc/ssh/sshd_config.d/*.conf

#Port 22
#AddressFamily any
PermitRootLogin prohibit-password
PasswordAuthentication yes
KbdInteractiveAuthentication no
UsePAM yes
X11Forwarding yes
PrintMotd no
AcceptEnv LANG LC_*
Subsystem sftp /usr/lib/openssh/sftp-server

Match User anoncvs
    X11Forwarding no
";

pub const ADMIN_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAdmin admin@laptop";

/// A filesystem that forwards to [`RealFs`] and records every mutation
#[derive(Default)]
pub struct RecordingFs {
    mutations: RefCell<Vec<(&'static str, PathBuf)>>,
}

impl RecordingFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutations(&self) -> Vec<(&'static str, PathBuf)> {
        self.mutations.borrow().clone()
    }

    fn record(&self, op: &'static str, path: &Path) {
        self.mutations.borrow_mut().push((op, path.to_path_buf()));
    }
}

impl FileSystem for RecordingFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        RealFs.read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        RealFs.exists(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.record("write", path);
        RealFs.write_atomic(path, contents)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        self.record("copy", to);
        RealFs.copy(from, to)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.record("remove", path);
        RealFs.remove(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.record("mkdir", path);
        RealFs.create_dir_all(path)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        self.record("chmod", path);
        RealFs.set_mode(path, mode)
    }

    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
        self.record("chown", path);
        RealFs.set_owner(path, uid, gid)
    }
}

/// Test helper: a temporary host layout with every managed path inside it
pub struct HostFixture {
    pub temp: TempDir,
    pub paths: PathsConfig,
}

impl HostFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path();
        let paths = PathsConfig {
            sshd_config: root.join("etc/ssh/sshd_config"),
            sysctl_conf: root.join("etc/sysctl.conf"),
            jail_local: root.join("etc/fail2ban/jail.local"),
            auto_upgrades: root.join("etc/apt/apt.conf.d/20auto-upgrades"),
            home_root: root.join("home"),
            root_home: root.join("root"),
        };
        for dir in [
            "etc/ssh",
            "etc/fail2ban",
            "etc/apt/apt.conf.d",
            "home/admin/.ssh",
        ] {
            fs::create_dir_all(root.join(dir)).expect("Failed to create fixture directory");
        }
        fs::write(&paths.sshd_config, DEBIAN_SSHD).expect("Failed to write sshd_config");
        Self { temp, paths }
    }

    pub fn with_admin_key(self) -> Self {
        fs::write(
            self.paths.authorized_keys_of("admin"),
            format!("{ADMIN_KEY}\n"),
        )
        .expect("Failed to write authorized_keys");
        self
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).expect("Failed to read fixture file")
    }
}

/// Number of lines equal to `line` after trimming
pub fn count_lines(text: &str, line: &str) -> usize {
    text.lines().filter(|l| l.trim() == line).count()
}
