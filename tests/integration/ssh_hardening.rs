//! Integration tests for the SSH hardening step against a stock sshd_config

use std::time::Duration;

use rampart::config::SshConfig;
use rampart::fs::RealFs;
use rampart::models::{RunContext, StepOutcome};
use rampart::process::{Reply, ScriptedRunner};
use rampart::steps::{HardeningStep, Host, SshHardening};
use rampart::transaction::{backup_path, BLOCK_BEGIN};

use super::helpers::{count_lines, HostFixture, DEBIAN_SSHD};

fn step(fixture: &HostFixture) -> SshHardening {
    SshHardening::new(
        SshConfig::default(),
        fixture.paths.clone(),
        Duration::from_secs(5),
    )
}

fn ctx() -> RunContext {
    RunContext::new(2222, false, "admin").unwrap()
}

#[test]
fn test_port_and_password_directives_are_unique() {
    let fixture = HostFixture::new().with_admin_key();
    let runner = ScriptedRunner::new();
    let host = Host::new(&runner, &RealFs);

    assert_eq!(step(&fixture).run(&ctx(), &host), StepOutcome::Succeeded);

    let text = fixture.read(&fixture.paths.sshd_config);
    assert_eq!(count_lines(&text, "Port 2222"), 1);
    assert_eq!(count_lines(&text, "PasswordAuthentication no"), 1);
    assert_eq!(count_lines(&text, "PasswordAuthentication yes"), 0);
    assert_eq!(count_lines(&text, "#Port 22"), 0);

    // global directives stay ahead of the Match block
    let block = text.find(BLOCK_BEGIN).unwrap();
    let matcher = text.find("Match User anoncvs").unwrap();
    assert!(block < matcher);
    assert!(text.contains("Subsystem sftp /usr/lib/openssh/sftp-server"));

    let path = fixture.paths.sshd_config.to_str().unwrap();
    assert!(runner.ran(&["sshd", "-t", "-f", path]));
    assert!(runner.ran(&["systemctl", "restart", "ssh"]));
}

#[test]
fn test_block_precedes_include_so_drop_ins_cannot_override() {
    let fixture = HostFixture::new().with_admin_key();
    let runner = ScriptedRunner::new();
    let host = Host::new(&runner, &RealFs);

    assert_eq!(step(&fixture).run(&ctx(), &host), StepOutcome::Succeeded);

    let text = fixture.read(&fixture.paths.sshd_config);
    let block = text.find(BLOCK_BEGIN).unwrap();
    let include = text.find("Include /etc/ssh/sshd_config.d/*.conf").unwrap();
    assert!(block < include);
    assert_eq!(count_lines(&text, "Include /etc/ssh/sshd_config.d/*.conf"), 1);
}

#[test]
fn test_second_run_yields_same_file() {
    let fixture = HostFixture::new().with_admin_key();
    let runner = ScriptedRunner::new();
    let host = Host::new(&runner, &RealFs);
    let step = step(&fixture);

    step.run(&ctx(), &host);
    let first = fixture.read(&fixture.paths.sshd_config);
    step.run(&ctx(), &host);
    let second = fixture.read(&fixture.paths.sshd_config);

    assert_eq!(first, second);
    assert_eq!(second.matches(BLOCK_BEGIN).count(), 1);
}

#[test]
fn test_rejected_config_is_rolled_back() {
    let fixture = HostFixture::new().with_admin_key();
    let runner = ScriptedRunner::new().on(
        &["sshd", "-t"],
        Reply::failure(255, "Unsupported option KbdInteractiveAuthentication"),
    );
    let host = Host::new(&runner, &RealFs);

    let outcome = step(&fixture).run(&ctx(), &host);
    assert!(matches!(outcome, StepOutcome::RolledBack(_)));

    let target = &fixture.paths.sshd_config;
    assert_eq!(fixture.read(target), fixture.read(&backup_path(target)));
    assert_eq!(fixture.read(target), DEBIAN_SSHD);
    assert!(!runner.ran(&["systemctl", "restart"]));
}

#[test]
fn test_no_authorized_key_leaves_config_alone() {
    let fixture = HostFixture::new();
    let runner = ScriptedRunner::new();
    let host = Host::new(&runner, &RealFs);

    let outcome = step(&fixture).run(&ctx(), &host);
    assert!(matches!(outcome, StepOutcome::Skipped(_)));
    assert_eq!(fixture.read(&fixture.paths.sshd_config), DEBIAN_SSHD);
    assert!(!backup_path(&fixture.paths.sshd_config).exists());
}
