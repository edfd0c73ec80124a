//! End-to-end hardening run with scripted commands and answers

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use rampart::config::{Config, PathsConfig};
use rampart::fs::RealFs;
use rampart::gate::ScriptedGate;
use rampart::models::{RunContext, StepStatus};
use rampart::orchestrator::Orchestrator;
use rampart::process::{Reply, ScriptedRunner};
use rampart::report::RunState;
use rampart::steps::{standard_plan, Host};

const SSHD: &str = "#Port 22\nPermitRootLogin yes\nPasswordAuthentication yes\nUsePAM yes\n";
const ADDED: &str = "Added user rules:\nufw allow 2222/tcp\nufw allow 22/tcp\n";

/// Config pointing every path into `temp`, with a stock sshd_config and no key
fn bare_host_layout(temp: &TempDir) -> Config {
    let root = temp.path();
    let mut config = Config::default();
    config.paths = PathsConfig {
        sshd_config: root.join("sshd_config"),
        sysctl_conf: root.join("sysctl.conf"),
        jail_local: root.join("jail.local"),
        auto_upgrades: root.join("20auto-upgrades"),
        home_root: root.join("home"),
        root_home: root.join("root"),
    };
    fs::write(&config.paths.sshd_config, SSHD).unwrap();
    config
}

fn host_layout(temp: &TempDir) -> Config {
    let config = bare_host_layout(temp);
    let keys = config.paths.authorized_keys_of("admin");
    fs::create_dir_all(keys.parent().unwrap()).unwrap();
    fs::write(&keys, "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAdmin admin@laptop\n").unwrap();
    config
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

#[test]
fn test_full_run_hardens_every_file() {
    let temp = TempDir::new().unwrap();
    let config = host_layout(&temp);
    let runner = ScriptedRunner::new()
        .on(&["ufw", "show", "added"], Reply::stdout(ADDED))
        .on(&["systemctl", "is-enabled", "cups"], Reply::stdout("enabled\n"));
    let host = Host::new(&runner, &RealFs).with_timeouts(&config.timeouts);
    let ctx = RunContext::new(2222, false, "admin").unwrap();
    let gate = ScriptedGate::assume_yes();

    let mut orchestrator = Orchestrator::new(standard_plan(&config)).with_privilege_probe(|| true);
    let report = orchestrator.run(&ctx, &host, &gate).unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert!(report.is_success(), "{}", report.render());
    assert_eq!(report.status_of("ssh-keys"), Some(StepStatus::Skipped));
    assert_eq!(report.status_of("service-minimization"), Some(StepStatus::Succeeded));

    let sshd = read(&config.paths.sshd_config);
    assert!(sshd.contains("Port 2222"));
    assert!(sshd.contains("PermitRootLogin no"));
    assert!(!sshd.contains("PasswordAuthentication yes"));
    assert!(read(&config.paths.sysctl_conf).contains("net.ipv4.tcp_syncookies = 1"));
    assert!(read(&config.paths.jail_local).contains("port = 2222\n"));
    assert!(read(&config.paths.auto_upgrades).contains("APT::Periodic::Unattended-Upgrade \"1\";"));

    assert!(runner.ran(&["ufw", "allow", "2222/tcp"]));
    assert!(runner.ran(&["ufw", "allow", "22/tcp"]));
    assert!(runner.ran(&["ufw", "--force", "enable"]));
    assert!(runner.ran(&["ufw", "delete", "allow", "22/tcp"]));
    assert!(runner.ran(&["systemctl", "disable", "--now", "cups"]));
    assert!(runner.ran(&["apt-get", "-y", "autoremove"]));

    let json = temp.path().join("report.json");
    report.write_json(&RealFs, &json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&read(&json)).unwrap();
    assert_eq!(value["state"], "completed");
    assert_eq!(value["steps"].as_array().unwrap().len(), 9);
}

#[test]
fn test_skipped_ssh_change_keeps_current_port_open() {
    let temp = TempDir::new().unwrap();
    let config = bare_host_layout(&temp);
    let runner = ScriptedRunner::new().on(&["ufw", "show", "added"], Reply::stdout(ADDED));
    let host = Host::new(&runner, &RealFs);
    let ctx = RunContext::new(2222, false, "admin").unwrap();

    let mut orchestrator = Orchestrator::new(standard_plan(&config)).with_privilege_probe(|| true);
    let report = orchestrator
        .run(&ctx, &host, &ScriptedGate::assume_yes())
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.status_of("ssh-hardening"), Some(StepStatus::Skipped));
    assert_eq!(read(&config.paths.sshd_config), SSHD);

    // sshd still listens on 22, so its rule must stay
    assert!(runner.ran(&["ufw", "allow", "22/tcp"]));
    assert!(runner.ran(&["ufw", "--force", "enable"]));
    assert!(!runner.ran(&["ufw", "delete"]));
    assert!(read(&config.paths.jail_local).contains("port = 22\n"));
}

#[test]
fn test_declined_ssh_change_keeps_current_port_open() {
    let temp = TempDir::new().unwrap();
    let config = host_layout(&temp);
    let runner = ScriptedRunner::new().on(&["ufw", "show", "added"], Reply::stdout(ADDED));
    let host = Host::new(&runner, &RealFs);
    let ctx = RunContext::new(2222, false, "admin").unwrap();
    // system-update, firewall, then no to ssh-hardening
    let gate = ScriptedGate::assume_yes().with_confirmations([true, true, false]);

    let mut orchestrator = Orchestrator::new(standard_plan(&config)).with_privilege_probe(|| true);
    let report = orchestrator.run(&ctx, &host, &gate).unwrap();

    assert_eq!(report.status_of("firewall"), Some(StepStatus::Succeeded));
    assert_eq!(report.status_of("ssh-hardening"), Some(StepStatus::Skipped));
    assert!(gate.prompts()[2].contains("Harden the SSH daemon"));
    assert!(runner.ran(&["ufw", "allow", "22/tcp"]));
    assert!(!runner.ran(&["ufw", "delete"]));
    assert!(read(&config.paths.jail_local).contains("port = 22\n"));
}

#[test]
fn test_missing_firewall_rule_aborts_but_cleans_up() {
    let temp = TempDir::new().unwrap();
    let config = host_layout(&temp);
    let runner = ScriptedRunner::new().on(&["ufw", "show", "added"], Reply::stdout("Added user rules:\n"));
    let host = Host::new(&runner, &RealFs);
    let ctx = RunContext::new(2222, false, "admin").unwrap();

    let mut orchestrator = Orchestrator::new(standard_plan(&config)).with_privilege_probe(|| true);
    let report = orchestrator
        .run(&ctx, &host, &ScriptedGate::assume_yes())
        .unwrap();

    assert_eq!(report.state, RunState::AbortedFatal);
    assert_eq!(report.status_of("firewall"), Some(StepStatus::FailedFatal));
    assert_eq!(report.status_of("ssh-hardening"), Some(StepStatus::Pending));
    assert_eq!(report.status_of("cleanup"), Some(StepStatus::Succeeded));
    assert!(!runner.ran(&["ufw", "--force", "enable"]));
    assert_eq!(read(&config.paths.sshd_config), SSHD);
    assert!(!config.paths.jail_local.exists());
}
