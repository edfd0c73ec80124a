//! Integration tests for configuration transactions on real files

use std::fs;
use std::time::Duration;

use rampart::fs::RealFs;
use rampart::process::{Reply, ScriptedRunner};
use rampart::transaction::{
    backup_path, original_path, ConfigTransaction, ManagedBlock, TransactionState, Validator,
};
use rampart::HardenError;

use super::helpers::{HostFixture, DEBIAN_SSHD};

fn sshd_validator() -> Validator {
    Validator::command(vec![
        "sshd".to_string(),
        "-t".to_string(),
        "-f".to_string(),
        "{path}".to_string(),
    ])
    .with_timeout(Duration::from_secs(5))
}

#[test]
fn test_validate_without_rewrite_is_byte_identical() {
    let host = HostFixture::new();
    let target = host.paths.sshd_config.clone();
    let runner = ScriptedRunner::new();

    let mut tx = ConfigTransaction::open(&RealFs, &target).expect("Should open transaction");
    tx.validate(&sshd_validator(), &runner).expect("Should validate");
    tx.commit().expect("Should commit");

    assert_eq!(fs::read(&target).unwrap(), DEBIAN_SSHD.as_bytes());
    assert!(runner.ran(&["sshd", "-t", "-f", target.to_str().unwrap()]));
}

#[test]
fn test_rejected_rewrite_leaves_backup_content() {
    let host = HostFixture::new();
    let target = host.paths.sshd_config.clone();
    let runner = ScriptedRunner::new().on(
        &["sshd", "-t"],
        Reply::failure(255, "line 3: Bad configuration option: Prot"),
    );
    let block = ManagedBlock::new()
        .directive("Port", 2222)
        .directive("PasswordAuthentication", "no");

    let mut tx = ConfigTransaction::open(&RealFs, &target).unwrap();
    tx.rewrite(|lines| block.apply(lines)).unwrap();
    assert!(tx.has_changes());

    let err = tx.validate(&sshd_validator(), &runner).unwrap_err();
    assert!(matches!(err, HardenError::ValidationRejected { .. }));
    assert!(err.to_string().contains("Bad configuration option"));
    assert_eq!(tx.state(), TransactionState::RolledBack);

    let restored = fs::read(&target).unwrap();
    assert_eq!(restored, fs::read(backup_path(&target)).unwrap());
    assert_eq!(restored, DEBIAN_SSHD.as_bytes());
}

#[test]
fn test_first_touch_copy_survives_later_runs() {
    let host = HostFixture::new();
    let target = host.paths.sshd_config.clone();
    let runner = ScriptedRunner::new();

    for port in [2222, 2200] {
        let block = ManagedBlock::new().directive("Port", port);
        let mut tx = ConfigTransaction::open(&RealFs, &target).unwrap();
        tx.rewrite(|lines| block.apply(lines)).unwrap();
        tx.validate(&sshd_validator(), &runner).unwrap();
        tx.commit().unwrap();
    }

    assert_eq!(host.read(&original_path(&target)), DEBIAN_SSHD);
    assert!(host.read(&backup_path(&target)).contains("Port 2222"));
    assert!(host.read(&target).contains("Port 2200"));
}

#[test]
fn test_new_file_removed_on_rollback() {
    let host = HostFixture::new();
    let target = host.paths.jail_local.clone();
    let runner = ScriptedRunner::new().on(&["fail2ban-client", "-t"], Reply::failure(1, "ERROR"));
    let block = ManagedBlock::new().raw_line("[sshd]").raw_line("enabled = true");

    let mut tx = ConfigTransaction::open_or_create(&RealFs, &target).unwrap();
    assert!(!tx.target_existed());
    tx.rewrite(|lines| block.apply(lines)).unwrap();

    let validator = Validator::command(vec!["fail2ban-client".to_string(), "-t".to_string()]);
    assert!(tx.validate(&validator, &runner).is_err());
    assert!(!target.exists());
}

#[test]
fn test_missing_target_cannot_be_opened() {
    let host = HostFixture::new();
    let missing = host.temp.path().join("etc/ssh/absent_config");

    let err = ConfigTransaction::open(&RealFs, &missing).err().unwrap();
    assert!(matches!(err, HardenError::Io { .. }));
    assert!(!backup_path(&missing).exists());
}
