use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn place(root: &Path, relative: &str, source: &str) {
    let target = root.join(relative);
    fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
    fs::copy(fixture(source), target).expect("copy fixture");
}

const MANIFEST: &str = r#"
[defaults]
modes = ["skip"]

[[file]]
path = "etc/one/oned.conf"
format = "one"

[[file]]
path = "remotes/kvmrc"
format = "shell"

[[file]]
path = "etc/one/motd"
format = "text"

[[file]]
path = "etc/one/sched.conf"
format = "one"
optional = true
"#;

/// Installation prefix plus the stock trees of two releases.
fn layout() -> TempDir {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    place(&root.join("prefix"), "etc/one/oned.conf", "fixtures/one/oned.conf-custom");
    place(&root.join("prefix"), "remotes/kvmrc", "fixtures/shell/kvmrc-custom");
    place(&root.join("5.4"), "etc/one/oned.conf", "fixtures/one/oned.conf-5.4");
    place(&root.join("5.4"), "remotes/kvmrc", "fixtures/shell/kvmrc-5.4");
    place(&root.join("5.8"), "etc/one/oned.conf", "fixtures/one/oned.conf-5.8");
    place(&root.join("5.8"), "remotes/kvmrc", "fixtures/shell/kvmrc-5.8");
    place(&root.join("5.8"), "etc/one/motd", "fixtures/text/motd-5.8");
    fs::write(root.join("files.toml"), MANIFEST).expect("manifest");
    dir
}

fn upgrade_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cfg-upgrade"));
    cmd.arg("upgrade")
        .arg("--prefix")
        .arg(root.join("prefix"))
        .arg("--from")
        .arg(root.join("5.4"))
        .arg("--to")
        .arg(root.join("5.8"))
        .arg("--manifest")
        .arg(root.join("files.toml"));
    cmd
}

#[test]
fn upgrade_rewrites_installs_and_backs_up() {
    let dir = layout();
    let root = dir.path();

    upgrade_cmd(root)
        .arg("--backup-dir")
        .arg(root.join("backup"))
        .assert()
        .success()
        .stdout(predicate::str::contains("saved"))
        .stdout(predicate::str::contains("installed"))
        .stdout(predicate::str::contains("failed=0"));

    let kvmrc = fs::read_to_string(root.join("prefix/remotes/kvmrc")).expect("read");
    let expected = fs::read_to_string(fixture("fixtures/shell/kvmrc-expected")).expect("read");
    assert_eq!(kvmrc, expected);

    let backup = fs::read_to_string(root.join("backup/remotes/kvmrc")).expect("backup");
    let custom = fs::read_to_string(fixture("fixtures/shell/kvmrc-custom")).expect("read");
    assert_eq!(backup, custom);

    assert!(root.join("prefix/etc/one/motd").is_file());
    assert!(!root.join("prefix/etc/one/sched.conf").exists());
}

#[test]
fn noop_upgrade_writes_nothing() {
    let dir = layout();
    let root = dir.path();

    upgrade_cmd(root)
        .arg("--noop")
        .arg("--backup-dir")
        .arg(root.join("backup"))
        .assert()
        .success()
        .stdout(predicate::str::contains("patched"));

    let kvmrc = fs::read_to_string(root.join("prefix/remotes/kvmrc")).expect("read");
    let custom = fs::read_to_string(fixture("fixtures/shell/kvmrc-custom")).expect("read");
    assert_eq!(kvmrc, custom);
    assert!(!root.join("backup").exists());
    assert!(!root.join("prefix/etc/one/motd").exists());
}

#[test]
fn upgrade_json_reports_every_file() {
    let dir = layout();
    let root = dir.path();

    upgrade_cmd(root)
        .arg("--noop")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"patched\""))
        .stdout(predicate::str::contains("\"state\": \"skipped\""))
        .stdout(predicate::str::contains("etc/one/sched.conf"));
}

#[test]
fn a_file_missing_from_the_new_stock_fails_the_run() {
    let dir = layout();
    let root = dir.path();
    fs::remove_file(root.join("5.8/remotes/kvmrc")).expect("rm");

    upgrade_cmd(root)
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing from new stock"))
        .stderr(predicate::str::contains("upgrade failed: 1 of 4 files"));

    // Other files are still upgraded.
    let oned = fs::read_to_string(root.join("prefix/etc/one/oned.conf")).expect("read");
    let expected = fs::read_to_string(fixture("fixtures/one/oned.conf-expected")).expect("read");
    assert_eq!(oned, expected);
}

#[test]
fn missing_prefix_is_rejected() {
    let dir = layout();
    let root = dir.path();
    fs::remove_dir_all(root.join("prefix")).expect("rm");

    upgrade_cmd(root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--prefix"));
}
