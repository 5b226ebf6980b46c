//! CLI tests for `stepchat init`.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use stepchat::exit_codes;
use stepchat::io::config::{Config, load_config};

fn init(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stepchat"))
        .current_dir(dir)
        .arg("init")
        .args(args)
        .output()
        .expect("stepchat init")
}

#[test]
fn init_writes_default_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = init(temp.path(), &["--config", "conf/stepchat.toml"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let path = temp.path().join("conf/stepchat.toml");
    assert_eq!(load_config(&path).expect("load"), Config::default());
    let raw = fs::read_to_string(&path).expect("read");
    assert!(raw.contains("[provider]"), "{raw}");
}

#[test]
fn init_keeps_existing_config_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("stepchat.toml");
    fs::write(&path, "[provider]\nmodel = \"mine\"\n").expect("seed");

    let output = init(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--force"), "{stderr}");
    assert_eq!(load_config(&path).expect("load").provider.model, "mine");

    let output = init(temp.path(), &["--force"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load"), Config::default());
}
