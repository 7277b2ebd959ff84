//! Integration tests for the CLI interface
//!
//! Runs the binary against a throwaway configuration so nothing from the
//! host's config directory leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use nightshift::testing::fixtures::write_raw_frame;

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("nightshift.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[paths]
photpath = "{root}"

[observatory]
name = "Palomar"
latitude_deg = 33.3563
longitude_deg = -116.865

[backup]
phot_backup_file = "{root}/backup.txt"
"#,
            root = dir.display()
        ),
    )
    .unwrap();
    path
}

fn nightshift(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nightshift").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("NIGHTSHIFT_CONFIG")
        .env_remove("NIGHTSHIFT_SLACK_TOKEN")
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("nightshift").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_run_help_lists_flags() {
    let mut cmd = Command::cargo_bin("nightshift").unwrap();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--nocopy"))
        .stdout(predicate::str::contains("--one-pass"))
        .stdout(predicate::str::contains("--proc-na"));
}

#[test]
fn test_invalid_command_fails() {
    let mut cmd = Command::cargo_bin("nightshift").unwrap();
    cmd.arg("nonsense")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_classify_science_frame() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let night = temp.path().join("20240503");
    std::fs::create_dir_all(&night).unwrap();
    let frame = night.join("rc20240503_04_10_00.fits");
    write_raw_frame(&frame, "SCIENCE", "ZTF24aaabcde", "r", 120.0).unwrap();

    nightshift(&config)
        .arg("classify")
        .arg(&frame)
        .assert()
        .success()
        .stdout(predicate::str::contains("science"))
        .stdout(predicate::str::contains("ReduceAndReport"))
        .stdout(predicate::str::contains("cosmic=true"));
}

#[test]
fn test_classify_na_depends_on_flag() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let frame = temp.path().join("rc20240503_04_20_00.fits");
    write_raw_frame(&frame, "NA", "unknown", "r", 10.0).unwrap();

    nightshift(&config)
        .arg("classify")
        .arg(&frame)
        .assert()
        .success()
        .stdout(predicate::str::contains("\tna\tSkip\t"));

    nightshift(&config)
        .args(["classify", "--proc-na"])
        .arg(&frame)
        .assert()
        .success()
        .stdout(predicate::str::contains("\tna\tReduceOnly { push_reference: false }\t"));
}

#[test]
fn test_classify_unreadable_file() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let bogus = temp.path().join("rc20240503_04_30_00.fits");
    std::fs::write(&bogus, b"not a fits file").unwrap();

    nightshift(&config)
        .arg("classify")
        .arg(&bogus)
        .assert()
        .success()
        .stdout(predicate::str::contains("unreadable"));
}

#[test]
fn test_classify_requires_files() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    nightshift(&config).arg("classify").assert().failure();
}

#[test]
fn test_gzip_compresses_and_records_backup() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let night = temp.path().join("20240503");
    std::fs::create_dir_all(&night).unwrap();
    write_raw_frame(
        &night.join("rc20240503_04_10_00.fits"),
        "SCIENCE",
        "ZTF24aaabcde",
        "r",
        120.0,
    )
    .unwrap();

    nightshift(&config)
        .arg("gzip")
        .arg("--photdir")
        .arg(&night)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 raw, 0 reduced"));

    assert!(night.join("rc20240503_04_10_00.fits.gz").exists());
    assert_eq!(
        std::fs::read_to_string(temp.path().join("backup.txt")).unwrap(),
        "20240503\n"
    );
}

#[test]
fn test_missing_config_file_is_reported() {
    let temp = TempDir::new().unwrap();
    nightshift(&temp.path().join("absent.toml"))
        .arg("sunrise")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
