use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn dimplot() -> Command {
    let mut cmd = Command::cargo_bin("dimplot").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn data_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Time,Value,Group").unwrap();
    writeln!(file, "1,2.0,a").unwrap();
    writeln!(file, "2,4.1,b").unwrap();
    file
}

#[test]
fn test_help_alone_succeeds() {
    dimplot()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("HELP MENU"))
        .stdout(predicate::str::contains("-d4"));
}

#[test]
fn test_help_with_other_flags_fails() {
    dimplot()
        .args(["-h", "-i", "data.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("-h must be the only argument"))
        .stdout(predicate::str::contains("HELP MENU").not());
}

#[test]
fn test_missing_axis_fails() {
    let file = data_file();
    dimplot()
        .args(["-i", file.path().to_str().unwrap(), "-g", "scatter"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("x axis (-d1)"));
}

#[test]
fn test_unknown_column_fails() {
    let file = data_file();
    dimplot()
        .args([
            "-i",
            file.path().to_str().unwrap(),
            "-d1",
            "Time",
            "-d2",
            "Price",
            "-g",
            "line",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Column 'Price' does not exist"));
}

#[test]
fn test_unsupported_plot_kind_fails() {
    let file = data_file();
    dimplot()
        .args([
            "-i",
            file.path().to_str().unwrap(),
            "-d1",
            "time",
            "-d2",
            "value",
            "-g",
            "pie",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported graph type 'pie'"));
}

#[test]
fn test_anomalies_are_reported() {
    let file = data_file();
    dimplot()
        .args([
            "stray",
            "-i",
            file.path().to_str().unwrap(),
            "-z",
            "-d1",
            "Time",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid argument: stray"))
        .stderr(predicate::str::contains("No valid action specified for flag '-z'"))
        .stderr(predicate::str::contains("Column '' does not exist"));
}

#[test]
fn test_anomalies_are_reported_with_quiet_logging() {
    let file = data_file();
    dimplot()
        .env("RUST_LOG", "error")
        .args(["stray", "-i", file.path().to_str().unwrap(), "-z"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid argument: stray"))
        .stderr(predicate::str::contains("No valid action specified for flag '-z'"))
        .stderr(predicate::str::contains("x axis (-d1)"));
}

#[test]
fn test_excel_input_is_rejected() {
    dimplot()
        .args(["-i", "table.xlsx", "-d1", "a", "-d2", "b", "-g", "box"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported input file"));
}

#[test]
fn test_invalid_output_path_fails_before_rendering() {
    let file = data_file();
    let dir = tempfile::tempdir().unwrap();
    dimplot()
        .current_dir(dir.path())
        .args([
            "-i",
            file.path().to_str().unwrap(),
            "-d1",
            "Time",
            "-d2",
            "Value",
            "-g",
            "scatter",
            "-o",
            "plots/",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Filepath"));
    assert!(!dir.path().join("plots").exists());
}
