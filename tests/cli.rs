use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/order-fulfillment.json")
}

#[test]
fn check_reports_counts() -> Result<(), Box<dyn std::error::Error>> {
    let fixture = fixture();
    assert!(fixture.exists(), "fixture graph should exist");

    let mut cmd = Command::cargo_bin("goalgraph")?;
    cmd.arg("check").arg("--input").arg(&fixture);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("4 nodes, 3 edges"));

    Ok(())
}

#[test]
fn check_writes_normalized_document() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let output_path = tmp.path().join("normalized.json");

    let mut cmd = Command::cargo_bin("goalgraph")?;
    cmd.arg("check")
        .arg("-i")
        .arg(fixture())
        .arg("-o")
        .arg(&output_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Normalized graph"));

    let contents = fs::read_to_string(&output_path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    assert_eq!(value["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(value["edges"][1]["data"]["points"][0]["id"], "bend");

    Ok(())
}

#[test]
fn check_rejects_dangling_edges() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let input_path = tmp.path().join("dangling.json");
    fs::write(
        &input_path,
        r#"{"nodes":[],"edges":[{"id":"e","source":"x","sourceHandle":"bottom","target":"y","targetHandle":"top"}]}"#,
    )?;

    let mut cmd = Command::cargo_bin("goalgraph")?;
    cmd.arg("check").arg("-i").arg(&input_path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("missing node"));

    Ok(())
}

#[test]
fn check_reads_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("goalgraph")?;
    cmd.arg("check")
        .arg("-i")
        .arg("-")
        .arg("-o")
        .arg("-")
        .write_stdin(r#"{"nodes":[],"edges":[]}"#);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"nodes\": []"));

    Ok(())
}

#[test]
fn path_prints_linear_route() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("goalgraph")?;
    cmd.arg("path")
        .arg("-i")
        .arg(fixture())
        .arg("--edge")
        .arg("pick-to-and")
        .arg("--quiet");

    cmd.assert()
        .success()
        .stdout(predicate::str::diff("M200,300 L200,200 L400,180\n"));

    Ok(())
}

#[test]
fn path_can_override_algorithm() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("goalgraph")?;
    cmd.arg("path")
        .arg("-i")
        .arg(fixture())
        .arg("--edge")
        .arg("pick-to-and")
        .arg("--algorithm")
        .arg("straight")
        .arg("-q");

    cmd.assert()
        .success()
        .stdout(predicate::str::diff("M200,300 L400,180\n"));

    Ok(())
}

#[test]
fn path_fails_for_unknown_edge() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("goalgraph")?;
    cmd.arg("path")
        .arg("-i")
        .arg(fixture())
        .arg("--edge")
        .arg("nope")
        .arg("-q");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("edge 'nope' not found"));

    Ok(())
}
