use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_hetstat"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn tmp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hetstat_cli_{}_{}", std::process::id(), name))
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.starts_with("hetstat "), "unexpected: {s}");
    assert!(s.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn simulate_writes_dataset_json() {
    let out = run(&["simulate", "--n", "50", "--features", "3", "--propensity", "0.3", "--seed", "5"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON");
    let x = v.get("x").and_then(|x| x.as_array()).expect("x should be array");
    assert_eq!(x.len(), 50);
    assert!(x.iter().all(|r| r.as_array().map(|r| r.len()) == Some(3)));
    assert_eq!(v.get("y").and_then(|x| x.as_array()).unwrap().len(), 50);

    let d = v.get("d").and_then(|x| x.as_array()).unwrap();
    assert!(d.iter().all(|t| matches!(t.as_u64(), Some(0 | 1))));
    let p = v.get("propensity").and_then(|x| x.as_array()).unwrap();
    assert!(p.iter().all(|p| p.as_f64() == Some(0.3)));
}

#[test]
fn simulate_is_deterministic_and_roundtrips_through_blp() {
    let a = run(&["simulate", "--n", "300", "--seed", "9"]);
    let b = run(&["simulate", "--n", "300", "--seed", "9"]);
    assert!(a.status.success() && b.status.success());
    assert_eq!(a.stdout, b.stdout);

    let path = tmp_path("sim.json");
    let out = run(&["simulate", "--n", "300", "--seed", "9", "--output", path.to_string_lossy().as_ref()]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());

    let out = run(&["blp", "--input", path.to_string_lossy().as_ref()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v.get("n_obs").and_then(|x| x.as_u64()), Some(300));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn simulate_rejects_invalid_propensity() {
    let out = run(&["simulate", "--propensity", "1.5"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("propensity"));
}
