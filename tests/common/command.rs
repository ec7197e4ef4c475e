use assert_cmd::Command;
use std::path::Path;

pub fn run_spangraph_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("spangraph").expect("Failed to find spangraph binary");
    cmd.envs(vec![("NO_COLOR", "1"), ("RUST_LOG", "warn")]);
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

/// Run `analyze --format json` and parse its output, whatever the exit status
pub fn analyze_json(dir: &Path, extra_args: &[&str]) -> serde_json::Value {
    let mut args = vec!["analyze", "--format", "json"];
    args.extend_from_slice(extra_args);

    let output = run_spangraph_command(dir, &args)
        .output()
        .expect("Failed to run spangraph");
    serde_json::from_slice(&output.stdout).expect("analyze did not print JSON")
}

/// The JSON node for one hash
pub fn commit<'v>(report: &'v serde_json::Value, oid: &str) -> &'v serde_json::Value {
    report["commits"]
        .as_array()
        .expect("commits array")
        .iter()
        .find(|node| node["hash"] == oid)
        .unwrap_or_else(|| panic!("commit {oid} missing from report"))
}
