// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn write_contract(dir: &Path, tool_id: &str, depends_on: &[&str], dependencies: &[&str]) {
    let list = |items: &[&str]| items.join(", ");
    let yaml = format!("tool_id: {tool_id}\ndepends_on: [{}]\ndependencies: [{}]\n", list(depends_on), list(dependencies));
    std::fs::write(dir.join(format!("{}.yaml", tool_id.to_lowercase())), yaml).unwrap();
}

fn pipeline() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_contract(dir.path(), "A", &[], &[]);
    write_contract(dir.path(), "B", &["A"], &["neo4j-write"]);
    write_contract(dir.path(), "C", &["A"], &["neo4j-write"]);
    write_contract(dir.path(), "D", &["A"], &[]);
    dir
}

fn toolplan(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("toolplan").unwrap();
    cmd.env_remove("TOOLPLAN_CONFIG").arg("--contracts-dir").arg(dir.path());
    cmd
}

#[test]
fn test_graph_lists_levels() {
    let dir = pipeline();
    toolplan(&dir)
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dependency graph: 4 tools, 2 levels"))
        .stdout(predicate::str::contains("Critical path"));
}

#[test]
fn test_graph_json_for_required_tools() {
    let dir = pipeline();
    let output = toolplan(&dir).args(["--json", "graph", "B"]).output().unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graph["levels"]["A"], 0);
    assert_eq!(graph["levels"]["B"], 1);
    assert!(graph["levels"].get("C").is_none());
}

#[test]
fn test_conflicts_report_database_writers() {
    let dir = pipeline();
    toolplan(&dir)
        .arg("conflicts")
        .assert()
        .success()
        .stdout(predicate::str::contains("B || D"))
        .stdout(predicate::str::contains("both write to neo4j"));
}

#[test]
fn test_plan_with_balance_strategy() {
    let dir = pipeline();
    toolplan(&dir)
        .args(["plan", "B", "C", "D", "--strategy", "balance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule (balance_resources)"));
}

#[test]
fn test_unknown_strategy_fails() {
    let dir = pipeline();
    toolplan(&dir)
        .args(["plan", "B", "--strategy", "throughput"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown optimization strategy"));
}

#[test]
fn test_analyze_workflow_file() {
    let dir = pipeline();
    let workflow = dir.path().join("workflow.yml.txt");
    std::fs::write(&workflow, "steps:\n  - tool_id: A\n  - tool_id: D\n    depends_on: [A]\n  - tool_id: E\n    depends_on: [A]\n").unwrap();

    toolplan(&dir)
        .args(["--json", "analyze"])
        .arg(&workflow)
        .args(["--strategy", "makespan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"can_parallelize\""))
        .stdout(predicate::str::contains("\"scheduled_tasks\""));
}

#[test]
fn test_missing_contracts_dir_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    Command::cargo_bin("toolplan")
        .unwrap()
        .env_remove("TOOLPLAN_CONFIG")
        .arg("--contracts-dir")
        .arg(&missing)
        .arg("profile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load contracts"));
}

#[test]
fn test_rejected_contract_is_reported() {
    let dir = pipeline();
    std::fs::write(dir.path().join("e.yaml"), "tool_id: E\ndepends_on: [A, A]\n").unwrap();

    toolplan(&dir)
        .args(["plan", "D", "E"])
        .assert()
        .success()
        .stdout(predicate::str::contains("required tool E: contract rejected, skipped"))
        .stdout(predicate::str::contains("e.yaml"));

    toolplan(&dir).arg("profile").assert().success().stdout(predicate::str::contains("more than once"));
}

#[test]
fn test_config_prints_defaults() {
    let dir = pipeline();
    toolplan(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("utilization_samples = 100"))
        .stdout(predicate::str::contains("identity_service"));
}
