//! Integration tests for the wl CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get a wl command with a clean environment
fn wl() -> Command {
    let mut cmd = Command::cargo_bin("wl").unwrap();
    cmd.env_remove("WORKLINE_LOG")
        .env_remove("WORKLINE_INDEX_TTL")
        .env_remove("WORKLINE_RELATION_TTL")
        .env("WORKLINE_AUTHOR", "tester");
    cmd
}

fn write_doc(tmp: &TempDir, dir: &str, id: &str, fields: &str) {
    fs::write(
        tmp.path().join(dir).join(format!("{}.md", id)),
        format!("---\nid: {}\n{}---\n\nDescription of {}.\n", id, fields, id),
    )
    .unwrap();
}

/// Helper to create an initialized project
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    wl().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Project with one epic, one issue, two tasks and a PR
fn setup_populated_project() -> TempDir {
    let tmp = setup_test_project();
    write_doc(&tmp, "epics", "EP-0001", "title: Authentication\nstatus: active\n");
    write_doc(&tmp, "issues", "ISS-0001", "title: Login page\nepic_id: EP-0001\n");
    write_doc(
        &tmp,
        "tasks",
        "TSK-0001",
        "title: Login form\nissue_id: ISS-0001\nassignee: alice\npriority: high\n",
    );
    write_doc(
        &tmp,
        "tasks",
        "TSK-0002",
        "title: Form validation\nissue_id: ISS-0001\ndependencies: [TSK-0001]\n",
    );
    write_doc(&tmp, "prs", "PR-0001", "title: Add login form\ntask_id: TSK-0001\n");
    wl().current_dir(tmp.path())
        .args(["index", "rebuild"])
        .assert()
        .success();
    tmp
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();

    wl().current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized workline project"));

    assert!(tmp.path().join(".workline/config.yaml").exists());
    assert!(tmp.path().join("epics").is_dir());
    assert!(tmp.path().join("issues").is_dir());
    assert!(tmp.path().join("tasks").is_dir());
    assert!(tmp.path().join("prs").is_dir());
}

#[test]
fn test_init_twice_suggests_force() {
    let tmp = setup_test_project();

    wl().current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_commands_outside_project_fail() {
    let tmp = TempDir::new().unwrap();

    wl().current_dir(tmp.path())
        .args(["list", "task"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not a workline project"));
}

// ============================================================================
// Index maintenance
// ============================================================================

#[test]
fn test_index_rebuild_and_status() {
    let tmp = setup_populated_project();
    assert!(tmp.path().join(".workline/index.json").exists());

    wl().current_dir(tmp.path())
        .args(["index", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total items:"))
        .stdout(predicate::str::contains("5"));
}

#[test]
fn test_index_rebuild_json() {
    let tmp = setup_populated_project();

    let output = wl()
        .current_dir(tmp.path())
        .args(["index", "rebuild", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["itemsIndexed"], 5);
    assert_eq!(stats["persisted"], true);
}

#[test]
fn test_validate_healthy_index_exits_zero() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["index", "validate"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("healthy"));
}

#[test]
fn test_validate_reports_issues_with_exit_one() {
    let tmp = setup_populated_project();
    fs::remove_file(tmp.path().join("tasks/TSK-0002.md")).unwrap();
    write_doc(&tmp, "issues", "ISS-0002", "title: Signup\nepic_id: EP-0001\n");

    wl().current_dir(tmp.path())
        .args(["index", "validate"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("TSK-0002"))
        .stdout(predicate::str::contains("ISS-0002"))
        .stdout(predicate::str::contains("wl index repair"));

    // Nothing was repaired
    wl().current_dir(tmp.path())
        .args(["index", "validate"])
        .assert()
        .code(1);
}

#[test]
fn test_validate_repair_fixes_index() {
    let tmp = setup_populated_project();
    fs::remove_file(tmp.path().join("tasks/TSK-0002.md")).unwrap();

    wl().current_dir(tmp.path())
        .args(["index", "validate", "--repair"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Removed orphaned task TSK-0002"))
        .stdout(predicate::str::contains("Index repaired"));

    wl().current_dir(tmp.path())
        .args(["index", "validate"])
        .assert()
        .code(0);

    wl().current_dir(tmp.path())
        .args(["show", "TSK-0002"])
        .assert()
        .code(1);
}

#[test]
fn test_repair_without_index_rebuilds() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["index", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Index cleared"));
    assert!(!tmp.path().join(".workline/index.json").exists());

    wl().current_dir(tmp.path())
        .args(["index", "repair"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Rebuilt index"));
    assert!(tmp.path().join(".workline/index.json").exists());
}

#[test]
fn test_repair_that_cannot_write_index_exits_two() {
    let tmp = setup_populated_project();
    let index_path = tmp.path().join(".workline/index.json");
    let _ = fs::remove_file(&index_path);
    fs::create_dir(&index_path).unwrap();
    fs::write(index_path.join("keep"), "").unwrap();

    wl().current_dir(tmp.path())
        .args(["index", "repair"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Rebuilt index"))
        .stdout(predicate::str::contains("Index still has"));

    wl().current_dir(tmp.path())
        .args(["index", "validate", "--repair", "--format", "json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"repaired\": false"));
}

#[test]
fn test_validate_missing_project_root_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");

    wl().args(["index", "validate", "--project"])
        .arg(&missing)
        .assert()
        .code(3);
}

#[test]
fn test_corrupt_index_is_rebuilt_on_load() {
    let tmp = setup_populated_project();
    fs::write(tmp.path().join(".workline/index.json"), "{ not json").unwrap();

    wl().current_dir(tmp.path())
        .args(["list", "task", "--format", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TSK-0001"))
        .stdout(predicate::str::contains("TSK-0002"));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_list_filters() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["list", "task", "--assignee", "alice", "--format", "id"])
        .assert()
        .success()
        .stdout("TSK-0001\n");

    wl().current_dir(tmp.path())
        .args(["list", "epic", "--status", "active", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EP-0001\tAuthentication\tactive"));

    wl().current_dir(tmp.path())
        .args(["list", "task", "--priority", "critical"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks found"));
}

#[test]
fn test_list_rejects_unknown_type() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["list", "widget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown item type"));
}

#[test]
fn test_show_json() {
    let tmp = setup_populated_project();

    let output = wl()
        .current_dir(tmp.path())
        .args(["show", "ISS-0001", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let item: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(item["id"], "ISS-0001");
    assert_eq!(item["type"], "issue");
    assert_eq!(item["epicId"], "EP-0001");
    assert_eq!(
        item["children"]["tasks"],
        serde_json::json!(["TSK-0001", "TSK-0002"])
    );
}

#[test]
fn test_tree_shows_descendants() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["tree", "EP-0001", "--format", "id"])
        .assert()
        .success()
        .stdout("EP-0001\nISS-0001\nTSK-0001\nTSK-0002\nPR-0001\n");

    wl().current_dir(tmp.path())
        .args(["tree", "TSK-0001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EP-0001"))
        .stdout(predicate::str::contains("PR-0001"));
}

#[test]
fn test_related_lists_dependents() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["related", "TSK-0001", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dependent\tTSK-0002"));
}

#[test]
fn test_overview_json() {
    let tmp = setup_populated_project();

    let output = wl()
        .current_dir(tmp.path())
        .args(["overview", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let overview: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(overview["totalItems"], 5);
    assert_eq!(overview["byType"]["task"], 2);
    assert_eq!(overview["epics"][0]["id"], "EP-0001");
}

// ============================================================================
// Transitions
// ============================================================================

#[test]
fn test_transitions_lists_next_states() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["transitions", "TSK-0001", "--format", "id"])
        .assert()
        .success()
        .stdout("active\narchived\nwon_t_do\n");
}

#[test]
fn test_transition_updates_document_and_index() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["transition", "TSK-0001", "active"])
        .assert()
        .success();

    let content = fs::read_to_string(tmp.path().join("tasks/TSK-0001.md")).unwrap();
    assert!(content.contains("status: active"));
    assert!(content.contains("transitioned_by: tester"));
    assert!(content.contains("Description of TSK-0001."));

    wl().current_dir(tmp.path())
        .args(["list", "task", "--status", "active", "--format", "id"])
        .assert()
        .success()
        .stdout("TSK-0001\n");

    wl().current_dir(tmp.path())
        .args(["index", "validate"])
        .assert()
        .code(0);
}

#[test]
fn test_transition_not_allowed_exits_one() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["transition", "TSK-0001", "done"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no such transition"));

    let content = fs::read_to_string(tmp.path().join("tasks/TSK-0001.md")).unwrap();
    assert!(!content.contains("state_metadata"));
}

#[test]
fn test_wont_do_requires_reason() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["transition", "TSK-0002", "won_t_do"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing reason"));

    wl().current_dir(tmp.path())
        .args([
            "transition",
            "TSK-0002",
            "won_t_do",
            "--reason",
            "duplicate",
            "--actor",
            "alice",
        ])
        .assert()
        .success();

    let content = fs::read_to_string(tmp.path().join("tasks/TSK-0002.md")).unwrap();
    assert!(content.contains("resolution: won_t_do"));
    assert!(content.contains("transitioned_by: alice"));
    assert!(content.contains("reason: duplicate"));
}

#[test]
fn test_open_children_block_without_force() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["transition", "EP-0001", "completed"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("child ISS-0001 is still planning"));

    let content = fs::read_to_string(tmp.path().join("epics/EP-0001.md")).unwrap();
    assert!(content.contains("status: active"));

    wl().current_dir(tmp.path())
        .args(["transition", "EP-0001", "completed", "--force"])
        .assert()
        .success();

    let content = fs::read_to_string(tmp.path().join("epics/EP-0001.md")).unwrap();
    assert!(content.contains("status: completed"));
}

#[test]
fn test_transition_dry_run_writes_nothing() {
    let tmp = setup_populated_project();
    let before = fs::read_to_string(tmp.path().join("tasks/TSK-0001.md")).unwrap();

    wl().current_dir(tmp.path())
        .args(["transition", "TSK-0001", "active", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    let after = fs::read_to_string(tmp.path().join("tasks/TSK-0001.md")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_transition_unknown_item() {
    let tmp = setup_populated_project();

    wl().current_dir(tmp.path())
        .args(["transition", "TSK-0404", "active"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No item with id"));
}

// ============================================================================
// Completions
// ============================================================================

#[test]
fn test_completions_bash() {
    wl().args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wl"));
}
