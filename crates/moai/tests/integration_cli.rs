use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn moai() -> Command {
    let mut cmd = Command::cargo_bin("moai").unwrap();
    cmd.env_remove("MOAI_TEMPLATES_DIR")
        .env_remove("MOAI_LOG")
        .env_remove("MOAI_LOG_FORMAT");
    cmd
}

fn parse_stdout(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout is a single JSON document")
}

#[test]
fn test_help_output() {
    moai()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MoAI project installer"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_version_output() {
    moai()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "moai {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_default_output() {
    moai()
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Run 'moai --help' to see available commands.",
        ));
}

#[test]
fn test_init_json_output() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("json-app");

    let output = moai()
        .arg("init")
        .arg(&project)
        .args(["--json", "--no-backup", "--feature", "tdd"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result = parse_stdout(&output);
    assert_eq!(result["success"], true);
    assert_eq!(result["config"]["projectName"], "json-app");
    assert_eq!(result["phases"].as_array().unwrap().len(), 5);
    assert_eq!(result["nextSteps"].as_array().unwrap().len(), 3);
    assert!(result["duration"].is_u64());

    let config: Value =
        serde_json::from_str(&fs::read_to_string(project.join(".moai/config.json")).unwrap())
            .unwrap();
    assert_eq!(config["project"]["name"], "json-app");
    assert!(project.join("CLAUDE.md").is_file());
}

#[test]
fn test_init_text_summary() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("text-app");

    moai()
        .arg("init")
        .arg(&project)
        .args(["--name", "Text App", "--no-backup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MoAI installed in"))
        .stdout(predicate::str::contains("Next steps:"))
        .stderr(predicate::str::contains("[5/5] Installation complete"));

    let claude_md = fs::read_to_string(project.join("CLAUDE.md")).unwrap();
    assert!(claude_md.contains("Text App"));
}

#[test]
fn test_init_traversal_path_fails() {
    let temp = TempDir::new().unwrap();

    let output = moai()
        .current_dir(temp.path())
        .args(["init", "../../escape", "--json", "--no-backup"])
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let result = parse_stdout(&output);
    assert_eq!(result["success"], false);
    assert_eq!(result["nextSteps"].as_array().unwrap().len(), 1);
    let errors = result["errors"].as_array().unwrap();
    assert!(errors
        .last()
        .and_then(Value::as_str)
        .unwrap()
        .starts_with("Installation failed"));
}

#[test]
fn test_init_from_config_file() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("from-file");
    let config_path = temp.path().join("moai-install.json");
    let config = serde_json::json!({
        "projectPath": project,
        "projectName": "from-file",
        "mode": "team",
        "backupEnabled": false,
        "overwriteExisting": false,
        "additionalFeatures": ["docs"]
    });
    fs::write(&config_path, config.to_string()).unwrap();

    let output = moai()
        .arg("init")
        .arg("--config")
        .arg(&config_path)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result = parse_stdout(&output);
    assert_eq!(result["config"]["mode"], "team");
    assert_eq!(result["nextSteps"].as_array().unwrap().len(), 4);
    assert!(project.join(".gitignore").is_file());
}

#[test]
fn test_init_config_file_rejects_unknown_fields() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("bad.json");
    fs::write(
        &config_path,
        r#"{"projectPath": "x", "projectName": "x", "mode": "personal",
            "backupEnabled": false, "overwriteExisting": false, "colour": "blue"}"#,
    )
    .unwrap();

    moai()
        .arg("init")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_missing_templates_dir_env_uses_fallback() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("fallback-app");

    moai()
        .env("MOAI_TEMPLATES_DIR", temp.path().join("missing-templates"))
        .arg("init")
        .arg(&project)
        .args(["--json", "--no-backup"])
        .assert()
        .success();

    let claude_md = fs::read_to_string(project.join("CLAUDE.md")).unwrap();
    assert!(claude_md.contains("# fallback-app"));
    assert!(project.join(".moai/project/product.md").is_file());
}

#[test]
fn test_json_logging_keeps_stdout_pure() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("logged-app");

    let assert = moai()
        .env("MOAI_LOG_FORMAT", "json")
        .env("MOAI_LOG", "info")
        .arg("init")
        .arg(&project)
        .args(["--json", "--no-backup"])
        .assert()
        .success();

    let output = assert.get_output();
    assert_eq!(parse_stdout(&output.stdout)["success"], true);

    let stderr = String::from_utf8_lossy(&output.stderr);
    let entries: Vec<Value> = stderr
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    assert!(!entries.is_empty());
    assert!(entries
        .iter()
        .any(|entry| entry["span"]["name"] == "install.run"));
}
