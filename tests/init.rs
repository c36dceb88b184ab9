use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_codeseek"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "codeseek init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".codeseek.toml");
    assert!(config_path.exists(), ".codeseek.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[embedding]"));
    assert!(content.contains("[index]"));

    // Every option is commented out, so parsing yields the defaults
    let config: codeseek_core::CodeseekConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.index.window, 50);
    assert_eq!(config.embedding.model, "nomic-embed-text");
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".codeseek.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_codeseek"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".codeseek.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn search_without_index_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_codeseek"))
        .args(["search", "connection pool"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("codeseek index"), "stderr: {stderr}");
}

#[test]
fn stats_reads_saved_index() {
    let dir = tempfile::tempdir().unwrap();
    let index_dir = dir.path().join(".codeseek");
    std::fs::create_dir_all(&index_dir).unwrap();
    let json = r#"{
        "version": 1,
        "documents": {
            "1": {"id": 1, "path": "a.go", "fullContent": "package a", "chunkIds": [2]}
        },
        "chunks": {
            "2": {"id": 2, "documentId": 1, "startLine": 1, "endLine": 1, "content": "package a", "vector": [0.1, 0.2, 0.3]}
        }
    }"#;
    std::fs::write(index_dir.join("index.json"), json).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_codeseek"))
        .args(["stats", "--format", "json"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "codeseek stats failed: {}", String::from_utf8_lossy(&output.stderr));
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["totalDocuments"], 1);
    assert_eq!(stats["totalChunks"], 1);
    assert_eq!(stats["dimensions"][0], 3);
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".codeseek.toml"),
        "[index]\nwindow = 5\noverlap = 5\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_codeseek"))
        .arg("stats")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("overlap"), "stderr: {stderr}");
}
