use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn chemsearch(archive: &Path) -> Command {
    let mut cmd = Command::cargo_bin("chemsearch").expect("binary");
    for var in [
        "CHEMSEARCH_ARCHIVE_DIR",
        "CHEMSEARCH_SOURCE",
        "CHEMSEARCH_MIRROR_FROM",
        "CHEMSEARCH_OWNERSHIP",
        "CHEMSEARCH_PER_PAGE",
        "CHEMSEARCH_CONFIG",
    ] {
        cmd.env_remove(var);
    }
    cmd.arg("--archive").arg(archive);
    cmd
}

fn run_json(archive: &Path, args: &[&str]) -> Value {
    let output = chemsearch(archive)
        .arg("--json")
        .args(args)
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn seed_archive() -> tempfile::TempDir {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    fs::create_dir_all(root.join("solvents")).expect("mkdir");
    fs::create_dir_all(root.join("acids")).expect("mkdir");
    fs::write(root.join("solvents/ethanol.smi"), "CCO\n").expect("write");
    fs::write(root.join("solvents/propanol.smi"), "CCCO\n").expect("write");
    fs::write(root.join("acids/acetic.smi"), "CC(=O)O\n").expect("write");
    fs::write(root.join("acids/broken.smi"), "C1CC\n").expect("write");
    temp
}

fn names(page: &Value) -> Vec<String> {
    page["hits"]
        .as_array()
        .expect("hits")
        .iter()
        .map(|hit| hit["record"]["name"].as_str().expect("name").to_string())
        .collect()
}

#[test]
fn queries_need_a_rebuild_first() {
    let temp = seed_archive();
    chemsearch(temp.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(contains("run `chemsearch rebuild` first"));

    let status = run_json(temp.path(), &["status"]);
    assert_eq!(status["status"], "");
    assert_eq!(status["is_complete"], true);
}

#[test]
fn rebuild_then_browse_and_search() {
    let temp = seed_archive();
    let root = temp.path();

    let outcome = run_json(root, &["rebuild", "--user", "alice"]);
    assert_eq!(outcome["stats"]["valid"], 3);
    assert_eq!(outcome["stats"]["invalid"], 1);

    let status = run_json(root, &["status"]);
    assert_eq!(status["status"], "Completed rebuild contains 3 molecules.");
    assert_eq!(status["is_complete"], true);

    let page = run_json(root, &["list", "--sort", "alphabetical"]);
    assert_eq!(names(&page), vec!["acetic", "ethanol", "propanol"]);
    assert_eq!(page["filterable"]["category"]["solvents"], 2);

    let filtered = run_json(root, &["list", "--filter", "category=acids"]);
    assert_eq!(names(&filtered), vec!["acetic"]);

    let invalid = run_json(root, &["list", "--invalid"]);
    assert_eq!(invalid[0]["name"], "broken");
    assert_eq!(invalid[0]["valid"], false);

    let similar = run_json(root, &["search", "CCO", "--type", "similarity"]);
    assert_eq!(names(&similar)[0], "ethanol");
    assert_eq!(similar["hits"][0]["score"], 1.0);

    let hydroxyls = run_json(
        root,
        &["search", "[OD1]", "--type", "substructure", "--query-type", "smarts"],
    );
    assert_eq!(hydroxyls["total"], 3);

    let key = page["hits"][0]["record"]["identity"]
        .as_str()
        .expect("identity")
        .to_string();
    let shown = run_json(root, &["show", &key]);
    assert_eq!(shown["molecule"]["name"], "acetic");
    assert_eq!(shown["files"], serde_json::json!(["acetic.smi", "broken.smi"]));

    let history = run_json(root, &["history"]);
    assert_eq!(history.as_array().expect("history").len(), 1);
    assert_eq!(history[0]["initiated_by"], "alice");
    assert_eq!(history[0]["completion"], "succeeded");
}

#[test]
fn invalid_searches_are_rejected() {
    let temp = seed_archive();
    run_json(temp.path(), &["rebuild"]);

    chemsearch(temp.path())
        .args(["search", "[OD1]", "--type", "similarity", "--query-type", "smarts"])
        .assert()
        .failure()
        .stderr(contains("Use SMILES rather than SMARTS"));

    chemsearch(temp.path())
        .args(["search", "CCO", "--type", "exact"])
        .assert()
        .failure()
        .stderr(contains("Unrecognized search type."));

    chemsearch(temp.path())
        .args(["list", "--page", "9"])
        .assert()
        .failure();
}

#[test]
fn export_writes_sd_bundle() {
    let temp = seed_archive();
    run_json(temp.path(), &["rebuild"]);

    let out = temp.path().join("bundle.sdf");
    chemsearch(temp.path())
        .arg("export")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Exported 3 molecules"));

    let sdf = fs::read_to_string(&out).expect("export file");
    assert_eq!(sdf.matches("$$$$").count(), 3);
    assert_eq!(sdf.matches("M  END").count(), 3);
}

#[test]
fn saved_queries_run_by_name() {
    let temp = seed_archive();
    let config = temp.path().join("chemsearch.toml");
    fs::write(
        &config,
        r#"
[[queries]]
name = "carbonyls"
query = "C=O"
search_type = "substructure"
"#,
    )
    .expect("write config");
    run_json(temp.path(), &["rebuild"]);

    let config_arg = config.to_string_lossy().to_string();
    let listed = run_json(temp.path(), &["--config", &config_arg, "queries"]);
    assert_eq!(listed[0]["name"], "carbonyls");

    let page = run_json(temp.path(), &["--config", &config_arg, "queries", "carbonyls"]);
    assert_eq!(names(&page), vec!["acetic"]);

    let cleared = run_json(temp.path(), &["clear-rebuilds"]);
    assert_eq!(cleared["cleared"], serde_json::json!([]));
}
