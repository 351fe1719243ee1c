use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn scan_registers_local_packages_once() {
    let env = TestEnv::new();
    env.skill("alpha", "category: devops\n", "");
    env.skill("beta", "tier: 2\n", "");

    let first = env.robot(&["scan", "skills"]);
    assert_eq!(first["registered"], 2);
    let second = env.robot(&["scan", "skills"]);
    assert_eq!(second["registered"], 0);
    assert_eq!(second["unchanged"], 2);

    let index = std::fs::read_to_string(env.root().join("registry.json")).unwrap();
    assert!(index.find("\"alpha\"").unwrap() < index.find("\"beta\"").unwrap());
    assert!(index.contains("\"category\": \"devops\""));
}

#[test]
fn scan_uses_configured_local_paths() {
    let env = TestEnv::new();
    env.skill("alpha", "", "");
    env.write_config("[catalog]\nlocal_paths = [\"skills\"]\n");
    let report = env.robot(&["scan"]);
    assert_eq!(report["registered"], 1);
}

#[test]
fn scan_skips_duplicate_ids() {
    let env = TestEnv::new();
    env.skill("alpha", "", "");
    let other = env.path().join("elsewhere/alpha");
    super::common::write(
        &other.join("SKILL.md"),
        "---\nname: alpha\ndescription: shadow\n---\n",
    );
    env.cmd().args(["scan", "skills"]).assert().success();

    let report = env.robot(&["scan", "elsewhere"]);
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["results"][0]["status"], "skipped");
}

#[test]
fn scan_prune_drops_missing_directories() {
    let env = TestEnv::new();
    let dir = env.skill("gone", "", "");
    env.cmd().args(["scan", "skills"]).assert().success();
    std::fs::remove_dir_all(dir).unwrap();

    let report = env.robot(&["scan", "skills", "--prune"]);
    assert_eq!(report["pruned"][0], "gone");
    let list = env.robot(&["list"]);
    assert_eq!(list["count"], 0);
}

#[test]
fn list_partitions_by_origin() {
    let env = TestEnv::new();
    env.skill("mine", "", "");
    env.cmd().args(["scan", "skills"]).assert().success();
    env.cmd()
        .args(["add-external", "theirs", "https://example.com/theirs/SKILL.md"])
        .assert()
        .success();

    let all = env.robot(&["list"]);
    assert_eq!(all["count"], 2);

    let external = env.robot(&["list-external"]);
    assert_eq!(external["count"], 1);
    assert_eq!(external["packages"][0]["id"], "theirs");
    assert_eq!(
        external["packages"][0]["provenance"]["upstream_source"],
        "https://example.com/theirs/SKILL.md"
    );

    let local = env.robot(&["list", "--local"]);
    assert_eq!(local["count"], 1);
    assert_eq!(local["packages"][0]["provenance"]["origin"], "local");
    assert!(local["packages"][0]["provenance"]["upstream_source"].is_null());

    env.cmd()
        .args(["list-local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mine"));
}

#[test]
fn add_external_rejects_bad_ids_and_clashes() {
    let env = TestEnv::new();
    env.cmd()
        .args(["add-external", "My_Skill!", "file:///tmp/x"])
        .assert()
        .code(2);

    env.skill("mine", "", "");
    env.cmd().args(["scan", "skills"]).assert().success();
    env.cmd()
        .args(["add-external", "mine", "file:///tmp/x", "--force"])
        .assert()
        .code(3);
}

#[test]
fn remove_external_drops_cache_but_local_files_stay() {
    let env = TestEnv::new();
    let upstream = env.path().join("upstream/ext");
    super::common::write(
        &upstream.join("SKILL.md"),
        "---\nname: ext\ndescription: mirrored\n---\n",
    );
    env.cmd()
        .args(["add-external", "ext"])
        .arg(&upstream)
        .assert()
        .success();
    env.cmd().arg("sync").assert().success();
    let cache = env.root().join("cache/ext");
    assert!(cache.join("SKILL.md").is_file());

    env.cmd().args(["remove", "ext"]).assert().success();
    assert!(!cache.exists());

    let local = env.skill("mine", "", "");
    env.cmd().args(["scan", "skills"]).assert().success();
    env.cmd().args(["remove", "mine"]).assert().success();
    assert!(local.join("SKILL.md").is_file());
}
