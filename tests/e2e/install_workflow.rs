use predicates::prelude::*;

use super::common::TestEnv;

fn registered(env: &TestEnv) {
    env.skill("foo", "category: web\n", "Version one.\n");
    env.skill("bar", "tier: 3\nrequires: [foo]\n", "");
    env.cmd().args(["scan", "skills"]).assert().success();
}

#[test]
fn install_then_reinstall_needs_force() {
    let env = TestEnv::new();
    registered(&env);

    env.cmd().args(["install", "foo"]).assert().success();
    let installed = env.user_dir().join("foo");
    assert!(installed.join("SKILL.md").is_file());
    assert!(installed.join(".skillctl-install.json").is_file());

    env.cmd()
        .args(["install", "foo"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--force"));

    std::fs::write(installed.join("extra.md"), "stale").unwrap();
    env.skill("foo", "category: web\n", "Version two.\n");
    env.cmd().args(["install", "foo", "--force"]).assert().success();

    let manifest = std::fs::read_to_string(installed.join("SKILL.md")).unwrap();
    assert!(manifest.contains("Version two."));
    assert!(!installed.join("extra.md").exists());
}

#[test]
fn project_target_is_separate() {
    let env = TestEnv::new();
    registered(&env);
    env.cmd().args(["install", "foo", "--project"]).assert().success();
    assert!(env.project_dir().join("foo/SKILL.md").is_file());
    assert!(!env.user_dir().join("foo").exists());
}

#[test]
fn invalid_package_install_exits_two() {
    let env = TestEnv::new();
    env.skill("draft", "", "TBD\n");
    env.cmd().args(["scan", "skills"]).assert().success();
    env.cmd().args(["install", "draft"]).assert().code(2);
    assert!(!env.user_dir().join("draft").exists());
}

#[test]
fn install_all_honors_filters_and_order() {
    let env = TestEnv::new();
    registered(&env);
    env.skill("zed", "", "");
    env.cmd().args(["scan", "skills"]).assert().success();

    let all = env.robot(&["install", "--all"]);
    let order: Vec<&str> = all["order"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["foo", "bar", "zed"]);
    assert_eq!(all["installed"], 3);

    let filtered = env.robot(&["install", "--all", "--project", "--tier", "2", "--category", "web"]);
    assert_eq!(filtered["installed"], 1);
    assert!(env.project_dir().join("foo").is_dir());
    assert!(!env.project_dir().join("bar").exists());
    assert!(!env.project_dir().join("zed").exists());
}

#[test]
fn install_all_failure_exits_one() {
    let env = TestEnv::new();
    registered(&env);
    env.cmd().args(["install", "foo"]).assert().success();
    env.cmd()
        .args(["install", "--all"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("foo"));
    assert!(env.user_dir().join("bar").is_dir());
}

#[test]
fn uninstall_leaves_foreign_directories() {
    let env = TestEnv::new();
    registered(&env);
    env.cmd().args(["install", "foo"]).assert().success();
    env.cmd().args(["uninstall", "foo"]).assert().success();
    assert!(!env.user_dir().join("foo").exists());

    let foreign = env.user_dir().join("handmade");
    super::common::write(&foreign.join("SKILL.md"), "mine");
    env.cmd().args(["uninstall", "handmade"]).assert().failure();
    assert!(foreign.join("SKILL.md").is_file());

    env.cmd().args(["uninstall", "../user-skills"]).assert().code(2);
    assert!(env.user_dir().is_dir());
}

#[test]
fn install_all_installs_around_a_requirement_cycle() {
    let env = TestEnv::new();
    env.skill("ping", "requires: [pong]\n", "");
    env.skill("pong", "requires: [ping]\n", "");
    env.skill("solo", "", "Stands alone.\n");
    env.cmd().args(["scan", "skills"]).assert().success();

    let output = env
        .cmd()
        .args(["--robot", "install", "--all"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["installed"], 1);
    assert_eq!(report["failed"][0]["id"], "ping");
    assert_eq!(report["failed"][0]["code"], "graph_cycle");
    assert_eq!(report["failed"][1]["id"], "pong");
    assert!(env.user_dir().join("solo/SKILL.md").is_file());
    assert!(!env.user_dir().join("ping").exists());
}
