use super::common::{TestEnv, write};

fn upstream_manifest(name: &str, body: &str) -> String {
    format!("---\nname: {name}\ndescription: Mirrored {name}\ncategory: mirrored\n---\n# {name}\n{body}")
}

#[test]
fn sync_mirrors_directory_sources_and_leaves_local_alone() {
    let env = TestEnv::new();
    let local = env.skill("mine", "", "Local text.\n");
    env.cmd().args(["scan", "skills"]).assert().success();
    let local_before = std::fs::read_to_string(local.join("SKILL.md")).unwrap();

    let upstream = env.path().join("upstream/ext");
    write(&upstream.join("SKILL.md"), &upstream_manifest("ext", "v1\n"));
    env.cmd()
        .args(["add-external", "ext"])
        .arg(format!("file://{}", upstream.display()))
        .assert()
        .success();

    let report = env.robot(&["sync"]);
    assert_eq!(report["skipped_local"], 1);
    assert_eq!(report["results"][0]["id"], "ext");
    assert_eq!(report["results"][0]["status"], "updated");

    let again = env.robot(&["sync"]);
    assert_eq!(again["results"][0]["status"], "up_to_date");

    let list = env.robot(&["list-external"]);
    assert_eq!(list["packages"][0]["category"], "mirrored");
    assert!(list["packages"][0]["provenance"]["synced_at"].is_string());

    assert_eq!(std::fs::read_to_string(local.join("SKILL.md")).unwrap(), local_before);
    let mine = env.robot(&["list-local"]);
    assert!(mine["packages"][0]["provenance"]["upstream_revision"].is_null());
}

#[test]
fn sync_rejection_keeps_previous_copy() {
    let env = TestEnv::new();
    let upstream = env.path().join("upstream/ext");
    write(&upstream.join("SKILL.md"), &upstream_manifest("ext", "good\n"));
    env.cmd().args(["add-external", "ext"]).arg(&upstream).assert().success();
    env.cmd().arg("sync").assert().success();

    write(&upstream.join("SKILL.md"), &upstream_manifest("ext", "TODO\n"));
    let report = env.robot(&["sync"]);
    assert_eq!(report["results"][0]["status"], "rejected");

    let cached = std::fs::read_to_string(env.root().join("cache/ext/SKILL.md")).unwrap();
    assert!(cached.contains("good"));
}

#[test]
fn sync_fetches_over_http() {
    let env = TestEnv::new();
    let server = httpmock::MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/web/SKILL.md");
        then.status(200)
            .header("ETag", "\"abc123\"")
            .body(upstream_manifest("web", "Over the wire.\n"));
    });

    env.cmd()
        .args(["add-external", "web", &server.url("/web/SKILL.md")])
        .assert()
        .success();
    let report = env.robot(&["sync"]);
    mock.assert();
    assert_eq!(report["results"][0]["status"], "updated");
    assert_eq!(report["results"][0]["to"], "abc123");

    env.cmd().args(["install", "web", "--project"]).assert().success();
    assert!(env.project_dir().join("web/SKILL.md").is_file());
}

#[test]
fn sync_reports_unreachable_upstream_without_failing() {
    let env = TestEnv::new();
    env.cmd()
        .args(["add-external", "lost", "file:///does/not/exist"])
        .assert()
        .success();
    let report = env.robot(&["sync"]);
    assert_eq!(report["results"][0]["status"], "fetch_failed");
    env.cmd().arg("sync").assert().success();
}

#[test]
fn replacing_an_external_source_requires_a_fresh_sync() {
    let env = TestEnv::new();
    let old = env.path().join("upstream/old/ext");
    let new = env.path().join("upstream/new/ext");
    write(&old.join("SKILL.md"), &upstream_manifest("ext", "Old text.\n"));
    write(&new.join("SKILL.md"), &upstream_manifest("ext", "New text.\n"));

    env.cmd().args(["add-external", "ext"]).arg(&old).assert().success();
    env.cmd().arg("sync").assert().success();
    env.cmd()
        .args(["add-external", "ext", "--force"])
        .arg(&new)
        .assert()
        .success();
    assert!(!env.root().join("cache/ext").exists());

    let refused = env.robot(&["install", "ext"]);
    assert_eq!(refused["code"], "not_found");
    assert_eq!(refused["package"], "ext");
    env.cmd().args(["install", "ext"]).assert().code(4);
    assert!(!env.user_dir().join("ext").exists());

    env.cmd().arg("sync").assert().success();
    env.cmd().args(["install", "ext"]).assert().success();
    let installed = std::fs::read_to_string(env.user_dir().join("ext/SKILL.md")).unwrap();
    assert!(installed.contains("New text."));
}
