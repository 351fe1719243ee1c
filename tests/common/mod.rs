//! Shared helpers for integration suites.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated registry, skills tree and pair of install targets.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn root(&self) -> PathBuf {
        self.path().join("registry")
    }

    pub fn skills(&self) -> PathBuf {
        self.path().join("skills")
    }

    pub fn user_dir(&self) -> PathBuf {
        self.path().join("user-skills")
    }

    pub fn project_dir(&self) -> PathBuf {
        self.path().join("project/.claude/skills")
    }

    /// `skillctl` with every location pointed inside the temp dir.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("skillctl").unwrap();
        cmd.current_dir(self.path())
            .env("SKILLCTL_ROOT", self.root())
            .env("SKILLCTL_CONFIG", self.path().join("config.toml"))
            .env("SKILLCTL_USER_DIR", self.user_dir())
            .env("SKILLCTL_PROJECT_DIR", self.project_dir())
            .env("SKILLCTL_SYNC_BACKOFF_MS", "1")
            .env_remove("SKILLCTL_LOCAL_PATHS")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--robot` and parse stdout as JSON.
    pub fn robot(&self, args: &[&str]) -> serde_json::Value {
        let output = self.cmd().arg("--robot").args(args).output().unwrap();
        serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
            panic!(
                "stdout of {args:?} is not JSON ({err}): {}",
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }

    /// Write `skills/<name>/SKILL.md` and return the package directory.
    pub fn skill(&self, name: &str, frontmatter: &str, body: &str) -> PathBuf {
        let dir = self.skills().join(name);
        write(
            &dir.join("SKILL.md"),
            &format!("---\nname: {name}\ndescription: The {name} skill\n{frontmatter}---\n# {name}\n{body}"),
        );
        dir
    }

    pub fn write_config(&self, toml: &str) {
        write(&self.path().join("config.toml"), toml);
    }
}

pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
