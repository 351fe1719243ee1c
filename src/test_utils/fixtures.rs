use std::path::PathBuf;

use tempfile::TempDir;

use crate::core::package::{Package, Provenance};
use crate::storage::registry::RegistryStore;
use crate::utils::fs::hash_dir;

/// Manifest text with the given name and description.
#[must_use]
pub fn skill_manifest(name: &str, description: &str, body: &str) -> String {
    skill_manifest_with(name, description, "", body)
}

/// Manifest text with extra frontmatter lines (each ending in `\n`).
#[must_use]
pub fn skill_manifest_with(name: &str, description: &str, frontmatter: &str, body: &str) -> String {
    format!("---\nname: {name}\ndescription: {description}\n{frontmatter}---\n# {name}\n{body}")
}

/// Isolated filesystem for a single test.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            data_path,
        }
    }

    /// Write `content` at `relative_path`, creating parents.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Write `skills/<name>/SKILL.md`; returns the manifest path.
    #[must_use]
    pub fn create_skill(&self, name: &str, content: &str) -> PathBuf {
        self.create_file(&format!("skills/{name}/SKILL.md"), content)
    }

    /// Registry rooted at `<tmp>/registry`.
    #[must_use]
    pub fn store(&self) -> RegistryStore {
        RegistryStore::open(self.data_path.join("registry")).expect("Failed to open registry")
    }

    /// Create a skill and register it as a local package.
    pub fn register_local(&self, store: &RegistryStore, name: &str, content: &str) -> Package {
        let manifest = self.create_skill(name, content);
        let dir = manifest.parent().expect("skill dir");
        let package = Package::load(dir, Provenance::local()).expect("Failed to load skill");
        let hash = hash_dir(dir).expect("Failed to hash skill");
        store
            .register_local(&package, hash)
            .expect("Failed to register skill");
        package
    }
}
