use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test context with temporary directory management.
/// Automatically cleans up when dropped.
pub struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    /// Create a new test context with a fresh temporary directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Get the root path of the temporary directory
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file with content at the given relative path
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Get full path for a relative path
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Check if a relative path exists
    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
