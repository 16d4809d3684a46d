//! Locating optional scene data and scratch directories for tests.

use std::path::PathBuf;

/// Environment variable pointing at a directory of real provider responses.
pub const TEST_DATA_ENV: &str = "TEST_DATA_DIR";

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
}

/// Find a recorded response file such as `default.tif`.
///
/// Looks in `$TEST_DATA_DIR`, then `crates/ndvi-raster/testdata/`, then
/// `testdata/` at the workspace root.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let root = workspace_root();
    let env_dir = std::env::var_os(TEST_DATA_ENV).map(PathBuf::from);

    env_dir
        .into_iter()
        .chain([root.join("crates/ndvi-raster/testdata"), root.join("testdata")])
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("ndvi-test-")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_has_manifest() {
        let root = workspace_root();
        assert!(root.join("Cargo.toml").exists(), "{:?}", root);
        assert!(root.join("crates/test-utils").is_dir());
    }

    #[test]
    fn test_absent_file_not_found() {
        assert!(find_test_file("no-such-scene-4f1c.tif").is_none());
    }

    #[test]
    fn test_temp_test_dir_is_removed_on_drop() {
        let dir = temp_test_dir();
        let path = dir.path().to_path_buf();
        assert!(path.is_dir());
        drop(dir);
        assert!(!path.exists());
    }
}
