//! Test utilities for the tmpl workspace
//!
//! Temporary directories live under `.tmp/` at the crate being tested, and
//! template files are written with helpers that guarantee a watcher can see the
//! change.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tempfile::TempDir;

/// Creates a temporary directory within `.tmp/` at the current directory.
///
/// The directory is removed when the returned `TempDir` is dropped.
///
/// # Panics
///
/// Panics if the current directory cannot be determined or a directory cannot be
/// created.
///
/// # Examples
///
/// ```rust
/// use tmpl_testkit::temp_dir_in_workspace;
///
/// let temp = temp_dir_in_workspace();
/// let file_path = temp.path().join("page.html");
/// std::fs::write(&file_path, "{{.Title}}").unwrap();
/// ```
pub fn temp_dir_in_workspace() -> TempDir {
    try_temp_dir_in_workspace().expect("Failed to create temporary directory in .tmp/")
}

/// Alternative with Result for non-test code
pub fn try_temp_dir_in_workspace() -> std::io::Result<TempDir> {
    let workspace_root = std::env::current_dir()?;
    let tmp_base = workspace_root.join(".tmp");
    std::fs::create_dir_all(&tmp_base)?;
    TempDir::new_in(&tmp_base)
}

/// Writes `text` to `dir/name`, creating parent directories, and returns the path.
pub fn write_template(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create template directory");
    }
    std::fs::write(&path, text).expect("Failed to write template file");
    path
}

/// Overwrites an existing template and moves its modification time forward, so
/// that mtime-based watchers notice the change even on coarse-grained file
/// systems.
pub fn rewrite_template(path: &Path, text: &str) {
    let before = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    std::fs::write(path, text).expect("Failed to rewrite template file");

    let bumped = before.max(SystemTime::now()) + Duration::from_secs(2);
    let file = std::fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to reopen template file");
    file.set_modified(bumped)
        .expect("Failed to update modification time");
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
