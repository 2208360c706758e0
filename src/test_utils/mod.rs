use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};

pub fn create_temp_file(content: &str) -> TempPath {
    create_temp_file_with_suffix("", content)
}

pub fn create_temp_file_with_suffix(suffix: &str, content: &str) -> TempPath {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Unable to create test file.");

    write!(file, "{}", content).expect("Unable to write content to test file.");

    file.into_temp_path()
}

pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Unable to create test directory.")
}

/// Write `content` to `dir/name`, creating intermediate directories.
pub fn create_file_in(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Unable to create test directory.");
    }
    fs::write(&path, content).expect("Unable to write content to test file.");
    path
}
