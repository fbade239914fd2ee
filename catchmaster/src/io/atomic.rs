//! Crash-safe file replacement shared by the config and history files.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Replace `path` with `contents` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = sibling(path, ".tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_contents_and_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/history.json");
        write_atomic(&path, "first").expect("write");
        write_atomic(&path, "second").expect("rewrite");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[test]
    fn sibling_appends_to_the_full_name() {
        let path = Path::new("/game/.catchmaster/config.toml");
        assert_eq!(
            sibling(path, ".tmp"),
            PathBuf::from("/game/.catchmaster/config.toml.tmp")
        );
    }
}
