use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Error)]
#[error("error while finding files in {}: {source}", .root.display())]
pub struct FindError {
    pub root: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

/// Expands the given paths into the list of regular files to upload.
///
/// Directories are walked recursively with entries sorted by file name, so the
/// result is stable across runs. Symlinks are never followed, including a
/// symlink passed directly as a root, and special files are skipped.
pub fn find_files<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>, FindError> {
    let mut files = Vec::with_capacity(roots.len() * 2);
    for root in roots {
        let root = root.as_ref();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|source| FindError {
                root: root.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            } else {
                debug!("skipping {}", entry.path().display());
            }
        }
    }
    Ok(files)
}
