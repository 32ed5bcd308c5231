//! Writes generated files.
//!
//! Every write goes through a temporary file in the destination directory
//! that is renamed into place, so a reader never observes a half-written file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Error;

/// Result of writing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created or its content replaced.
    Written,
    /// The file already held exactly this content and was left alone.
    Unchanged,
}

/// Writes `content` to `path` unless the file already holds it, creating
/// parent directories as needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be
/// written.
pub fn write_if_changed(path: &Path, content: &str) -> Result<WriteOutcome, Error> {
    match fs::read_to_string(path) {
        Ok(existing) if existing == content => return Ok(WriteOutcome::Unchanged),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {}
        Err(e) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }
    let staged = stage(path, content)?;
    staged.persist(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(WriteOutcome::Written)
}

/// Creates `path` with `content` only if nothing exists there yet.
///
/// Returns `Ok(false)` and leaves the existing file untouched if `path` is
/// already present.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be
/// written.
pub fn create_new(path: &Path, content: &str) -> Result<bool, Error> {
    if path.exists() {
        return Ok(false);
    }
    let staged = stage(path, content)?;
    match staged.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e.error,
        }),
    }
}

fn stage(path: &Path, content: &str) -> Result<NamedTempFile, Error> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(Error::io(parent))?;
    let mut staged = NamedTempFile::new_in(parent).map_err(Error::io(parent))?;
    staged
        .write_all(content.as_bytes())
        .map_err(Error::io(path))?;
    staged.flush().map_err(Error::io(path))?;
    // Temporary files are created owner-only; generated sources are not.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(Error::io(path))?;
    }
    Ok(staged)
}
