//! Path normalization and document key computation.
//!
//! Document keys are always slash-separated. Whole-root scans key files by
//! their path below the root; explicit-path scans key them relative to the
//! working directory when possible and by absolute path otherwise. Both go
//! through [`compute_key`].

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::bail;
use crate::error::{IoResultExt, Result};

/// How a document key is derived from an absolute file path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Relative to the scan root; paths outside the root are an error
    RootRelative,
    /// Relative to the working directory if under it, else absolute
    WorkingDirRelative,
}

/// Convert a path to absolute without resolving symlinks.
///
/// # Arguments
/// * `path` - Path to convert (relative or absolute)
/// * `base` - Directory relative paths are joined onto
pub fn to_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Lexical path normalization without filesystem access.
///
/// Removes `.` components and resolves `..` components lexically.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Pop if we can and it's not a ParentDir or RootDir
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::ParentDir) | Some(Component::RootDir)
                    )
                {
                    components.pop();
                } else if !matches!(components.last(), Some(Component::RootDir)) {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Convert a path to a slash-separated string.
///
/// Absolute paths keep their leading `/`.
///
/// # Errors
/// Returns a path error if a component is not valid UTF-8, since such a
/// name cannot be carried by a document key without loss.
pub fn to_slash(path: &Path) -> Result<String> {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::CurDir => {}
            other => {
                let name = match other.as_os_str().to_str() {
                    Some(name) => name,
                    None => bail!(Path, "file name is not valid UTF-8: {}", path.display()),
                };
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(name);
            }
        }
    }
    Ok(out)
}

/// Resolve a command-line path against `base`, following symlinks in its
/// parent directories but not in the final component.
///
/// The result is absolute and lies in the same physical directory tree as a
/// canonicalized working directory, so [`compute_key`] can tell whether the
/// path is under it. The file name is kept as given.
pub fn resolve_argument(path: &Path, base: &Path) -> Result<PathBuf> {
    let absolute = lexical_normalize(&to_absolute(path, base));
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(fs::canonicalize(parent).with_path(parent)?.join(name)),
        _ => Ok(absolute),
    }
}

/// Compute the document key of `absolute`.
///
/// # Arguments
/// * `root` - Scan root (`RootRelative`) or working directory (`WorkingDirRelative`)
/// * `absolute` - Absolute, lexically normalized path of the file
/// * `mode` - Which keying regime applies
///
/// # Errors
/// Returns a path error if `mode` is `RootRelative` and `absolute` does not
/// lie under `root`, or if the resulting key is empty.
pub fn compute_key(root: &Path, absolute: &Path, mode: KeyMode) -> Result<String> {
    let key = match (absolute.strip_prefix(root), mode) {
        (Ok(relative), _) => to_slash(relative)?,
        (Err(_), KeyMode::WorkingDirRelative) => to_slash(absolute)?,
        (Err(_), KeyMode::RootRelative) => bail!(
            Path,
            "{} is not under {}",
            absolute.display(),
            root.display()
        ),
    };

    if key.is_empty() {
        bail!(Path, "{} has no name relative to itself", absolute.display());
    }
    Ok(key)
}

/// Convert a document key to a path under `destination_root`.
///
/// Empty and `.` segments are dropped, so absolute keys land below the
/// destination as well.
///
/// # Errors
/// Returns a path error for keys containing `..` or naming no file.
pub fn from_slash(key: &str, destination_root: &Path) -> Result<PathBuf> {
    let mut result = destination_root.to_path_buf();
    let mut pushed = false;

    for segment in key.split('/') {
        match segment {
            "" | "." => {}
            ".." => bail!(Path, "refusing to write outside the destination: {}", key),
            name => {
                result.push(name);
                pushed = true;
            }
        }
    }

    if !pushed {
        bail!(Path, "document key names no file: '{}'", key);
    }
    Ok(result)
}
