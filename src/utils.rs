/*!
 * Utility functions for flattree
 */

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::error::{IoResultExt, Result};

/// Ignore globs used when nothing else is configured
pub const DEFAULT_IGNORED_GLOBS: &[&str] = &[".git/", ".task/", "node_modules/"];

static HOME_DIR: Lazy<Option<PathBuf>> = Lazy::new(dirs::home_dir);

/// Where a document is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Standard input ("-")
    Stdin,
    /// A file on disk
    File(PathBuf),
}

impl From<&str> for InputSource {
    fn from(s: &str) -> Self {
        match s {
            "-" => InputSource::Stdin,
            path => InputSource::File(PathBuf::from(path)),
        }
    }
}

impl InputSource {
    /// Read the whole input
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            InputSource::Stdin => {
                let mut buf = Vec::new();
                io::stdin().lock().read_to_end(&mut buf)?;
                Ok(buf)
            }
            InputSource::File(path) => fs::read(path).with_path(path),
        }
    }
}

/// Where a document is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output ("+")
    Stdout,
    /// Standard error ("-")
    Stderr,
    /// A file on disk
    File(PathBuf),
}

impl From<&str> for OutputTarget {
    fn from(s: &str) -> Self {
        match s {
            "+" => OutputTarget::Stdout,
            "-" => OutputTarget::Stderr,
            path => OutputTarget::File(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "<stdout>"),
            OutputTarget::Stderr => write!(f, "<stderr>"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl OutputTarget {
    /// Write `data` to the target, replacing any existing file
    pub fn write_all(&self, data: &[u8]) -> Result<()> {
        match self {
            OutputTarget::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(data)?;
                out.flush()?;
            }
            OutputTarget::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(data)?;
                err.flush()?;
            }
            OutputTarget::File(path) => fs::write(path, data).with_path(path)?,
        }
        Ok(())
    }
}

/// Expand a leading `~` or `~/` to the user's home directory
///
/// Paths such as `~other/x` or a `~` in the middle are returned unchanged, as
/// is everything when no home directory is known.
pub fn expand_home(path: &str) -> PathBuf {
    let home = match HOME_DIR.as_ref() {
        Some(home) => home,
        None => return PathBuf::from(path),
    };

    if path == "~" {
        home.clone()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert_eq!(InputSource::from("-"), InputSource::Stdin);
        assert_eq!(
            InputSource::from("tree.xml"),
            InputSource::File(PathBuf::from("tree.xml"))
        );
        assert_eq!(OutputTarget::from("+"), OutputTarget::Stdout);
        assert_eq!(OutputTarget::from("-"), OutputTarget::Stderr);
        assert_eq!(
            OutputTarget::from("out.xml"),
            OutputTarget::File(PathBuf::from("out.xml"))
        );
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~"), home);
            assert_eq!(expand_home("~/rules/base"), home.join("rules/base"));
        }
        assert_eq!(expand_home("~other/x"), PathBuf::from("~other/x"));
        assert_eq!(expand_home("a/~/b"), PathBuf::from("a/~/b"));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(12), "12 bytes");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }
}
