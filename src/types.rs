/*!
 * Core types and data structures for flattree
 */

use std::collections::btree_map::{self, BTreeMap};

use crate::error::Result;
use crate::{bail, ensure};

/// Highest mode value a permission string may carry (setuid/setgid/sticky + rwx)
const MAX_MODE: u32 = 0o7777;

/// One file inside a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Permission bits as a 4-digit octal string, e.g. "0644"
    pub perm: String,
    /// Exact byte content of the file
    pub content: Vec<u8>,
}

impl Entry {
    /// Create an entry from a numeric mode and raw content
    pub fn new(mode: u32, content: impl Into<Vec<u8>>) -> Self {
        Self {
            perm: format_mode(mode),
            content: content.into(),
        }
    }

    /// Create an entry from an already formatted permission string
    pub fn with_perm(perm: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            perm: perm.into(),
            content: content.into(),
        }
    }

    /// Numeric mode parsed from the permission string
    pub fn mode(&self) -> Result<u32> {
        parse_mode(&self.perm)
    }

    /// Content as text, if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Format permission bits the way they are stored in a document
pub fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode & 0o777)
}

/// Parse an octal permission string such as "0755"
pub fn parse_mode(perm: &str) -> Result<u32> {
    ensure!(!perm.is_empty(), Parse, "empty permission string");
    ensure!(
        perm.bytes().all(|b| (b'0'..=b'7').contains(&b)),
        Parse,
        "permission string '{}' is not octal",
        perm
    );

    let mode = match u32::from_str_radix(perm, 8) {
        Ok(mode) => mode,
        Err(e) => bail!(Parse, "invalid permission string '{}': {}", perm, e),
    };
    ensure!(
        mode <= MAX_MODE,
        Parse,
        "permission string '{}' is out of range",
        perm
    );

    Ok(mode)
}

/// Mapping from slash-separated relative path to file entry
///
/// Keys are kept sorted so serialization is stable; equality is plain map
/// equality, independent of how the document was built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    entries: BTreeMap<String, Entry>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the previous one stored under the same key
    pub fn insert(&mut self, path: impl Into<String>, entry: Entry) -> Option<Entry> {
        self.entries.insert(path.into(), entry)
    }

    /// Look up an entry by key
    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Whether the document holds an entry for `path`
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Entry> {
        self.entries.iter()
    }

    /// Iterate keys in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Sum of all content sizes in bytes
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.content.len() as u64).sum()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Entry);
    type IntoIter = btree_map::Iter<'a, String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Document {
    type Item = (String, Entry);
    type IntoIter = btree_map::IntoIter<String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Entry)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Entry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
