/*!
 * Glob matching for ignore, allow and include-only filters
 *
 * Patterns come in four families, picked at compile time:
 *
 * - `dir/` (trailing slash) matches the directory and everything under it
 * - patterns containing `**` are translated into an anchored regex where
 *   `**` may cross directory boundaries
 * - other patterns with `*`, `?` or `[` are single-segment shell globs
 * - anything else is compared literally
 *
 * All paths are slash-separated and relative; a leading `./` is ignored on
 * both sides.
 */

use glob_match::glob_match;
use regex::Regex;

use crate::config::RuleSet;
use crate::error::{FlatTreeError, Result};

/// Characters that turn a pattern into a shell glob
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Literal path
    Exact(String),
    /// Trailing-slash pattern matching a whole subtree
    DirPrefix(String),
    /// Pattern containing `**`, matched through its anchored regex translation
    Recursive(Regex),
    /// Single-segment shell glob, braces escaped
    Simple(String),
}

impl Pattern {
    /// Compile a pattern string
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = strip_dot_slash(pattern);

        if pattern.ends_with('/') {
            return Ok(Pattern::DirPrefix(pattern.to_string()));
        }

        if pattern.contains("**") {
            let regex =
                Regex::new(&glob_to_regex(pattern)).map_err(|e| FlatTreeError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            return Ok(Pattern::Recursive(regex));
        }

        if pattern.contains(GLOB_CHARS) {
            // glob-match expands `{a,b}`; braces are plain characters here
            let escaped = pattern.replace('{', "\\{").replace('}', "\\}");
            return Ok(Pattern::Simple(escaped));
        }

        Ok(Pattern::Exact(pattern.to_string()))
    }

    /// Check a relative path against this pattern
    ///
    /// `is_dir` only matters for trailing-slash patterns, where a directory
    /// path is compared with a `/` appended.
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        let path = strip_dot_slash(path);

        match self {
            Pattern::Exact(p) => path == p,
            Pattern::DirPrefix(prefix) => {
                if is_dir && !path.ends_with('/') {
                    format!("{}/", path).starts_with(prefix.as_str())
                } else {
                    path.starts_with(prefix.as_str())
                }
            }
            Pattern::Recursive(regex) => regex.is_match(path),
            Pattern::Simple(p) => glob_match(p, path),
        }
    }
}

/// One-shot match of a pattern string against a file path
pub fn matches(pattern: &str, path: &str) -> Result<bool> {
    Ok(Pattern::new(pattern)?.matches(path, false))
}

/// Translate a `**` glob into an anchored regular expression
///
/// `**/` becomes "zero or more leading segments", a bare `**` matches
/// anything including slashes, `*` and `?` stay within one segment and every
/// other character is matched literally.
pub fn glob_to_regex(glob: &str) -> String {
    let mut rx = String::with_capacity(glob.len() * 2 + 2);
    rx.push('^');

    let mut rest = glob;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("**/") {
            rx.push_str("(?:.*/)?");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("**") {
            rx.push_str(".*");
            rest = tail;
        } else {
            let mut chars = rest.chars();
            // Loop condition guarantees at least one char
            let Some(c) = chars.next() else { break };
            match c {
                '*' => rx.push_str("[^/]*"),
                '?' => rx.push_str("[^/]"),
                _ => {
                    let mut buf = [0u8; 4];
                    rx.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                }
            }
            rest = chars.as_str();
        }
    }

    rx.push('$');
    rx
}

fn strip_dot_slash(s: &str) -> &str {
    s.strip_prefix("./").unwrap_or(s)
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|p| Pattern::new(p)).collect()
}

/// Immutable set of compiled filters threaded through a scan
#[derive(Debug, Clone, Default)]
pub struct GlobMatcher {
    /// Block-list
    ignored: Vec<Pattern>,
    /// Allow-list (empty = allow everything)
    allowed: Vec<Pattern>,
    /// Call-scoped include-only filter (empty = include everything)
    include_only: Vec<Pattern>,
}

impl GlobMatcher {
    /// Compile the rule set and include-only filter
    pub fn new(rules: &RuleSet, include_only: &[String]) -> Result<Self> {
        Ok(Self {
            ignored: compile_all(&rules.ignored_globs)?,
            allowed: compile_all(&rules.allowed_globs)?,
            include_only: compile_all(include_only)?,
        })
    }

    /// True if any ignore pattern matches
    pub fn should_ignore(&self, path: &str, is_dir: bool) -> bool {
        self.ignored.iter().any(|p| p.matches(path, is_dir))
    }

    /// True if the allow-list is empty or any allow pattern matches
    pub fn should_allow(&self, path: &str, is_dir: bool) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|p| p.matches(path, is_dir))
    }

    /// True if no include-only filter is set or any of its patterns matches
    pub fn matches_include_only(&self, path: &str, is_dir: bool) -> bool {
        self.include_only.is_empty() || self.include_only.iter().any(|p| p.matches(path, is_dir))
    }

    /// Whether a file path makes it into the document
    pub fn is_included(&self, path: &str) -> bool {
        !self.should_ignore(path, false)
            && self.should_allow(path, false)
            && self.matches_include_only(path, false)
    }
}
