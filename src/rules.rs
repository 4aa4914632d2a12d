/*!
 * Discovery and parsing of ignore/allow rule files
 *
 * Rule files are newline-delimited pattern lists. Blank lines and lines
 * starting with `#` are skipped, and `< other-file` splices the lines of
 * another rule file in place.
 */

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::RuleSet;
use crate::error::{IoResultExt, Result};
use crate::paths::{lexical_normalize, to_absolute};
use crate::utils::expand_home;
use crate::{bail, ensure};

/// Name of the block-list rule file
pub const IGNORE_FILE_NAME: &str = ".flattreeignore";

/// Name of the allow-list rule file
pub const ALLOW_FILE_NAME: &str = ".flattreeallow";

/// Rule files found by [`discover`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDiscovery {
    /// Directory holding the rule files; the default scan root
    pub root: PathBuf,
    /// Patterns from the ignore file, if present
    pub ignored: Option<Vec<String>>,
    /// Patterns from the allow file, if present
    pub allowed: Option<Vec<String>>,
}

impl RuleDiscovery {
    /// Replace the lists of `rules` for which a file was found
    pub fn apply(self, rules: &mut RuleSet) {
        if let Some(ignored) = self.ignored {
            rules.ignored_globs = ignored;
        }
        if let Some(allowed) = self.allowed {
            rules.allowed_globs = allowed;
        }
    }
}

/// Search `start` and its ancestors for rule files
///
/// The nearest directory containing either file wins. `start` should be
/// absolute, otherwise the search stops at the first relative component.
pub fn discover(start: &Path) -> Result<RuleDiscovery> {
    for dir in start.ancestors() {
        let ignore_path = dir.join(IGNORE_FILE_NAME);
        let allow_path = dir.join(ALLOW_FILE_NAME);
        let has_ignore = ignore_path.is_file();
        let has_allow = allow_path.is_file();

        if !has_ignore && !has_allow {
            continue;
        }

        debug!(dir = %dir.display(), has_ignore, has_allow, "found rule files");

        let ignored = if has_ignore {
            Some(load_rule_file(&ignore_path)?)
        } else {
            None
        };
        let allowed = if has_allow {
            Some(load_rule_file(&allow_path)?)
        } else {
            None
        };

        return Ok(RuleDiscovery {
            root: dir.to_path_buf(),
            ignored,
            allowed,
        });
    }

    bail!(
        NotFound,
        "no {} or {} in {} or any parent directory",
        IGNORE_FILE_NAME,
        ALLOW_FILE_NAME,
        start.display()
    )
}

/// Read and parse a single rule file
pub fn load_rule_file(path: &Path) -> Result<Vec<String>> {
    let path = lexical_normalize(path);
    load_chained(&path, &[])
}

/// Parse rule text whose includes are resolved against `base_dir`
pub fn parse_rules(text: &str, base_dir: &Path) -> Result<Vec<String>> {
    parse_chained(text, base_dir, &[])
}

fn load_chained(path: &Path, chain: &[PathBuf]) -> Result<Vec<String>> {
    ensure!(
        !chain.iter().any(|p| p == path),
        Parse,
        "rule file {} includes itself",
        path.display()
    );

    let text = fs::read_to_string(path).with_path(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("/"));

    let mut chain = chain.to_vec();
    chain.push(path.to_path_buf());
    parse_chained(&text, base_dir, &chain)
}

fn parse_chained(text: &str, base_dir: &Path, chain: &[PathBuf]) -> Result<Vec<String>> {
    let mut patterns = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(target) = line.strip_prefix('<') {
            let target = target.trim();
            ensure!(!target.is_empty(), Parse, "empty include directive");

            let included = lexical_normalize(&to_absolute(&expand_home(target), base_dir));
            debug!(file = %included.display(), "including rule file");
            patterns.extend(load_chained(&included, chain)?);
            continue;
        }

        patterns.push(line.to_string());
    }

    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = "# comment\n\n.git/\n  *.log  \n# another\nbuild/\n";
        let patterns = parse_rules(text, Path::new("/nonexistent")).unwrap();
        assert_eq!(patterns, vec![".git/", "*.log", "build/"]);
    }

    #[test]
    fn test_include_is_spliced_in_place() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("shared")).unwrap();
        fs::write(dir.path().join("shared/base"), "target/\n< extra\n").unwrap();
        fs::write(dir.path().join("shared/extra"), "*.tmp\n").unwrap();

        let text = "first\n< shared/base\nlast\n";
        let patterns = parse_rules(text, dir.path()).unwrap();
        assert_eq!(patterns, vec!["first", "target/", "*.tmp", "last"]);
    }

    #[test]
    fn test_include_cycle_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "x\n< b\n").unwrap();
        fs::write(dir.path().join("b"), "< a\n").unwrap();

        let err = load_rule_file(&dir.path().join("a")).unwrap_err();
        assert!(err.to_string().contains("includes itself"));
    }

    #[test]
    fn test_missing_include_is_io_error() {
        let dir = tempdir().unwrap();
        let err = parse_rules("< nope", dir.path()).unwrap_err();
        assert!(matches!(err, crate::error::FlatTreeError::IoAt { .. }));
    }

    #[test]
    fn test_include_expands_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let err = parse_rules("< ~/.flattree-missing/shared", Path::new("/nonexistent"))
            .unwrap_err();
        match err {
            crate::error::FlatTreeError::IoAt { path, .. } => {
                assert_eq!(path, lexical_normalize(&home.join(".flattree-missing/shared")))
            }
            other => panic!("expected an IO error, got {:?}", other),
        }
    }

    #[test]
    fn test_discover_nearest_ancestor() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(IGNORE_FILE_NAME), "outer/\n").unwrap();
        fs::write(dir.path().join("a").join(ALLOW_FILE_NAME), "*.rs\n").unwrap();

        let found = discover(&nested).unwrap();
        assert_eq!(found.root, dir.path().join("a"));
        assert_eq!(found.ignored, None);
        assert_eq!(found.allowed, Some(vec!["*.rs".to_string()]));

        let mut rules = RuleSet::default();
        found.apply(&mut rules);
        assert_eq!(rules.allowed_globs, vec!["*.rs"]);
        // No ignore file next to the allow file, so the defaults stay
        assert_eq!(rules.ignored_globs, RuleSet::default().ignored_globs);
    }

    #[test]
    fn test_discover_replaces_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(IGNORE_FILE_NAME), "# only this\ndist/\n").unwrap();

        let mut rules = RuleSet::default();
        discover(dir.path()).unwrap().apply(&mut rules);
        assert_eq!(rules.ignored_globs, vec!["dist/"]);
        assert!(rules.allowed_globs.is_empty());
    }

    #[test]
    fn test_discover_not_found() {
        let dir = tempdir().unwrap();
        // Temp dirs live under a parent we do not control, so only assert on
        // the error kind when nothing above is configured either.
        match discover(dir.path()) {
            Err(e) => assert!(e.is_not_found()),
            Ok(found) => assert_ne!(found.root, dir.path()),
        }
    }
}
