/*!
 * Directory and file scanning functionality
 *
 * Walks a scan root (or an explicit list of files and directories), applies
 * the glob filters and binary sniffing, and collects the surviving files into
 * a [`Document`].
 */

use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use strum::{Display, EnumIter};
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use crate::config::{FlattenConfig, ScanMode};
use crate::ensure;
use crate::error::{IoResultExt, Result};
use crate::glob::GlobMatcher;
use crate::paths::{compute_key, lexical_normalize, resolve_argument, to_absolute, KeyMode};
use crate::sniff;
use crate::types::{Document, Entry};

/// What a walk visitor wants done next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    /// Keep going, descending into directories
    Continue,
    /// Do not descend into the directory just visited
    SkipSubtree,
}

/// Pre-order walk below `root` without following symlinks
///
/// The visitor is called for every entry except `root` itself. Returning an
/// error aborts the walk. `SkipSubtree` on a non-directory is a no-op.
pub fn walk<F>(root: &Path, mut visit: F) -> Result<()>
where
    F: FnMut(&DirEntry) -> Result<WalkControl>,
{
    let mut entries = WalkDir::new(root).follow_links(false).min_depth(1).into_iter();

    while let Some(entry) = entries.next() {
        let entry = entry?;
        if visit(&entry)? == WalkControl::SkipSubtree && entry.file_type().is_dir() {
            entries.skip_current_dir();
        }
    }

    Ok(())
}

/// Why a file was left out of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "title_case")]
pub enum SkipReason {
    /// Matched an ignore glob
    Ignored,
    /// Matched no allow glob
    NotAllowed,
    /// Matched no include-only pattern
    NotIncluded,
    /// Looked binary
    Binary,
    /// Symbolic link
    Symlink,
    /// Socket, FIFO, device, ...
    Special,
}

/// Scanner statistics
#[derive(Debug, Clone, Default)]
pub struct ScanStatistics {
    /// Number of files written into the document
    pub files_collected: usize,
    /// Total content size of collected files
    pub total_bytes: u64,
    /// Number of directories pruned by ignore rules
    pub pruned_dirs: usize,
    /// Files left out, by reason
    pub skipped: HashMap<SkipReason, usize>,
}

impl ScanStatistics {
    /// Number of files skipped for `reason`
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }
}

/// Scanner for directory contents
pub struct Scanner {
    /// Scanner configuration
    config: FlattenConfig,
    /// Compiled filters
    matcher: GlobMatcher,
    /// Progress bar
    pub progress: Arc<ProgressBar>,
}

impl Scanner {
    /// Create a scanner without visible progress
    pub fn new(config: FlattenConfig) -> Result<Self> {
        Self::with_progress(config, Arc::new(ProgressBar::hidden()))
    }

    /// Create a scanner reporting to `progress`
    pub fn with_progress(config: FlattenConfig, progress: Arc<ProgressBar>) -> Result<Self> {
        let matcher = GlobMatcher::new(&config.rules, &config.include_only)?;
        Ok(Self {
            config,
            matcher,
            progress,
        })
    }

    /// Collect the configured files into a document
    pub fn scan(&self) -> Result<Document> {
        self.scan_with_statistics().map(|(document, _)| document)
    }

    /// Collect the configured files and report what was skipped
    ///
    /// # Errors
    /// Besides I/O errors, fails if a file name is not valid UTF-8 or if two
    /// files map to the same document key.
    pub fn scan_with_statistics(&self) -> Result<(Document, ScanStatistics)> {
        let working_dir = &self.config.working_dir;
        // Keys are compared against physical paths of the arguments
        let working_dir =
            fs::canonicalize(working_dir).unwrap_or_else(|_| lexical_normalize(working_dir));

        let mut collector = Collector {
            scanner: self,
            working_dir,
            document: Document::new(),
            statistics: ScanStatistics::default(),
        };

        match &self.config.mode {
            ScanMode::Root(root) => collector.collect_root(root)?,
            ScanMode::Paths(paths) => {
                for path in paths {
                    collector.collect_path(path)?;
                }
            }
        }

        Ok((collector.document, collector.statistics))
    }
}

/// Where filter paths and document keys are measured from during one walk
struct Bases<'p> {
    /// Filters see paths relative to this directory
    filter: &'p Path,
    /// Keys are computed against this directory
    key: &'p Path,
    key_mode: KeyMode,
}

/// State of one scan; owns the document until the scan completes
struct Collector<'a> {
    scanner: &'a Scanner,
    working_dir: PathBuf,
    document: Document,
    statistics: ScanStatistics,
}

impl Collector<'_> {
    /// Walk a whole root, keys relative to it
    fn collect_root(&mut self, root: &Path) -> Result<()> {
        let root = lexical_normalize(&to_absolute(root, &self.working_dir));
        debug!(root = %root.display(), "scanning root");
        let bases = Bases {
            filter: &root,
            key: &root,
            key_mode: KeyMode::RootRelative,
        };
        walk(&root, |entry| self.visit(entry, &bases))
    }

    /// Collect one explicitly named file or directory
    ///
    /// Under the working directory, filters see the same relative path that
    /// becomes the key. Outside it, keys are absolute and filters see the
    /// path below the named directory, or the bare file name.
    fn collect_path(&mut self, path: &Path) -> Result<()> {
        let abs = resolve_argument(path, &self.working_dir)?;
        // Follows a symlink given as the argument itself
        let metadata = fs::metadata(&abs).with_path(&abs)?;
        let inside = abs.starts_with(&self.working_dir);

        if metadata.is_dir() {
            debug!(dir = %abs.display(), inside, "scanning directory argument");
            let working_dir = self.working_dir.clone();
            let bases = Bases {
                filter: if inside { working_dir.as_path() } else { abs.as_path() },
                key: &working_dir,
                key_mode: KeyMode::WorkingDirRelative,
            };
            walk(&abs, |entry| self.visit(entry, &bases))
        } else if metadata.is_file() {
            let key = compute_key(&self.working_dir, &abs, KeyMode::WorkingDirRelative)?;
            let filter_path = match abs.parent() {
                Some(parent) if !inside => compute_key(parent, &abs, KeyMode::RootRelative)?,
                _ => key.clone(),
            };
            self.collect_file(&abs, &filter_path, key, &metadata)
        } else {
            trace!(path = %abs.display(), "skipping special file");
            self.statistics.skip(SkipReason::Special);
            Ok(())
        }
    }

    fn visit(&mut self, entry: &DirEntry, bases: &Bases<'_>) -> Result<WalkControl> {
        let file_type = entry.file_type();
        let filter_path = compute_key(bases.filter, entry.path(), KeyMode::RootRelative)?;

        if file_type.is_dir() {
            if !self.scanner.config.no_ignores
                && self.scanner.matcher.should_ignore(&filter_path, true)
            {
                debug!(dir = %entry.path().display(), "pruning ignored directory");
                self.statistics.pruned_dirs += 1;
                return Ok(WalkControl::SkipSubtree);
            }
            return Ok(WalkControl::Continue);
        }

        if file_type.is_symlink() {
            trace!(path = %filter_path, "skipping symlink");
            self.statistics.skip(SkipReason::Symlink);
            return Ok(WalkControl::Continue);
        }

        if !file_type.is_file() {
            trace!(path = %filter_path, "skipping special file");
            self.statistics.skip(SkipReason::Special);
            return Ok(WalkControl::Continue);
        }

        let key = compute_key(bases.key, entry.path(), bases.key_mode)?;
        let metadata = entry.metadata()?;
        self.collect_file(entry.path(), &filter_path, key, &metadata)?;
        Ok(WalkControl::Continue)
    }

    /// Filter a regular file and record it
    fn collect_file(
        &mut self,
        abs_path: &Path,
        filter_path: &str,
        key: String,
        metadata: &Metadata,
    ) -> Result<()> {
        self.scanner.progress.inc(1);
        self.scanner.progress.set_message(key.clone());

        if let Some(reason) = self.filter_reason(filter_path) {
            trace!(path = %key, %reason, "skipping file");
            self.statistics.skip(reason);
            return Ok(());
        }

        if self.scanner.config.skip_binary_files && sniff::is_binary(abs_path)? {
            trace!(path = %key, "skipping binary file");
            self.statistics.skip(SkipReason::Binary);
            return Ok(());
        }

        ensure!(
            !self.document.contains(&key),
            Path,
            "{} maps to key '{}', which is already in the document",
            abs_path.display(),
            key
        );

        let content = fs::read(abs_path).with_path(abs_path)?;
        let entry = Entry::new(metadata.permissions().mode(), content);

        self.statistics.files_collected += 1;
        self.statistics.total_bytes += entry.content.len() as u64;
        self.document.insert(key, entry);
        Ok(())
    }

    fn filter_reason(&self, path: &str) -> Option<SkipReason> {
        let matcher = &self.scanner.matcher;

        if !self.scanner.config.no_ignores {
            if matcher.should_ignore(path, false) {
                return Some(SkipReason::Ignored);
            }
            if !matcher.should_allow(path, false) {
                return Some(SkipReason::NotAllowed);
            }
        }
        if !matcher.matches_include_only(path, false) {
            return Some(SkipReason::NotIncluded);
        }
        None
    }
}
