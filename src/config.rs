/*!
 * Configuration handling for flattree
 */

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use clap_complete::Shell;
use tracing::debug;

use crate::error::Result;
use crate::paths::{lexical_normalize, to_absolute};
use crate::rules;
use crate::utils::{InputSource, OutputTarget, DEFAULT_IGNORED_GLOBS};
use crate::{bail, ensure};

/// Command-line arguments for flattree
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "flattree",
    version = env!("CARGO_PKG_VERSION"),
    about = "Flatten a directory tree into one XML document and expand it back",
    long_about = "Serializes a filtered subset of a directory tree (path, permission bits and content of every file) into a single XML document, and reconstructs the files from such a document."
)]
pub struct Args {
    /// Enable debug logging on stderr
    #[clap(long, global = true)]
    pub debug: bool,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serialize files into a document
    Flatten(FlattenArgs),
    /// Recreate files from a document
    Expand(ExpandArgs),
}

/// Arguments of `flattree flatten`
#[derive(ClapArgs, Debug, Clone)]
pub struct FlattenArgs {
    /// Files or directories to flatten; keys are relative to the working
    /// directory when possible, absolute otherwise
    pub paths: Vec<String>,

    /// Flatten this directory with keys relative to it
    #[clap(long, conflicts_with = "paths")]
    pub root: Option<String>,

    /// Only keep files matching one of these patterns
    #[clap(short = 'i', long = "include")]
    pub include_only: Vec<String>,

    /// Block-list globs (replaced by a discovered ignore rule file)
    #[clap(long = "ignored-globs", default_values_t = DEFAULT_IGNORED_GLOBS.iter().map(|s| s.to_string()))]
    pub ignored_globs: Vec<String>,

    /// Allow-list globs (replaced by a discovered allow rule file)
    #[clap(long = "allowed-globs")]
    pub allowed_globs: Vec<String>,

    /// Skip files that look binary
    #[clap(long = "skip-binary-files", default_value_t = true, action = ArgAction::Set)]
    pub skip_binary_files: bool,

    /// Wrap the document in a fenced block followed by instructions for an LLM
    #[clap(long)]
    pub llm: bool,

    /// Disable ignore and allow filtering
    #[clap(long)]
    pub no_ignores: bool,

    /// Do not look for rule files in the working directory and its ancestors
    #[clap(long)]
    pub no_rules: bool,

    /// Where to write the document: "+" for stdout, "-" for stderr, or a file
    #[clap(short, long, default_value = "+")]
    pub output: String,

    /// Print a summary table on stderr when done
    #[clap(long)]
    pub stats: bool,

    /// Show a progress spinner on stderr
    #[clap(long)]
    pub progress: bool,
}

/// Arguments of `flattree expand`
#[derive(ClapArgs, Debug, Clone)]
pub struct ExpandArgs {
    /// Document to read, "-" for stdin
    #[clap(default_value = "-")]
    pub input: String,

    /// Directory the files are recreated under
    #[clap(default_value = ".")]
    pub output_root: String,
}

/// Block-list and allow-list globs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    /// Globs whose match excludes a path
    pub ignored_globs: Vec<String>,
    /// Globs one of which must match, unless empty
    pub allowed_globs: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            ignored_globs: DEFAULT_IGNORED_GLOBS.iter().map(|s| s.to_string()).collect(),
            allowed_globs: Vec::new(),
        }
    }
}

/// What a scan walks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// One directory, keys relative to it
    Root(PathBuf),
    /// Arbitrary files and directories, keys relative to the working directory
    Paths(Vec<PathBuf>),
}

/// Configuration of a flatten run
#[derive(Clone, Debug)]
pub struct FlattenConfig {
    /// Roots to walk
    pub mode: ScanMode,

    /// Directory explicit paths are resolved against
    pub working_dir: PathBuf,

    /// Ignore and allow globs
    pub rules: RuleSet,

    /// Call-scoped include-only patterns (empty = include all)
    pub include_only: Vec<String>,

    /// Skip files that look binary
    pub skip_binary_files: bool,

    /// Bypass ignore and allow filtering
    pub no_ignores: bool,

    /// Wrap the output for an LLM
    pub presentation: bool,

    /// Where the document goes
    pub output: OutputTarget,
}

impl FlattenConfig {
    /// Configuration for flattening a single directory with default rules
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            working_dir: root.clone(),
            mode: ScanMode::Root(root),
            rules: RuleSet::default(),
            include_only: Vec::new(),
            skip_binary_files: true,
            no_ignores: false,
            presentation: false,
            output: OutputTarget::Stdout,
        }
    }

    /// Configuration for flattening explicit paths resolved against `working_dir`
    pub fn for_paths(working_dir: impl Into<PathBuf>, paths: Vec<PathBuf>) -> Self {
        Self {
            mode: ScanMode::Paths(paths),
            ..Self::for_root(working_dir)
        }
    }

    /// Create configuration from command-line arguments
    ///
    /// Unless `--no-rules` is given, rule files are looked up from
    /// `working_dir` upwards; lists found there replace the ones from the
    /// command line, and the directory holding them becomes the default root.
    pub fn from_args(args: FlattenArgs, working_dir: &Path) -> Result<Self> {
        let mut rules = RuleSet {
            ignored_globs: args.ignored_globs,
            allowed_globs: args.allowed_globs,
        };

        let mut discovered_root = None;
        if !args.no_rules {
            match rules::discover(working_dir) {
                Ok(discovery) => {
                    debug!(root = %discovery.root.display(), "using rule files");
                    discovered_root = Some(discovery.root.clone());
                    discovery.apply(&mut rules);
                }
                Err(e) if e.is_not_found() => debug!("no rule files found, using configured globs"),
                Err(e) => return Err(e),
            }
        }

        let mode = if !args.paths.is_empty() {
            ScanMode::Paths(args.paths.iter().map(PathBuf::from).collect())
        } else if let Some(root) = args.root {
            ScanMode::Root(lexical_normalize(&to_absolute(Path::new(&root), working_dir)))
        } else {
            ScanMode::Root(discovered_root.unwrap_or_else(|| working_dir.to_path_buf()))
        };

        Ok(Self {
            mode,
            working_dir: working_dir.to_path_buf(),
            rules,
            include_only: args.include_only,
            skip_binary_files: args.skip_binary_files,
            no_ignores: args.no_ignores,
            presentation: args.llm,
            output: OutputTarget::from(args.output.as_str()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match &self.mode {
            ScanMode::Root(root) => {
                ensure!(
                    root.is_dir(),
                    InvalidArgument,
                    "Target directory not found: {}",
                    root.display()
                );
            }
            ScanMode::Paths(paths) => {
                for path in paths {
                    let abs = to_absolute(path, &self.working_dir);
                    ensure!(
                        abs.exists(),
                        InvalidArgument,
                        "Path not found: {}",
                        path.display()
                    );
                }
            }
        }

        // Check if output file directory exists
        if let OutputTarget::File(path) = &self.output {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    bail!(
                        InvalidArgument,
                        "Output directory not found: {}",
                        parent.display()
                    );
                }
            }
        }

        Ok(())
    }
}

/// Configuration of an expand run
#[derive(Clone, Debug)]
pub struct ExpandConfig {
    /// Where the document is read from
    pub input: InputSource,
    /// Directory files are written under
    pub destination: PathBuf,
}

impl ExpandConfig {
    /// Create configuration from command-line arguments
    pub fn from_args(args: ExpandArgs) -> Self {
        Self {
            input: InputSource::from(args.input.as_str()),
            destination: PathBuf::from(args.output_root),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let InputSource::File(path) = &self.input {
            ensure!(
                path.is_file(),
                InvalidArgument,
                "Input file not found: {}",
                path.display()
            );
        }
        if self.destination.exists() {
            ensure!(
                self.destination.is_dir(),
                InvalidArgument,
                "Output root is not a directory: {}",
                self.destination.display()
            );
        }
        Ok(())
    }
}
