/*!
 * flattree - Flatten a directory tree into a single document and expand it back
 *
 * This library serializes a filtered subset of a directory tree (path,
 * permission bits and content of every file) into one XML document, and
 * recreates the files from such a document.
 */

pub mod config;
pub mod error;
pub mod glob;
pub mod logging;
pub mod materializer;
pub mod paths;
pub mod reader;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod sniff;
pub mod types;
pub mod utils;
pub mod writer;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use config::{ExpandConfig, FlattenConfig, RuleSet, ScanMode};
pub use error::{FlatTreeError, Result};
pub use glob::GlobMatcher;
pub use materializer::materialize;
pub use reader::XmlReader;
pub use report::{FlattenReport, Reporter};
pub use scanner::{ScanStatistics, Scanner};
pub use types::{Document, Entry};
pub use writer::XmlWriter;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
