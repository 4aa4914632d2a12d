/*!
 * Text/binary classification of files
 */

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{IoResultExt, Result};

/// Number of leading bytes inspected
pub const SNIFF_LEN: usize = 8000;

/// Heuristically decide whether the file at `path` is binary
///
/// Reads at most [`SNIFF_LEN`] bytes; the file is closed before returning.
pub fn is_binary(path: &Path) -> Result<bool> {
    let file = File::open(path).with_path(path)?;
    let mut sample = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut sample)
        .with_path(path)?;

    Ok(is_binary_bytes(&sample, sample.len() == SNIFF_LEN))
}

/// Classify a sample of a file's leading bytes
///
/// Empty samples are text. A NUL byte or invalid UTF-8 makes the sample
/// binary. When `truncated` is set, a multi-byte character cut off by the
/// end of the sample is not held against it.
pub fn is_binary_bytes(sample: &[u8], truncated: bool) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => false,
        // error_len() is None only for an incomplete sequence at the very end
        Err(e) => !(truncated && e.error_len().is_none()),
    }
}
