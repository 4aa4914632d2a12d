/*!
 * Recreate files on disk from a document
 */

use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::debug;

use crate::error::{IoResultExt, Result};
use crate::paths::from_slash;
use crate::types::Document;

/// Write every entry of `document` below `destination_root`
///
/// Missing parent directories are created; existing files are overwritten.
/// The first failure stops the run and files written before it stay on disk.
/// Returns the number of files written.
pub fn materialize(document: &Document, destination_root: &Path) -> Result<usize> {
    let mut written = 0;

    for (key, entry) in document {
        // Reject a bad permission string before touching the disk
        let mode = entry.mode()?;
        let target = from_slash(key, destination_root)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        fs::write(&target, &entry.content).with_path(&target)?;
        fs::set_permissions(&target, Permissions::from_mode(mode)).with_path(&target)?;

        debug!(path = %target.display(), perm = %entry.perm, "materialized file");
        written += 1;
    }

    Ok(written)
}
