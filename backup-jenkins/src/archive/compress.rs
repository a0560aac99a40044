//! Native tar + bzip2 writer.
//!
//! Members are stored relative to the source directory. Cancellation is
//! checked before each member.

use crate::fs::walker::{walk_directory, WalkOptions};
use crate::utils::errors::{BackupError, Result};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Write every file under `source_dir` into a bzip2-compressed tarball at `output`.
///
/// With `verbose` each member is logged as it is added. Returns the number of members.
pub fn write_tar_bz2(
    source_dir: &Path,
    output: &Path,
    verbose: bool,
    cancel: &CancellationToken,
) -> Result<usize> {
    let members = walk_directory(source_dir, &WalkOptions::default())?;

    let file = File::create(output)?;
    let encoder = BzEncoder::new(file, Compression::best());
    let mut builder = tar::Builder::new(encoder);

    for member in &members {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }

        builder.append_path_with_name(&member.path, &member.relative_path)?;
        if verbose {
            info!("a {}", member.relative_path.display());
        }
    }

    let encoder = builder.into_inner()?;
    let mut file = encoder.finish()?;
    file.flush()?;

    debug!(
        "Wrote {} members from {} to {}",
        members.len(),
        source_dir.display(),
        output.display()
    );

    Ok(members.len())
}
