use std::{io::Write, path::Path};

use debhub_core::{CoreResult, ErrorContext};
use debhub_package::parse_file;
use tracing::debug;

/// Prints the control block of a local package with its digest lines appended.
pub fn inspect_package(path: &Path) -> CoreResult<()> {
    let archive = parse_file(path)?;
    debug!(
        path = %path.display(),
        size = archive.digests.len,
        sha256 = %archive.digests.sha256,
        "parsed package"
    );

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(archive.control.as_bytes())
        .and_then(|_| stdout.flush())
        .with_context(|| "writing control block to stdout".to_string())
}
