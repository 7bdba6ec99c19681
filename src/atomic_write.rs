//! Atomic, no-clobber file writes shared by the asset registry and the
//! report sink.
//!
//! Bytes go to a hidden `NamedTempFile` in the target directory first and are
//! then linked into place. Any failure before the final persist drops the temp
//! file, which removes it, so a failed write leaves the directory as it was.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

const MAX_NAME_ATTEMPTS: usize = 1000;

/// Write `bytes` to `dir/name` without replacing an existing file. On a
/// collision, `-1`, `-2`, … is appended to the file stem. Returns the name
/// actually used. Blocking.
pub(crate) fn write_no_clobber(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<String> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            name.to_string()
        } else {
            format!("{stem}-{attempt}{ext}")
        };
        match tmp.persist_noclobber(dir.join(&candidate)) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                warn!("{} already exists, trying next name", candidate);
                tmp = e.file;
            }
            Err(e) => return Err(e.error),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {name} after {MAX_NAME_ATTEMPTS} attempts"),
    ))
}
