use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Prefix of the temporary file a save writes before replacing the target.
pub const TEMP_PREFIX: &str = ".tmp_session_";

/// Replace `target` with `contents` so that readers see either the old file or
/// the complete new one.
pub fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    write_atomic_with(target, contents, |_| Ok(()))
}

/// [`write_atomic`] with a hook run after the temp file is synced and before
/// the rename. An error from the hook aborts the save like any other failure.
pub fn write_atomic_with<F>(target: &Path, contents: &[u8], before_replace: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // The temp file is deleted when dropped, so every early return cleans up.
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    before_replace(tmp.path())?;

    tmp.persist(target).map_err(|err| err.error)?;
    Ok(())
}
