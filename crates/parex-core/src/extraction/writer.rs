//! Materializes entries on disk: directories, symlinks and file bodies.
//!
//! Metadata is not touched here; every function leaves the node with
//! whatever permissions the process umask allows and the restorer fixes
//! them up afterwards.

use std::fs;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Write;
use std::io::{self};
use std::path::Path;

use log::debug;

use crate::Result;
use crate::copy::copy_with_buffer;
use crate::platform::Platform;
use crate::platform::link_target_from_bytes;
use crate::types::entry_kind::PERMISSION_MASK;

/// Removes a file, symlink or empty directory at `path`.
///
/// A missing node is not an error. A non-empty directory is.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Creates a directory, accepting one that already exists.
///
/// The directory is created with permissive bits so later entries can be
/// written into it; its real mode is applied in the directory pass. An
/// existing directory is made owner-writable again for the same reason, and
/// an existing symlink is replaced rather than followed.
pub fn create_directory(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(make_owner_writable(path, &meta)?),
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(path)?,
        _ => {}
    }
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e)
            if e.kind() == io::ErrorKind::AlreadyExists
                && fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir()) =>
        {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn make_owner_writable(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode() & PERMISSION_MASK;
    if mode & 0o700 == 0o700 {
        return Ok(());
    }
    debug!("reopening {} (mode {mode:o}) for writing", path.display());
    fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o700))
}

#[cfg(not(unix))]
fn make_owner_writable(_path: &Path, _meta: &fs::Metadata) -> io::Result<()> {
    Ok(())
}

/// Replaces whatever is at `path` with a symlink to `target`.
///
/// `target` is stored verbatim; it is never resolved or validated. An
/// existing directory is never replaced, since entries below it may still
/// be in flight.
pub fn create_symlink(platform: &dyn Platform, path: &Path, target: Vec<u8>) -> Result<()> {
    if fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir()) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("refusing to replace directory {} with a symlink", path.display()),
        )
        .into());
    }
    remove_existing(path)?;
    let target = link_target_from_bytes(target);
    platform.symlink(Path::new(&target), path)?;
    Ok(())
}

/// Replaces whatever is at `path` with a regular file holding the bytes of
/// `reader`, returning how many bytes were written.
///
/// On failure the partially written file is removed.
pub fn write_file(
    path: &Path,
    mode: u32,
    reader: &mut dyn Read,
    buffer: &mut [u8],
) -> Result<u64> {
    remove_existing(path)?;

    // Exclusive creation never follows a symlink planted after the removal.
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode & PERMISSION_MASK);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = match options.open(path) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            remove_existing(path)?;
            options.open(path)?
        }
        opened => opened?,
    };
    let written = copy_with_buffer(reader, &mut file, buffer).and_then(|n| {
        file.flush()?;
        Ok(n)
    });

    if written.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(path) {
            debug!("could not remove partial file {}: {e}", path.display());
        }
    }
    written
}
