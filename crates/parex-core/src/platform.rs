//! Platform capabilities for ownership, permissions and symlinks.
//!
//! The extraction pipeline never branches on the target OS itself. It calls
//! through a [`Platform`] trait object, which is [`UnixPlatform`] on unix
//! and [`NoopPlatform`] everywhere else. Tests inject their own
//! implementation to simulate failures.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Filesystem primitives whose availability depends on the platform.
///
/// Every method operates on the node at `path` itself and never follows a
/// symlink.
pub trait Platform: Send + Sync + std::fmt::Debug {
    /// Returns `true` if ownership can be restored on this platform.
    fn supports_ownership(&self) -> bool;

    /// Changes owner and group of the node.
    fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()>;

    /// Sets permission bits of the node.
    ///
    /// `is_symlink` lets implementations skip links on systems that cannot
    /// change a link's own mode.
    fn lchmod(&self, path: &Path, mode: u32, is_symlink: bool) -> io::Result<()>;

    /// Creates a symbolic link at `link` pointing to `target`.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;
}

/// Unix implementation backed by `std::os::unix`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixPlatform;

#[cfg(unix)]
impl Platform for UnixPlatform {
    fn supports_ownership(&self) -> bool {
        true
    }

    fn lchown(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid))
    }

    fn lchmod(&self, path: &Path, mode: u32, is_symlink: bool) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        // Linux has no lchmod; a link's own mode is meaningless there.
        if is_symlink {
            return Ok(());
        }
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }
}

/// Fallback for platforms without unix ownership, modes or symlinks.
///
/// Ownership and permission calls succeed without doing anything; symlink
/// creation fails with `Unsupported`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPlatform;

impl Platform for NoopPlatform {
    fn supports_ownership(&self) -> bool {
        false
    }

    fn lchown(&self, _path: &Path, _uid: u32, _gid: u32) -> io::Result<()> {
        Ok(())
    }

    fn lchmod(&self, _path: &Path, _mode: u32, _is_symlink: bool) -> io::Result<()> {
        Ok(())
    }

    fn symlink(&self, _target: &Path, link: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!(
                "symlinks are not supported on this platform: {}",
                link.display()
            ),
        ))
    }
}

/// Returns the implementation for the current platform.
#[must_use]
pub fn native() -> Arc<dyn Platform> {
    #[cfg(unix)]
    {
        Arc::new(UnixPlatform)
    }

    #[cfg(not(unix))]
    {
        Arc::new(NoopPlatform)
    }
}

/// Converts raw symlink target bytes from an archive into an OS string.
#[cfg(unix)]
#[must_use]
pub fn link_target_from_bytes(bytes: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

/// Converts raw symlink target bytes from an archive into an OS string.
#[cfg(not(unix))]
#[must_use]
pub fn link_target_from_bytes(bytes: Vec<u8>) -> OsString {
    OsString::from(String::from_utf8_lossy(&bytes).into_owned())
}
