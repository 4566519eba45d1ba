//! Archive entry classification.

/// Mask selecting the file-type bits of a unix mode.
pub const S_IFMT: u32 = 0o170_000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040_000;
/// Symbolic link type bits.
pub const S_IFLNK: u32 = 0o120_000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100_000;

/// Mask selecting permission bits, including setuid, setgid and sticky.
pub const PERMISSION_MASK: u32 = 0o7777;

/// What an entry materializes as.
///
/// # Examples
///
/// ```
/// use parex_core::types::EntryKind;
///
/// assert_eq!(EntryKind::from_mode(0o040_755), EntryKind::Directory);
/// assert_eq!(EntryKind::from_mode(0o120_777), EntryKind::Symlink);
/// assert_eq!(EntryKind::from_mode(0o100_644), EntryKind::File);
/// assert_eq!(EntryKind::from_mode(0o644), EntryKind::File);
/// assert_eq!(EntryKind::from_mode(0o010_644), EntryKind::Irregular);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,

    /// Directory.
    Directory,

    /// Symbolic link; the entry content is the link target.
    Symlink,

    /// Device, FIFO, socket or anything else; never extracted.
    Irregular,
}

impl EntryKind {
    /// Classifies a unix mode by its type bits.
    ///
    /// A mode without type bits is a regular file.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            0 | S_IFREG => Self::File,
            S_IFDIR => Self::Directory,
            S_IFLNK => Self::Symlink,
            _ => Self::Irregular,
        }
    }

    /// Returns `true` if this is a regular file.
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    /// Returns `true` if this is a directory.
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns `true` if this is a symlink.
    #[must_use]
    pub const fn is_symlink(self) -> bool {
        matches!(self, Self::Symlink)
    }

    /// Returns `true` if entries of this kind are extracted.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Irregular)
    }
}
