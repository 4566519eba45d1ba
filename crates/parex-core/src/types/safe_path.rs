//! Root-confined output path for a single archive entry.

use crate::ExtractionError;
use crate::Result;
use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use super::DestDir;

/// An entry's output path, proven to lie within the extraction root.
///
/// # Security Properties
///
/// - Can ONLY be constructed through [`SafePath::resolve`]
/// - NO `From<PathBuf>` implementation
/// - `.` and `..` components and redundant separators are resolved
///   lexically before the containment check
/// - Containment is checked component-wise, so a sibling such as
///   `/out-evil` never passes for root `/out`
///
/// # Examples
///
/// ```no_run
/// use parex_core::types::DestDir;
/// use parex_core::types::SafePath;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dest = DestDir::new("/tmp/out")?;
///
/// let safe = SafePath::resolve("docs/../readme.txt", &dest)?;
/// assert!(safe.as_path().ends_with("readme.txt"));
///
/// assert!(SafePath::resolve("../etc/passwd", &dest).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafePath {
    absolute: PathBuf,
    depth: usize,
}

impl SafePath {
    /// Resolves an archive entry name against the root.
    ///
    /// A leading `/` is treated as root-relative: entry names are relative to
    /// the archive, so `/etc/passwd` lands at `<root>/etc/passwd`.
    ///
    /// Ancestors that already exist on disk are checked too: a symlink among
    /// them must lead back inside the root, so an entry cannot be written
    /// through a link an earlier entry planted.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::PathEscape` if the name contains a NUL byte,
    /// carries a platform prefix (`C:`, `\\server\share`), resolves to a
    /// location outside the root, or sits below a symlink that leaves the
    /// root. Returns `Io` if an existing ancestor cannot be inspected.
    pub fn resolve(name: &str, dest: &DestDir) -> Result<Self> {
        let root = dest.as_path();
        let escape = |path: PathBuf| ExtractionError::PathEscape {
            path,
            root: root.to_path_buf(),
        };

        if name.contains('\0') {
            return Err(escape(root.join(name.replace('\0', "\\0"))));
        }

        let mut resolved = root.to_path_buf();
        for component in Path::new(name).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::CurDir | Component::RootDir => {}
                Component::Prefix(_) => return Err(escape(PathBuf::from(name))),
            }
        }

        if !dest.contains(&resolved) {
            return Err(escape(resolved));
        }
        check_existing_ancestors(&resolved, dest)?;

        let depth = resolved.components().count() - root.components().count();
        Ok(Self {
            absolute: resolved,
            depth,
        })
    }

    /// Returns the absolute output path.
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Number of components below the root; `0` for the root itself.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns `true` if the entry resolved to the root directory itself.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Converts into the inner `PathBuf`.
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.absolute
    }
}

/// Walks the existing directories between the root and `path`, following
/// every symlink among them to its final location.
fn check_existing_ancestors(path: &Path, dest: &DestDir) -> Result<()> {
    let root = dest.as_path();
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let Ok(relative) = parent.strip_prefix(root) else {
        return Ok(());
    };

    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        let meta = match fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if !meta.file_type().is_symlink() {
            continue;
        }
        let target = match current.canonicalize() {
            Ok(target) => target,
            // Dangling: whatever gets created through it lands at the target.
            Err(e) if e.kind() == io::ErrorKind::NotFound => current.clone(),
            Err(e) => return Err(e.into()),
        };
        if target == current || !dest.contains(&target) {
            return Err(ExtractionError::PathEscape {
                path: path.to_path_buf(),
                root: root.to_path_buf(),
            });
        }
    }
    Ok(())
}
