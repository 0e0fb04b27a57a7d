//! Path Validation module for destination path mirroring
//!
//! The batch driver derives every destination path from its source path
//! before any concurrent work begins. This module performs that derivation and
//! rejects paths that could escape the destination tree:
//!
//! - Paths outside the source root
//! - Parent directory (`..`) or absolute components in the relative part
//! - Null bytes
//! - Over-long paths and filenames
//!
//! ## Usage Examples
//!
//! ```rust
//! use fuzzy_clahe::path_validation::mirror_path;
//! use std::path::{Path, PathBuf};
//!
//! let dest = mirror_path(
//!     Path::new("/data/MURA"),
//!     Path::new("/data/MURA-enhanced"),
//!     Path::new("/data/MURA/train/XR_HAND/image1.png"),
//! )
//! .unwrap();
//! assert_eq!(dest, PathBuf::from("/data/MURA-enhanced/train/XR_HAND/image1.png"));
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Errors that can occur during path validation
#[derive(Debug, Clone, PartialEq)]
pub enum PathValidationError {
    /// Path is not located under the source root
    OutsideRoot,
    /// Path contains dangerous traversal sequences (..) or absolute components
    PathTraversal,
    /// Path contains null bytes
    NullByte,
    /// Filename is too long
    FilenameTooLong,
    /// Path is too long
    PathTooLong,
    /// Empty path provided
    EmptyPath,
}

impl fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationError::OutsideRoot => write!(f, "Path is outside the source root"),
            PathValidationError::PathTraversal => write!(f, "Path contains traversal components"),
            PathValidationError::NullByte => write!(f, "Path contains a null byte"),
            PathValidationError::FilenameTooLong => write!(
                f,
                "Filename exceeds {} bytes",
                MAX_FILENAME_LENGTH
            ),
            PathValidationError::PathTooLong => {
                write!(f, "Path exceeds {} bytes", MAX_PATH_LENGTH)
            }
            PathValidationError::EmptyPath => write!(f, "Path is empty"),
        }
    }
}

impl std::error::Error for PathValidationError {}

/// Result type for path validation operations
pub type PathValidationResult<T> = Result<T, PathValidationError>;

/// Maximum allowed filename length (255 bytes on most filesystems)
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum allowed path length (4096 bytes on most systems)
pub const MAX_PATH_LENGTH: usize = 4096;

/// Validate the part of a path below the source root.
///
/// Only normal and `.` components are accepted. An empty path (the root
/// itself) is valid.
pub fn validate_relative_path(relative: &Path) -> PathValidationResult<()> {
    let raw = relative.as_os_str();
    if raw.len() > MAX_PATH_LENGTH {
        return Err(PathValidationError::PathTooLong);
    }
    if raw.as_encoded_bytes().contains(&0) {
        return Err(PathValidationError::NullByte);
    }

    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                if name.len() > MAX_FILENAME_LENGTH {
                    return Err(PathValidationError::FilenameTooLong);
                }
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PathValidationError::PathTraversal);
            }
        }
    }

    Ok(())
}

/// Map `path` under `source_root` to the same relative location under `dest_root`.
pub fn mirror_path(
    source_root: &Path,
    dest_root: &Path,
    path: &Path,
) -> PathValidationResult<PathBuf> {
    if path.as_os_str().is_empty() || source_root.as_os_str().is_empty() {
        return Err(PathValidationError::EmptyPath);
    }

    let relative = path
        .strip_prefix(source_root)
        .map_err(|_| PathValidationError::OutsideRoot)?;
    validate_relative_path(relative)?;

    if relative.as_os_str().is_empty() {
        return Ok(dest_root.to_path_buf());
    }
    let mirrored = dest_root.join(relative);
    if mirrored.as_os_str().len() > MAX_PATH_LENGTH {
        return Err(PathValidationError::PathTooLong);
    }
    Ok(mirrored)
}

/// Whether `path` lies at or below `root` (component-wise, no filesystem access).
///
/// Both paths must already be canonical; `.` and `..` are not resolved here.
pub fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_path_preserves_structure() {
        let dest = mirror_path(
            Path::new("src_root"),
            Path::new("out"),
            Path::new("src_root/a/b/c.png"),
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("out/a/b/c.png"));
    }

    #[test]
    fn test_mirror_path_of_root_is_dest_root() {
        let dest = mirror_path(Path::new("src_root"), Path::new("out"), Path::new("src_root")).unwrap();
        assert_eq!(dest, PathBuf::from("out"));
    }

    #[test]
    fn test_mirror_path_rejects_outside_root() {
        let result = mirror_path(
            Path::new("src_root"),
            Path::new("out"),
            Path::new("elsewhere/c.png"),
        );
        assert_eq!(result, Err(PathValidationError::OutsideRoot));
    }

    #[test]
    fn test_mirror_path_rejects_traversal() {
        let result = mirror_path(
            Path::new("src_root"),
            Path::new("out"),
            Path::new("src_root/../../etc/passwd"),
        );
        assert_eq!(result, Err(PathValidationError::PathTraversal));
    }

    #[test]
    fn test_mirror_path_rejects_empty() {
        let result = mirror_path(Path::new("src_root"), Path::new("out"), Path::new(""));
        assert_eq!(result, Err(PathValidationError::EmptyPath));
    }

    #[test]
    fn test_validate_relative_path_limits() {
        assert!(validate_relative_path(Path::new("a/./b.png")).is_ok());
        assert!(validate_relative_path(Path::new("")).is_ok());

        let long_name = "x".repeat(MAX_FILENAME_LENGTH + 1);
        assert_eq!(
            validate_relative_path(Path::new(&long_name)),
            Err(PathValidationError::FilenameTooLong)
        );

        let long_path = vec!["abc"; MAX_PATH_LENGTH / 3].join("/");
        assert_eq!(
            validate_relative_path(Path::new(&long_path)),
            Err(PathValidationError::PathTooLong)
        );

        assert_eq!(
            validate_relative_path(Path::new("a\0b.png")),
            Err(PathValidationError::NullByte)
        );
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(Path::new("/data"), Path::new("/data/x.png")));
        assert!(!is_within(Path::new("/data"), Path::new("/database/x.png")));
    }
}
