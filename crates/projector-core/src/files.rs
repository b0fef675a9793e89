//! File helpers shared by the builder and the extractor.

use crate::error::{Error, Result};
use std::fs::{self, Permissions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::trace;

/// Reads a whole input file
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
    trace!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Size of an input file, without reading it
pub(crate) fn file_len(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| Error::file_read(path, e))
}

/// Permission bits of an input file
pub(crate) fn file_permissions(path: &Path) -> Result<Permissions> {
    fs::metadata(path)
        .map(|m| m.permissions())
        .map_err(|e| Error::file_read(path, e))
}

/// Strips execute bits so extracted payloads are plain data files
#[cfg(unix)]
pub(crate) fn data_permissions(mut permissions: Permissions) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(permissions.mode() & 0o666);
    permissions
}

/// Execute permission is not a mode bit here; the image's permissions are
/// already data permissions
#[cfg(not(unix))]
pub(crate) fn data_permissions(permissions: Permissions) -> Permissions {
    permissions
}

/// Writes `contents` to a temporary file next to `path`, then renames it
/// into place. A failed write leaves any existing file at `path` untouched.
pub(crate) fn write_atomic(
    path: &Path,
    contents: &[u8],
    overwrite: bool,
    permissions: Option<Permissions>,
) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(Error::output_exists(path));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::file_write(path, e))?;
    trace!("Staging {} bytes in {}", contents.len(), temp.path().display());

    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| Error::file_write(path, e))?;

    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::file_write(path, e))?;
    }

    let persisted = if overwrite {
        temp.persist(path)
    } else {
        temp.persist_noclobber(path)
    };

    match persisted {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Err(Error::output_exists(path)),
        Err(e) => Err(Error::file_write(path, e.error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");

        write_atomic(&path, b"first", true, None).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        write_atomic(&path, b"second", true, None).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_write_atomic_no_clobber() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        fs::write(&path, b"keep").unwrap();

        let err = write_atomic(&path, b"replace", false, None).unwrap_err();
        assert!(matches!(err, Error::OutputExists { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"keep");
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        let err = write_atomic(&path, b"data", true, None).unwrap_err();
        assert!(matches!(err, Error::FileWrite { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_file(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_data_permissions_drop_exec() {
        use std::os::unix::fs::PermissionsExt;
        let permissions = data_permissions(Permissions::from_mode(0o755));
        assert_eq!(permissions.mode() & 0o777, 0o644);
    }
}
