//! Safety copy of a file taken before its first modification.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to the original file name for the backup copy.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".tf-backup";

/// A copy of the original file, kept next to it.
///
/// The backup is removed by [`release`](Self::release) once the run has
/// succeeded. Dropping a backup leaves the copy on disk.
#[derive(Debug)]
pub struct FileBackup {
    original: PathBuf,
    backup: PathBuf,
}

impl FileBackup {
    /// Copy `path` to `path` + `suffix`, replacing any stale backup.
    pub fn create(path: &Path, suffix: &str) -> io::Result<Self> {
        let mut name: OsString = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?
            .to_os_string();
        name.push(suffix);
        let backup = path.with_file_name(name);

        fs::copy(path, &backup)?;
        tracing::debug!("Backed up {} to {}", path.display(), backup.display());
        Ok(Self {
            original: path.to_path_buf(),
            backup,
        })
    }

    pub fn path(&self) -> &Path {
        &self.backup
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Put the original contents back, consuming the backup.
    pub fn restore(self) -> io::Result<PathBuf> {
        fs::rename(&self.backup, &self.original)?;
        tracing::info!("Restored {} from backup", self.original.display());
        Ok(self.original)
    }

    /// Delete the backup copy.
    pub fn release(self) -> io::Result<()> {
        match fs::remove_file(&self.backup) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Stop managing the backup and return where it lives.
    pub fn keep(self) -> PathBuf {
        self.backup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_create_and_release() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "movie.mkv", "original");

        let backup = FileBackup::create(&path, DEFAULT_BACKUP_SUFFIX).unwrap();
        assert_eq!(backup.path(), dir.path().join("movie.mkv.tf-backup"));
        assert_eq!(fs::read_to_string(backup.path()).unwrap(), "original");

        let backup_path = backup.path().to_path_buf();
        backup.release().unwrap();
        assert!(!backup_path.exists());
        assert!(path.exists());
    }

    #[test]
    fn test_restore() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "movie.mkv", "original");
        let backup = FileBackup::create(&path, ".bak").unwrap();

        fs::write(&path, "broken").unwrap();
        let restored = backup.restore().unwrap();
        assert_eq!(restored, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(FileBackup::create(&dir.path().join("absent.mkv"), ".bak").is_err());
    }
}
