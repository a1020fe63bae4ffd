use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the archive folder created inside the target directory.
pub const ARCHIVE_DIR_NAME: &str = "duplicates_archive";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive path exists but is not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Invalid file name: {path}")]
    InvalidFileName { path: String },

    #[error("Failed to move {from} → {to}: {source}")]
    Move {
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The file now lives at this path inside the archive.
    Archived(PathBuf),
    /// Nothing was at the source path when the move was attempted.
    AlreadyAbsent,
}

/// Moves losing files into a flat archive folder.
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Archive living at `<target_dir>/duplicates_archive`.
    pub fn for_target(target_dir: &Path) -> Self {
        Self::new(target_dir.join(ARCHIVE_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `file` into the archive, keeping its base name.
    ///
    /// A name already taken in the archive gets a `(N)` counter before the
    /// extension; nothing in the archive is ever overwritten. A source that is
    /// missing, or disappears before the move, yields `AlreadyAbsent`.
    pub fn archive(&self, file: &Path) -> Result<ArchiveOutcome, ArchiveError> {
        self.ensure_dir()?;

        if !file.is_file() {
            return Ok(ArchiveOutcome::AlreadyAbsent);
        }

        let file_name = file.file_name().ok_or_else(|| ArchiveError::InvalidFileName {
            path: file.to_string_lossy().to_string(),
        })?;
        let mut dest = unique_destination(&self.dir, file_name);

        loop {
            match relocate_file(file, &dest) {
                Ok(()) => {
                    log::info!("Archived {} → {}", file.display(), dest.display());
                    return Ok(ArchiveOutcome::Archived(dest));
                }
                // taken between the lookup and the move; pick the next free name
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    log::debug!("{} appeared while archiving; retrying", dest.display());
                    dest = unique_destination(&self.dir, file_name);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound && !file.exists() => {
                    log::debug!("{} vanished before it could be archived", file.display());
                    return Ok(ArchiveOutcome::AlreadyAbsent);
                }
                Err(e) => {
                    return Err(ArchiveError::Move {
                        from: file.to_string_lossy().to_string(),
                        to: dest.to_string_lossy().to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    fn ensure_dir(&self) -> Result<(), ArchiveError> {
        if self.dir.is_dir() {
            return Ok(());
        }
        if self.dir.exists() {
            return Err(ArchiveError::NotADirectory {
                path: self.dir.to_string_lossy().to_string(),
            });
        }
        fs::create_dir_all(&self.dir)?;
        log::info!("Created archive directory {}", self.dir.display());
        Ok(())
    }
}

/// First free path for `file_name` in `dir`: `name.ext`, then `name(1).ext`, ...
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let initial = dir.join(file_name);
    if !initial.exists() {
        return initial;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name.extension().and_then(|s| s.to_str()).unwrap_or("");

    let mut counter = 1;
    loop {
        let candidate = if ext.is_empty() {
            format!("{}({})", stem, counter)
        } else {
            format!("{}({}).{}", stem, counter, ext)
        };
        let candidate = dir.join(candidate);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Move `src` to `dest`, failing with `AlreadyExists` instead of replacing an
/// existing `dest`.
fn relocate_file(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(src, dest) {
        Ok(()) => fs::remove_file(src).inspect_err(|_| {
            if src.exists() {
                let _ = fs::remove_file(dest);
            }
        }),
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::CrossesDevices | io::ErrorKind::Unsupported
            ) =>
        {
            copy_new(src, dest)
        }
        Err(err) => Err(err),
    }
}

// Copy then delete, for moves that cannot be done with a link.
fn copy_new(src: &Path, dest: &Path) -> io::Result<()> {
    let mut reader = fs::File::open(src)?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)?;
    if let Err(e) = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all()) {
        drop(writer);
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    fs::remove_file(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_moves_file_and_creates_dir() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("b.jpg");
        fs::write(&file, b"loser").unwrap();

        let store = ArchiveStore::for_target(temp_dir.path());
        assert!(!store.dir().exists());

        let outcome = store.archive(&file).unwrap();
        let expected = temp_dir.path().join(ARCHIVE_DIR_NAME).join("b.jpg");
        assert_eq!(outcome, ArchiveOutcome::Archived(expected.clone()));
        assert!(!file.exists());
        assert_eq!(fs::read(expected).unwrap(), b"loser");
    }

    #[test]
    fn test_archive_missing_file_is_already_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArchiveStore::for_target(temp_dir.path());

        let outcome = store.archive(&temp_dir.path().join("gone.jpg")).unwrap();
        assert_eq!(outcome, ArchiveOutcome::AlreadyAbsent);
    }

    #[test]
    fn test_archive_twice_is_noop_second_time() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("b.jpg");
        fs::write(&file, b"x").unwrap();

        let store = ArchiveStore::for_target(temp_dir.path());
        assert!(matches!(store.archive(&file).unwrap(), ArchiveOutcome::Archived(_)));
        assert_eq!(store.archive(&file).unwrap(), ArchiveOutcome::AlreadyAbsent);
    }

    #[test]
    fn test_collision_gets_counter_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArchiveStore::for_target(temp_dir.path());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("b.jpg"), b"first").unwrap();
        fs::write(store.dir().join("b(1).jpg"), b"second").unwrap();

        let file = temp_dir.path().join("b.jpg");
        fs::write(&file, b"third").unwrap();

        let outcome = store.archive(&file).unwrap();
        let expected = store.dir().join("b(2).jpg");
        assert_eq!(outcome, ArchiveOutcome::Archived(expected.clone()));
        assert_eq!(fs::read(store.dir().join("b.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(store.dir().join("b(1).jpg")).unwrap(), b"second");
        assert_eq!(fs::read(expected).unwrap(), b"third");
    }

    #[test]
    fn test_relocate_never_replaces_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("b.jpg");
        let dest = temp_dir.path().join("taken.jpg");
        fs::write(&src, b"loser").unwrap();
        fs::write(&dest, b"already here").unwrap();

        let err = relocate_file(&src, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&src).unwrap(), b"loser");
        assert_eq!(fs::read(&dest).unwrap(), b"already here");
    }

    #[test]
    fn test_copy_fallback_refuses_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("b.jpg");
        let dest = temp_dir.path().join("taken.jpg");
        fs::write(&src, b"loser").unwrap();
        fs::write(&dest, b"already here").unwrap();

        let err = copy_new(&src, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"already here");

        fs::remove_file(&dest).unwrap();
        copy_new(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"loser");
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("README"), b"").unwrap();

        let dest = unique_destination(temp_dir.path(), OsStr::new("README"));
        assert_eq!(dest, temp_dir.path().join("README(1)"));
    }

    #[test]
    fn test_archive_path_occupied_by_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(ARCHIVE_DIR_NAME), b"not a dir").unwrap();
        let file = temp_dir.path().join("b.jpg");
        fs::write(&file, b"x").unwrap();

        let store = ArchiveStore::for_target(temp_dir.path());
        let result = store.archive(&file);
        assert!(matches!(result, Err(ArchiveError::NotADirectory { .. })));
        assert!(file.exists());
    }
}
