use serde::{Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// One image, identified by its resolved path inside the target directory.
///
/// The parent directory is canonicalized through the filesystem while the
/// file name is kept as-is, so two refs built from `./a.jpg`, `/abs/dir/a.jpg`
/// or `dir/../dir/a.jpg` compare equal, and a file that has already been
/// archived still resolves to the path it used to have.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn from_path(path: &Path) -> Self {
        let Some(file_name) = path.file_name() else {
            return Self(lexical_normalize(path));
        };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let parent = fs::canonicalize(&parent).unwrap_or_else(|_| lexical_normalize(&parent));
        Self(parent.join(file_name))
    }

    /// Resolve a name handed back by a similarity provider against `target_dir`.
    ///
    /// Relative names are joined onto the target directory and absolute names
    /// are taken as given. Whatever does not end up under the target directory
    /// (a scratch copy of the images, or a `../` escape) is re-rooted there by
    /// base name.
    pub fn resolve(target_dir: &Path, name: &str) -> Self {
        let raw = Path::new(name);
        let candidate = if raw.is_relative() {
            Self::from_path(&target_dir.join(raw))
        } else {
            Self::from_path(raw)
        };

        let root = fs::canonicalize(target_dir).unwrap_or_else(|_| lexical_normalize(target_dir));
        if candidate.0.starts_with(&root) {
            return candidate;
        }

        match raw.file_name() {
            Some(file_name) => Self::from_path(&target_dir.join(file_name)),
            None => candidate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether a regular file is present at this path right now.
    pub fn exists(&self) -> bool {
        self.0.is_file()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string_lossy())
    }
}

/// Canonical identity of an unordered pair: both refs in path order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    low: ImageRef,
    high: ImageRef,
}

impl PairKey {
    pub fn new(a: &ImageRef, b: &ImageRef) -> Self {
        if a <= b {
            Self {
                low: a.clone(),
                high: b.clone(),
            }
        } else {
            Self {
                low: b.clone(),
                high: a.clone(),
            }
        }
    }

    pub fn is_self_pair(&self) -> bool {
        self.low == self.high
    }
}

// Used when the parent directory cannot be canonicalized (it no longer exists).
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
