// Copyright 2024-2025 The Reclone Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filesystem helpers shared across the clone machinery.

use std::fs;
use std::fs::File;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tempfile::PersistError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Cannot access {path}")]
pub struct PathError {
    pub path: PathBuf,
    pub source: io::Error,
}

pub trait IoResultExt<T> {
    fn context(self, path: impl AsRef<Path>) -> Result<T, PathError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn context(self, path: impl AsRef<Path>) -> Result<T, PathError> {
        self.map_err(|error| PathError {
            path: path.as_ref().to_path_buf(),
            source: error,
        })
    }
}

/// Creates a directory or does nothing if the directory already exists.
///
/// The function will also fail if intermediate directories on the path do not
/// already exist.
pub fn create_or_reuse_dir(dirname: &Path) -> io::Result<()> {
    match fs::create_dir(dirname) {
        Ok(()) => Ok(()),
        Err(_) if dirname.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Whether the path names an existing directory with no entries.
pub fn is_empty_dir(path: &Path) -> Result<bool, PathError> {
    let mut entries = path.read_dir().context(path)?;
    Ok(entries.next().is_none())
}

/// Consumes as much `..` and `.` as possible without considering symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(result.components().next_back(), Some(Component::Normal(_))) =>
            {
                // Do not pop ".."
                let popped = result.pop();
                assert!(popped);
            }
            _ => {
                result.push(c);
            }
        }
    }

    if result.as_os_str().is_empty() {
        ".".into()
    } else {
        result
    }
}

/// Replaces the `existing` suffix of the file name with `replacement`.
///
/// Returns `None` when the file name does not end in `existing`; callers must
/// not assume the suffix is present.
pub fn replace_extension(path: &Path, existing: &str, replacement: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(existing)?;
    Some(path.with_file_name(format!("{stem}{replacement}")))
}

/// Persists the temporary file after synchronizing the content.
///
/// After system crash, the persisted file should have a valid content if
/// existed. However, the persisted file name (or directory entry) could be
/// lost. It's up to caller to synchronize the directory entries.
pub fn persist_temp_file<P: AsRef<Path>>(
    temp_file: NamedTempFile,
    new_path: P,
) -> io::Result<File> {
    temp_file.as_file().sync_data()?;
    temp_file
        .persist(new_path)
        .map_err(|PersistError { error, file: _ }| error)
}

/// Writes `content` to `path` through a temporary file in the same directory,
/// so that a partially-written file is never observable at `path`.
pub fn write_file_atomically(path: &Path, content: &[u8]) -> Result<(), PathError> {
    use std::io::Write as _;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(dir).context(dir)?;
    temp_file.write_all(content).context(path)?;
    persist_temp_file(temp_file, path).context(path)?;
    Ok(())
}

/// Bit-copies a regular file, carrying over the source modification time.
pub fn copy_file_with_mtime(src: &Path, dst: &Path) -> Result<(), PathError> {
    fs::copy(src, dst).context(dst)?;
    let mtime = fs::metadata(src).context(src)?.modified().context(src)?;
    let dst_file = File::options().write(true).open(dst).context(dst)?;
    dst_file.set_modified(mtime).context(dst)?;
    Ok(())
}

/// Recursively copies `src` into `dst`, creating directories as needed.
/// Existing files in `dst` are left alone.
pub fn copy_dir_contents(src: &Path, dst: &Path) -> Result<(), PathError> {
    create_or_reuse_dir(dst).context(dst)?;
    for entry in src.read_dir().context(src)? {
        let entry = entry.context(src)?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if entry.file_type().context(&src_path)?.is_dir() {
            copy_dir_contents(&src_path, &dst_path)?;
        } else if !dst_path.exists() {
            fs::copy(&src_path, &dst_path).context(&dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn test_normalize_too_many_dot_dot() {
        assert_eq!(normalize_path(Path::new("foo/..")), Path::new("."));
        assert_eq!(normalize_path(Path::new("foo/../..")), Path::new(".."));
        assert_eq!(
            normalize_path(Path::new("foo/../../../bar/baz/..")),
            Path::new("../../bar")
        );
    }

    #[test]
    fn test_replace_extension() {
        assert_eq!(
            replace_extension(Path::new("/x/primer.pack"), ".pack", ".idx"),
            Some(PathBuf::from("/x/primer.idx"))
        );
        // suffix not present
        assert_eq!(
            replace_extension(Path::new("/x/primer.tar"), ".pack", ".idx"),
            None
        );
    }

    #[test]
    fn test_is_empty_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(is_empty_dir(temp_dir.path()).unwrap());
        fs::write(temp_dir.path().join("file"), b"x").unwrap();
        assert!(!is_empty_dir(temp_dir.path()).unwrap());
        assert!(is_empty_dir(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_copy_file_with_mtime() {
        let temp_dir = tempfile::tempdir().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        let mut f = File::create(&src).unwrap();
        f.write_all(b"contents").unwrap();
        drop(f);
        copy_file_with_mtime(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"contents");
        assert_eq!(
            fs::metadata(&src).unwrap().modified().unwrap(),
            fs::metadata(&dst).unwrap().modified().unwrap()
        );
    }
}
