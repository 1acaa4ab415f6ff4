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

//! Object-database transfer for same-filesystem sources.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::alternates::add_to_alternates_file;
use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::copy_file_with_mtime;
use crate::file_util::create_or_reuse_dir;
use crate::file_util::normalize_path;

#[derive(Clone, Copy, Debug)]
pub struct LocalCloneOptions {
    /// Borrow the source's objects through alternates instead of copying.
    pub shared: bool,
    /// Copy even when a hardlink would be possible.
    pub no_hardlinks: bool,
    /// `--local` was forced: a failed hardlink is an error instead of a
    /// fallback to copying.
    pub require_hardlinks: bool,
}

#[derive(Debug, Error)]
pub enum LocalCloneError {
    #[error("failed to create link '{0}'")]
    CreateLink(PathBuf, #[source] io::Error),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Populates the destination's object database from a local source repo,
/// either by alternates (`--shared`) or by hardlink/copy mirroring.
pub fn clone_local(
    src_repo: &Path,
    dest_git_dir: &Path,
    options: &LocalCloneOptions,
) -> Result<(), LocalCloneError> {
    if options.shared {
        add_to_alternates_file(dest_git_dir, &src_repo.join("objects"))?;
        return Ok(());
    }
    let mut use_hardlinks = !options.no_hardlinks;
    copy_or_link_directory(
        &src_repo.join("objects"),
        &dest_git_dir.join("objects"),
        src_repo,
        dest_git_dir,
        Path::new(""),
        &mut use_hardlinks,
        options.require_hardlinks,
    )
}

fn copy_or_link_directory(
    src: &Path,
    dest: &Path,
    src_repo: &Path,
    dest_git_dir: &Path,
    rel: &Path,
    use_hardlinks: &mut bool,
    require_hardlinks: bool,
) -> Result<(), LocalCloneError> {
    create_or_reuse_dir(dest).context(dest)?;
    for entry in src.read_dir().context(src)? {
        let entry = entry.context(src)?;
        let name = entry.file_name();
        let src_path = entry.path();
        let dest_path = dest.join(&name);
        let rel_path = rel.join(&name);

        let metadata = match fs::metadata(&src_path) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!(path = %src_path.display(), %err, "failed to stat, skipping");
                continue;
            }
        };
        if metadata.is_dir() {
            // dot-directories carry repository-local state, not objects
            if !name.to_string_lossy().starts_with('.') {
                copy_or_link_directory(
                    &src_path,
                    &dest_path,
                    src_repo,
                    dest_git_dir,
                    &rel_path,
                    use_hardlinks,
                    require_hardlinks,
                )?;
            }
            continue;
        }

        // The alternates file cannot be copied bit-for-bit: relative entries
        // must be re-anchored at the source, and entries recorded by
        // `--shared` must survive.
        if rel_path == Path::new("info/alternates") {
            copy_alternates(&src_path, src_repo, dest_git_dir)?;
            continue;
        }

        match fs::remove_file(&dest_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(PathError {
                    path: dest_path,
                    source: err,
                }
                .into());
            }
        }
        if *use_hardlinks {
            match fs::hard_link(&src_path, &dest_path) {
                Ok(()) => continue,
                Err(err) if require_hardlinks => {
                    return Err(LocalCloneError::CreateLink(dest_path, err));
                }
                Err(_) => {
                    // e.g. crossing a filesystem boundary; copy from here on
                    *use_hardlinks = false;
                }
            }
        }
        copy_file_with_mtime(&src_path, &dest_path)?;
    }
    Ok(())
}

fn copy_alternates(
    src_alternates: &Path,
    src_repo: &Path,
    dest_git_dir: &Path,
) -> Result<(), LocalCloneError> {
    let content = fs::read_to_string(src_alternates).context(src_alternates)?;
    for line in content.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = Path::new(line);
        if entry.is_absolute() {
            add_to_alternates_file(dest_git_dir, entry)?;
        } else {
            let abs = normalize_path(&src_repo.join("objects").join(entry));
            add_to_alternates_file(dest_git_dir, &abs)?;
        }
    }
    Ok(())
}
