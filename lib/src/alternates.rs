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

//! Alternates wiring for `--reference` donors, and object lookup through the
//! alternates chain.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::write_file_atomically;
use crate::object_id::ObjectId;
use crate::source::read_gitfile;
use crate::tools::ToolContext;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum AlternatesError {
    #[error("reference repository '{0}' as a linked checkout is not supported yet")]
    LinkedCheckout(String),
    #[error("reference repository '{0}' is not a local repository")]
    NotLocal(String),
    #[error("reference repository '{0}' is shallow")]
    Shallow(String),
    #[error("reference repository '{0}' is grafted")]
    Grafted(String),
    #[error("cannot repack to clean up")]
    Repack(#[source] ToolError),
    #[error(transparent)]
    Path(#[from] PathError),
}

pub fn alternates_path(git_dir: &Path) -> PathBuf {
    git_dir.join("objects").join("info").join("alternates")
}

/// Object-database roots listed in the alternates file, comments skipped,
/// relative entries anchored at the repository's own objects directory.
pub fn read_alternates(git_dir: &Path) -> Result<Vec<PathBuf>, PathError> {
    let path = alternates_path(git_dir);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => {
            return Err(PathError {
                path,
                source: err,
            });
        }
    };
    let objects_dir = git_dir.join("objects");
    Ok(content
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let entry = Path::new(line);
            if entry.is_absolute() {
                entry.to_path_buf()
            } else {
                objects_dir.join(entry)
            }
        })
        .collect())
}

/// Appends one object-database root to the alternates file. Entries already
/// present are not re-appended.
pub fn add_to_alternates_file(git_dir: &Path, objects_dir: &Path) -> Result<(), PathError> {
    let path = alternates_path(git_dir);
    let parent = path.parent().expect("alternates file has a parent");
    fs::create_dir_all(parent).context(parent)?;
    let mut content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(PathError {
                path,
                source: err,
            });
        }
    };
    let entry = objects_dir.display().to_string();
    if content.lines().any(|line| line == entry) {
        return Ok(());
    }
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&entry);
    content.push('\n');
    write_file_atomically(&path, content.as_bytes())
}

/// Wires one `--reference` donor repository into the alternates list.
///
/// The donor may be a work tree, a gitfile pointer, or a git-dir; linked
/// worktrees, shallow and grafted donors are rejected because objects behind
/// them cannot be borrowed safely.
pub fn add_reference(git_dir: &Path, donor: &str) -> Result<(), AlternatesError> {
    let canonical = dunce::canonicalize(donor).context(donor)?;
    let mut ref_git = canonical;
    let mut followed_gitfile = false;

    if ref_git.is_file() {
        if let Some(target) = read_gitfile(&ref_git)? {
            ref_git = target;
            followed_gitfile = true;
        }
    } else if ref_git.join(".git").is_file() {
        if let Some(target) = read_gitfile(&ref_git.join(".git"))? {
            ref_git = target;
            followed_gitfile = true;
        }
    }

    if !followed_gitfile && ref_git.join(".git").join("objects").is_dir() {
        ref_git = ref_git.join(".git");
    } else if !ref_git.join("objects").is_dir() {
        if ref_git.join("commondir").is_file() {
            return Err(AlternatesError::LinkedCheckout(donor.to_owned()));
        }
        return Err(AlternatesError::NotLocal(donor.to_owned()));
    }

    if ref_git.join("shallow").is_file() {
        return Err(AlternatesError::Shallow(donor.to_owned()));
    }
    if ref_git.join("info").join("grafts").is_file() {
        return Err(AlternatesError::Grafted(donor.to_owned()));
    }

    add_to_alternates_file(git_dir, &ref_git.join("objects"))?;
    Ok(())
}

/// Materializes all borrowed objects locally and drops the alternates file.
///
/// Used by `--dissociate` after fetching completed and before checkout.
pub fn dissociate_from_alternates(
    git_dir: &Path,
    tools: &ToolContext,
) -> Result<(), AlternatesError> {
    let path = alternates_path(git_dir);
    if !path.is_file() {
        return Ok(());
    }
    tools.spawn_repack().map_err(AlternatesError::Repack)?;
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(PathError {
            path,
            source: err,
        }
        .into()),
    }
}

fn loose_object_path(objects_dir: &Path, hex: &str) -> Option<PathBuf> {
    (hex.len() > 2).then(|| objects_dir.join(&hex[..2]).join(&hex[2..]))
}

fn pack_indexes_contain(objects_dir: &Path, hex: &str) -> Result<bool, PathError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(false);
    }
    for entry in pack_dir.read_dir().context(&pack_dir)? {
        let entry = entry.context(&pack_dir)?;
        let path = entry.path();
        if path.extension() != Some("idx".as_ref()) {
            continue;
        }
        // A pack index lists the contained object ids, one hex id per line.
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        if content.lines().any(|line| line.trim() == hex) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether the object is present in the repository's object database,
/// including databases borrowed through alternates.
pub fn object_exists(git_dir: &Path, oid: &ObjectId) -> Result<bool, PathError> {
    let hex = oid.hex();
    let mut roots = vec![git_dir.join("objects")];
    roots.extend(read_alternates(git_dir)?);
    for objects_dir in roots {
        if let Some(path) = loose_object_path(&objects_dir, &hex)
            && path.is_file()
        {
            return Ok(true);
        }
        if pack_indexes_contain(&objects_dir, &hex)? {
            return Ok(true);
        }
    }
    Ok(false)
}
