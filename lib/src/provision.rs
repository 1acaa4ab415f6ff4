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

//! Provisioning of the destination's on-disk layout.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::copy_dir_contents;
use crate::file_util::create_or_reuse_dir;
use crate::file_util::write_file_atomically;
use crate::repo_config::ConfigError;
use crate::repo_config::RepoConfig;

/// Branch name a fresh repository's HEAD points at before anything is
/// fetched, and the branch configured when cloning an empty remote.
pub const DEFAULT_BRANCH: &str = "master";

const DESCRIPTION_STUB: &str =
    "Unnamed repository; edit this file 'description' to name the repository.\n";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("destination path '{0}' already exists and is not an empty directory")]
    DestinationNotEmpty(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Creates every missing ancestor of `path`, but not `path` itself.
pub fn create_leading_dirs(path: &Path) -> Result<(), PathError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context(parent)?;
    }
    Ok(())
}

/// Lays down the skeleton of a git-dir: template files first, then the
/// object database, ref hierarchy, HEAD, hooks and description. Files the
/// template already provided are left alone.
pub fn init_repo_layout(git_dir: &Path, template_dir: Option<&Path>) -> Result<(), ProvisionError> {
    fs::create_dir_all(git_dir).context(git_dir)?;
    if let Some(template_dir) = template_dir {
        copy_dir_contents(template_dir, git_dir)?;
    }
    for dir in [
        "objects",
        "objects/info",
        "objects/pack",
        "refs",
        "refs/heads",
        "refs/tags",
        "hooks",
    ] {
        let path = git_dir.join(dir);
        create_or_reuse_dir(&path).context(&path)?;
    }
    let head = git_dir.join("HEAD");
    if !head.exists() {
        write_file_atomically(&head, format!("ref: refs/heads/{DEFAULT_BRANCH}\n").as_bytes())?;
    }
    let description = git_dir.join("description");
    if !description.exists() {
        write_file_atomically(&description, DESCRIPTION_STUB.as_bytes())?;
    }
    Ok(())
}

/// Applies the `--config` pairs to the fresh repository.
pub fn write_config_params(git_dir: &Path, params: &[String]) -> Result<(), ProvisionError> {
    if params.is_empty() {
        return Ok(());
    }
    let mut config = RepoConfig::load(git_dir)?;
    for param in params {
        config.apply_parameter(param)?;
    }
    config.save()?;
    Ok(())
}

/// Plants the gitfile pointer used with `--separate-git-dir`: the work tree's
/// `.git` is a file naming the real git-dir elsewhere.
pub fn write_gitfile(work_tree: &Path, git_dir: &Path) -> Result<(), PathError> {
    let content = format!("gitdir: {}\n", git_dir.display());
    write_file_atomically(&work_tree.join(".git"), content.as_bytes())
}
