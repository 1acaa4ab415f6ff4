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

//! Resumption of an interrupted clone.
//!
//! While a primer transfer is in flight, the alt-resource being fetched is
//! persisted as a descriptor file under the git-dir. `--resume` later
//! reconstructs the interrupted invocation from that file plus the
//! destination's own config.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::file_util::PathError;
use crate::file_util::write_file_atomically;
use crate::repo_config::ConfigError;
use crate::repo_config::RepoConfig;
use crate::source::is_repo_root;
use crate::source::read_gitfile;
use crate::transport::AltResource;

/// File under the git-dir holding the in-flight alt-resource. Present only
/// between an interrupted primer and a successful resume.
pub const RESUMABLE_FILE: &str = "resumable";

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("'{0}' does not appear to be a repository")]
    NotARepo(PathBuf),
    #[error("'{0}' is configured for a work tree, but no candidate exists")]
    NoWorkTreeCandidate(PathBuf),
    #[error("--resume option used, but current directory is not resumable")]
    NotResumable,
    #[error("Malformed resume descriptor in {0}")]
    MalformedDescriptor(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// The alt-resource of an interrupted primer, persisted as two
/// newline-terminated lines.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResumeDescriptor {
    pub url: String,
    pub filetype: String,
}

impl From<AltResource> for ResumeDescriptor {
    fn from(res: AltResource) -> Self {
        Self {
            url: res.url,
            filetype: res.filetype,
        }
    }
}

impl From<ResumeDescriptor> for AltResource {
    fn from(descriptor: ResumeDescriptor) -> Self {
        Self {
            url: descriptor.url,
            filetype: descriptor.filetype,
        }
    }
}

impl ResumeDescriptor {
    pub fn path(git_dir: &Path) -> PathBuf {
        git_dir.join(RESUMABLE_FILE)
    }

    pub fn save(&self, git_dir: &Path) -> Result<(), PathError> {
        let content = format!("{}\n{}\n", self.url, self.filetype);
        write_file_atomically(&Self::path(git_dir), content.as_bytes())
    }

    /// Loads the descriptor. An absent file is not an error; it simply means
    /// there is nothing to resume.
    pub fn load(git_dir: &Path) -> Result<Option<Self>, ResumeError> {
        let path = Self::path(git_dir);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(PathError {
                    path,
                    source: err,
                }
                .into());
            }
        };
        let mut lines = content.lines();
        match (lines.next(), lines.next()) {
            (Some(url), Some(filetype)) if !url.is_empty() && !filetype.is_empty() => {
                Ok(Some(Self {
                    url: url.to_owned(),
                    filetype: filetype.to_owned(),
                }))
            }
            _ => Err(ResumeError::MalformedDescriptor(path)),
        }
    }

    pub fn remove(git_dir: &Path) -> Result<(), PathError> {
        let path = Self::path(git_dir);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PathError {
                path,
                source: err,
            }),
        }
    }
}

/// Remote-related configuration recovered from an existing destination.
#[derive(Clone, Debug, Default)]
pub struct RemoteConfig {
    pub name: Option<String>,
    pub fetch_pattern: Option<String>,
    pub worktree: Option<PathBuf>,
    pub bare: bool,
    pub mirror: bool,
}

/// Layout and configuration of an existing destination directory.
#[derive(Clone, Debug)]
pub struct ExistingState {
    pub git_dir: PathBuf,
    pub work_tree: Option<PathBuf>,
    pub remote: RemoteConfig,
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    rustix::fs::access(path, rustix::fs::Access::WRITE_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(_path: &Path) -> bool {
    true
}

/// Determines the git-dir, work-tree and remote configuration of an existing
/// destination, the inverse of what a fresh clone would have provisioned.
pub fn load_existing_state(dir: &Path) -> Result<ExistingState, ResumeError> {
    let (git_dir, mut work_tree) = if is_repo_root(dir) {
        (dir.to_path_buf(), None)
    } else {
        let gitfile = dir.join(".git");
        if gitfile.is_dir() && is_repo_root(&gitfile) {
            (gitfile, Some(dir.to_path_buf()))
        } else if gitfile.is_file() {
            let target = read_gitfile(&gitfile)?
                .filter(|target| is_repo_root(target))
                .ok_or_else(|| ResumeError::NotARepo(dir.to_path_buf()))?;
            (target, Some(dir.to_path_buf()))
        } else {
            return Err(ResumeError::NotARepo(dir.to_path_buf()));
        }
    };

    let config = RepoConfig::load(&git_dir)?;
    let name = config.remote_names().into_iter().next();
    let mut remote = RemoteConfig {
        name: name.clone(),
        fetch_pattern: None,
        worktree: config.get_str(&["core", "worktree"]).map(PathBuf::from),
        bare: config.get_bool(&["core", "bare"]).unwrap_or(false),
        mirror: false,
    };
    if let Some(name) = &name {
        remote.fetch_pattern = config
            .get_str(&["remote", name.as_str(), "fetch"])
            .map(str::to_owned);
        remote.mirror = config
            .get_bool(&["remote", name.as_str(), "mirror"])
            .unwrap_or(false);
    }

    if work_tree.is_none() {
        if let Some(configured) = &remote.worktree {
            work_tree = Some(configured.clone());
        } else if !remote.bare {
            // A git-dir named ".git" sits inside its work tree; anything else
            // has no candidate to offer.
            let parent = (git_dir.file_name() == Some(".git".as_ref()))
                .then(|| git_dir.parent())
                .flatten()
                .filter(|parent| is_writable(parent))
                .ok_or_else(|| ResumeError::NoWorkTreeCandidate(dir.to_path_buf()))?;
            work_tree = Some(parent.to_path_buf());
        }
    }

    Ok(ExistingState {
        git_dir,
        work_tree,
        remote,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_descriptor_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let descriptor = ResumeDescriptor {
            url: "https://host/primer.pack".to_owned(),
            filetype: "pack".to_owned(),
        };
        descriptor.save(temp_dir.path()).unwrap();
        assert_eq!(
            ResumeDescriptor::load(temp_dir.path()).unwrap(),
            Some(descriptor)
        );
        ResumeDescriptor::remove(temp_dir.path()).unwrap();
        assert_eq!(ResumeDescriptor::load(temp_dir.path()).unwrap(), None);
        // removing again is fine
        ResumeDescriptor::remove(temp_dir.path()).unwrap();
    }

    #[test]
    fn test_descriptor_missing_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(ResumeDescriptor::load(temp_dir.path()).unwrap(), None);
    }

    #[test]
    fn test_descriptor_malformed() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join(RESUMABLE_FILE), "url-only\n").unwrap();
        assert_matches!(
            ResumeDescriptor::load(temp_dir.path()),
            Err(ResumeError::MalformedDescriptor(_))
        );
    }

    fn make_repo_root(path: &Path) {
        fs::create_dir_all(path.join("objects")).unwrap();
        fs::create_dir_all(path.join("refs")).unwrap();
        fs::write(path.join("HEAD"), "ref: refs/heads/master\n").unwrap();
    }

    #[test]
    fn test_load_existing_state_from_work_tree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wt = temp_dir.path().join("clone");
        let git_dir = wt.join(".git");
        make_repo_root(&git_dir);
        let mut config = RepoConfig::load(&git_dir).unwrap();
        config
            .set_str(&["remote", "upstream", "url"], "host:repo")
            .unwrap();
        config
            .set_str(
                &["remote", "upstream", "fetch"],
                "+refs/heads/*:refs/remotes/upstream/*",
            )
            .unwrap();
        config.save().unwrap();

        let state = load_existing_state(&wt).unwrap();
        assert_eq!(state.git_dir, git_dir);
        assert_eq!(state.work_tree.as_deref(), Some(wt.as_path()));
        assert_eq!(state.remote.name.as_deref(), Some("upstream"));
        assert_eq!(
            state.remote.fetch_pattern.as_deref(),
            Some("+refs/heads/*:refs/remotes/upstream/*")
        );
        assert!(!state.remote.bare);
        assert!(!state.remote.mirror);
    }

    #[test]
    fn test_load_existing_state_from_git_dir_infers_work_tree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wt = temp_dir.path().join("clone");
        let git_dir = wt.join(".git");
        make_repo_root(&git_dir);

        // pointing at the git-dir itself recovers the parent as work tree
        let state = load_existing_state(&git_dir).unwrap();
        assert_eq!(state.git_dir, git_dir);
        assert_eq!(state.work_tree.as_deref(), Some(wt.as_path()));
    }

    #[test]
    fn test_load_existing_state_bare() {
        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("mirror.git");
        make_repo_root(&git_dir);
        let mut config = RepoConfig::load(&git_dir).unwrap();
        config.set_bool(&["core", "bare"], true).unwrap();
        config.save().unwrap();

        let state = load_existing_state(&git_dir).unwrap();
        assert_eq!(state.work_tree, None);
        assert!(state.remote.bare);
    }

    #[test]
    fn test_load_existing_state_not_a_repo() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_matches!(
            load_existing_state(temp_dir.path()),
            Err(ResumeError::NotARepo(_))
        );
    }

    #[test]
    fn test_load_existing_state_no_work_tree_candidate() {
        let temp_dir = tempfile::tempdir().unwrap();
        // non-bare git-dir not named ".git" and no core.worktree
        let git_dir = temp_dir.path().join("odd-git-dir");
        make_repo_root(&git_dir);
        assert_matches!(
            load_existing_state(&git_dir),
            Err(ResumeError::NoWorkTreeCandidate(_))
        );
    }
}
