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

//! Ref storage over loose ref files.
//!
//! The clone core only needs a small slice of a ref backend: existence
//! checks, symref creation, and all-or-nothing creation of a batch of refs.
//! This implementation keeps one file per ref under the git-dir, `ref: `
//! prefixed for symbolic refs and a hex object id otherwise.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::write_file_atomically;
use crate::object_id::ObjectId;

/// A ref advertised by a remote, optionally mapped to a local peer.
///
/// `peer_ref` names where the remote ref shall be stored locally (e.g. remote
/// `refs/heads/main` has peer `refs/remotes/origin/main`). Refs without a
/// peer are carried for HEAD guessing but never written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ref {
    pub name: String,
    pub old_oid: ObjectId,
    pub peer_ref: Option<String>,
}

impl Ref {
    pub fn new(name: impl Into<String>, old_oid: ObjectId) -> Self {
        Self {
            name: name.into(),
            old_oid,
            peer_ref: None,
        }
    }
}

/// Content of a loose ref file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RefTarget {
    Object(ObjectId),
    Symbolic(String),
}

#[derive(Debug, Error)]
pub enum RefStoreError {
    #[error("Invalid ref name '{0}'")]
    InvalidRefName(String),
    #[error("Ref '{0}' already exists")]
    RefAlreadyExists(String),
    #[error("Malformed ref file for '{0}'")]
    MalformedRef(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Loose ref files under a git-dir.
#[derive(Clone, Debug)]
pub struct RefStore {
    git_dir: PathBuf,
}

const SYMREF_PREFIX: &str = "ref: ";
const MAX_SYMREF_DEPTH: usize = 8;

fn check_ref_name(name: &str) -> Result<(), RefStoreError> {
    let bad_component = |c: &str| c.is_empty() || c == "." || c == ".." || c.contains('\0');
    if name.is_empty() || name.split('/').any(|c| bad_component(c)) {
        return Err(RefStoreError::InvalidRefName(name.to_owned()));
    }
    Ok(())
}

impl RefStore {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf, RefStoreError> {
        check_ref_name(name)?;
        Ok(self.git_dir.join(name))
    }

    pub fn ref_exists(&self, name: &str) -> bool {
        self.ref_path(name).is_ok_and(|path| path.is_file())
    }

    /// Reads one ref file without following symrefs.
    pub fn read(&self, name: &str) -> Result<Option<RefTarget>, RefStoreError> {
        let path = self.ref_path(name)?;
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
        let line = content.trim_end();
        if let Some(target) = line.strip_prefix(SYMREF_PREFIX) {
            Ok(Some(RefTarget::Symbolic(target.to_owned())))
        } else {
            let oid = ObjectId::try_from_hex(line)
                .ok_or_else(|| RefStoreError::MalformedRef(name.to_owned()))?;
            Ok(Some(RefTarget::Object(oid)))
        }
    }

    /// Resolves a ref to an object id, following symrefs.
    pub fn resolve(&self, name: &str) -> Result<Option<ObjectId>, RefStoreError> {
        let mut name = name.to_owned();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read(&name)? {
                None => return Ok(None),
                Some(RefTarget::Object(oid)) => return Ok(Some(oid)),
                Some(RefTarget::Symbolic(target)) => name = target,
            }
        }
        Err(RefStoreError::MalformedRef(name))
    }

    /// Creates or overwrites a ref. `msg` describes the update the way a
    /// reflog entry would; it is recorded in the trace log only.
    pub fn update(&self, name: &str, oid: &ObjectId, msg: &str) -> Result<(), RefStoreError> {
        tracing::debug!(name, %oid, msg, "updating ref");
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(parent)?;
        }
        write_file_atomically(&path, format!("{}\n", oid.hex()).as_bytes())?;
        Ok(())
    }

    /// Points `name` at another ref symbolically.
    pub fn create_symref(&self, name: &str, target: &str, msg: &str) -> Result<(), RefStoreError> {
        tracing::debug!(name, target, msg, "creating symref");
        check_ref_name(target)?;
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(parent)?;
        }
        write_file_atomically(&path, format!("{SYMREF_PREFIX}{target}\n").as_bytes())?;
        Ok(())
    }

    /// Deletes a ref if it exists. When `expected` is given, the ref is only
    /// deleted if it currently points there.
    pub fn delete(&self, name: &str, expected: Option<&ObjectId>) -> Result<(), RefStoreError> {
        let path = self.ref_path(name)?;
        if let Some(expected) = expected {
            match self.read(name)? {
                Some(RefTarget::Object(oid)) if &oid == expected => {}
                _ => return Ok(()),
            }
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PathError {
                path,
                source: err,
            }
            .into()),
        }
    }

    /// Lists `(name, oid)` for all object-valued refs under `prefix`, sorted
    /// by name. Symbolic entries are skipped.
    pub fn list(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>, RefStoreError> {
        check_ref_name(prefix)?;
        let root = self.git_dir.join(prefix);
        let mut result = vec![];
        if root.is_dir() {
            self.list_dir(prefix, &root, &mut result)?;
        }
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }

    fn list_dir(
        &self,
        prefix: &str,
        dir: &Path,
        result: &mut Vec<(String, ObjectId)>,
    ) -> Result<(), RefStoreError> {
        for entry in dir.read_dir().context(dir)? {
            let entry = entry.context(dir)?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let full_name = format!("{prefix}/{name}");
            let path = entry.path();
            if entry.file_type().context(&path)?.is_dir() {
                self.list_dir(&full_name, &path, result)?;
            } else if let Some(RefTarget::Object(oid)) = self.read(&full_name)? {
                result.push((full_name, oid));
            }
        }
        Ok(())
    }

    /// Opens a transaction creating refs all-or-nothing.
    pub fn transaction(&self) -> RefTransaction<'_> {
        RefTransaction {
            store: self,
            creates: vec![],
        }
    }
}

/// All-or-nothing batch of ref creations.
///
/// Every queued name must be absent when the transaction commits. On failure,
/// refs already written by this transaction are rolled back.
pub struct RefTransaction<'a> {
    store: &'a RefStore,
    creates: Vec<(String, ObjectId)>,
}

impl RefTransaction<'_> {
    pub fn create(&mut self, name: impl Into<String>, oid: ObjectId) {
        self.creates.push((name.into(), oid));
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty()
    }

    pub fn commit(self, msg: &str) -> Result<(), RefStoreError> {
        for (name, _) in &self.creates {
            if self.store.ref_exists(name) {
                return Err(RefStoreError::RefAlreadyExists(name.clone()));
            }
        }
        let mut written: Vec<&str> = vec![];
        for (name, oid) in &self.creates {
            match self.store.update(name, oid, msg) {
                Ok(()) => written.push(name),
                Err(err) => {
                    for name in written {
                        self.store.delete(name, None).ok();
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
