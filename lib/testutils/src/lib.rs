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

//! Test helpers for building source repositories and scripted child tools.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use reclone_lib::object_id::ObjectId;
use reclone_lib::refs::RefStore;
use reclone_lib::repo_config::RepoConfig;

pub fn new_temp_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("reclone-test-")
        .tempdir()
        .unwrap()
}

/// A repository laid out on disk the way the provisioner would, for use as a
/// clone source (or a hand-built destination) in tests.
pub struct TestRepo {
    pub git_dir: PathBuf,
}

impl TestRepo {
    pub fn init(git_dir: impl Into<PathBuf>) -> Self {
        let git_dir = git_dir.into();
        for dir in ["objects/info", "objects/pack", "refs/heads", "refs/tags"] {
            fs::create_dir_all(git_dir.join(dir)).unwrap();
        }
        fs::write(git_dir.join("HEAD"), "ref: refs/heads/master\n").unwrap();
        Self { git_dir }
    }

    pub fn store(&self) -> RefStore {
        RefStore::new(&self.git_dir)
    }

    pub fn config(&self) -> RepoConfig {
        RepoConfig::load(&self.git_dir).unwrap()
    }

    /// Drops a loose object file for the given id; content is arbitrary
    /// since the clone machinery treats objects as opaque.
    pub fn add_object(&self, hex: &str) {
        let dir = self.git_dir.join("objects").join(&hex[..2]);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(&hex[2..]), format!("object {hex}\n")).unwrap();
    }

    /// Creates a ref and the object it points at.
    pub fn set_ref(&self, name: &str, hex: &str) {
        self.add_object(hex);
        let oid = ObjectId::try_from_hex(hex).unwrap();
        self.store().update(name, &oid, "test setup").unwrap();
    }

    pub fn set_head_symref(&self, target: &str) {
        self.store().create_symref("HEAD", target, "test setup").unwrap();
    }

    pub fn set_head_detached(&self, hex: &str) {
        let oid = ObjectId::try_from_hex(hex).unwrap();
        self.store().update("HEAD", &oid, "test setup").unwrap();
    }

    /// Advertises a primer resource the way a server operator would, via the
    /// repository's own config.
    pub fn advertise_primer(&self, url: &str) {
        let mut config = self.config();
        config.set_str(&["primeclone", "url"], url).unwrap();
        config.set_str(&["primeclone", "filetype"], "pack").unwrap();
        config.save().unwrap();
    }
}

/// Writes an executable shell script, for standing in for a child tool.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A scripted `index-pack` that treats the pack as a text file of
/// `<hex> <refname>` lines: the bundle sidecar gets the signed header, the
/// index gets the bare object ids.
#[cfg(unix)]
pub fn fake_index_pack_script(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-index-pack",
        r#"idx="$4"
pack="$5"
bndl="${idx%.idx}.bndl"
{ printf '# v2 bundle\n'; cat "$pack"; } > "$bndl"
cut -d ' ' -f 1 "$pack" > "$idx"
"#,
    )
}

/// A scripted `index-pack` that always fails.
#[cfg(unix)]
pub fn failing_index_pack_script(dir: &Path) -> PathBuf {
    write_script(dir, "failing-index-pack", "echo 'pack is corrupt' >&2\nexit 1")
}

/// A scripted `unpack-trees` that records its arguments and succeeds.
#[cfg(unix)]
pub fn fake_unpack_trees_script(dir: &Path, marker: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-unpack-trees",
        &format!("echo \"$@\" > {}", marker.display()),
    )
}
