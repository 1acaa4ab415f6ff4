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

//! Classification of the source argument and destination-name guessing.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::normalize_path;

/// A source argument resolved to an on-disk location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepoSource {
    /// Canonical absolute path of the repository root or bundle file.
    pub path: PathBuf,
    pub is_bundle: bool,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(
        "No directory name could be guessed.\n\
         Please specify a directory on the command line"
    )]
    NoDirectoryName,
    #[error(transparent)]
    Path(#[from] PathError),
}

fn is_dir_sep(b: u8) -> bool {
    b == b'/' || (cfg!(windows) && b == b'\\')
}

/// Whether `path` looks like the root of a repository's git-dir.
pub fn is_repo_root(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
}

const GITFILE_SIGNATURE: &[u8] = b"gitdir: ";

/// Reads a gitfile pointer.
///
/// A gitfile is recognized only when it is a regular file, at least 8 bytes
/// long, and begins with `gitdir: `; anything shorter or differently prefixed
/// is silently not a gitfile. A relative target is anchored at the gitfile's
/// directory.
pub fn read_gitfile(path: &Path) -> Result<Option<PathBuf>, PathError> {
    let content = fs::read(path).context(path)?;
    let Some(rest) = content.strip_prefix(GITFILE_SIGNATURE) else {
        return Ok(None);
    };
    let line_end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    let Ok(text) = str::from_utf8(&rest[..line_end]) else {
        return Ok(None);
    };
    let text = text.trim_end();
    if text.is_empty() {
        return Ok(None);
    }
    let target = Path::new(text);
    let target = if target.is_absolute() {
        target.to_path_buf()
    } else {
        match path.parent() {
            Some(parent) => parent.join(target),
            None => target.to_path_buf(),
        }
    };
    Ok(Some(normalize_path(&target)))
}

fn absolute(path: &Path) -> Result<PathBuf, PathError> {
    let abs = std::path::absolute(path).context(path)?;
    Ok(normalize_path(&abs))
}

/// Resolves the source argument to a local repository root or bundle file.
///
/// Returns `None` when the argument matches nothing on disk; the caller
/// decides whether that means "remote URL" or "no such repository".
pub fn resolve_source(repo_name: &str) -> Result<Option<RepoSource>, SourceError> {
    const REPO_SUFFIXES: [&str; 4] = ["/.git", "", ".git/.git", ".git"];
    const BUNDLE_SUFFIXES: [&str; 2] = [".bundle", ""];

    for suffix in REPO_SUFFIXES {
        let candidate = PathBuf::from(format!("{repo_name}{suffix}"));
        let Ok(metadata) = fs::metadata(&candidate) else {
            continue;
        };
        if metadata.is_dir() && is_repo_root(&candidate) {
            return Ok(Some(RepoSource {
                path: absolute(&candidate)?,
                is_bundle: false,
            }));
        }
        if metadata.is_file() && metadata.len() >= GITFILE_SIGNATURE.len() as u64 {
            if let Some(target) = read_gitfile(&candidate)?
                && is_repo_root(&target)
            {
                return Ok(Some(RepoSource {
                    path: absolute(&target)?,
                    is_bundle: false,
                }));
            }
        }
    }

    for suffix in BUNDLE_SUFFIXES {
        let candidate = PathBuf::from(format!("{repo_name}{suffix}"));
        if fs::metadata(&candidate).is_ok_and(|m| m.is_file()) {
            return Ok(Some(RepoSource {
                path: absolute(&candidate)?,
                is_bundle: true,
            }));
        }
    }

    Ok(None)
}

/// Derives a destination directory name from the source argument.
pub fn guess_destination(repo: &str, is_bundle: bool, bare: bool) -> Result<String, SourceError> {
    let bytes = repo.as_bytes();

    // Skip scheme.
    let mut start = match repo.find("://") {
        Some(pos) => pos + 3,
        None => 0,
    };
    let mut end = bytes.len();

    // Skip authentication data. The stripping happens greedily, up to the
    // last '@' inside the host part.
    let mut ptr = start;
    while ptr < end && !is_dir_sep(bytes[ptr]) {
        if bytes[ptr] == b'@' {
            start = ptr + 1;
        }
        ptr += 1;
    }

    // Strip trailing spaces, slashes and /.git
    while start < end && (is_dir_sep(bytes[end - 1]) || bytes[end - 1].is_ascii_whitespace()) {
        end -= 1;
    }
    if end - start > 5 && is_dir_sep(bytes[end - 5]) && &bytes[end - 4..end] == b".git" {
        end -= 5;
        while start < end && is_dir_sep(bytes[end - 1]) {
            end -= 1;
        }
    }

    // Strip a trailing port number if we've got only a hostname (no dir
    // separator but a colon). URIs like '/foo/bar:2222.git' must keep
    // resulting in a dir '2222' for backwards compatibility.
    if !bytes[start..end].contains(&b'/') && bytes[start..end].contains(&b':') {
        let mut ptr = end;
        while start < ptr && bytes[ptr - 1].is_ascii_digit() && bytes[ptr - 1] != b':' {
            ptr -= 1;
        }
        if start < ptr && bytes[ptr - 1] == b':' {
            end = ptr - 1;
        }
    }

    // Find the last component. To remain backwards compatible, colons also
    // count as path separators, so 'foo:bar.git' guesses 'bar'.
    let mut ptr = end;
    while start < ptr && !is_dir_sep(bytes[ptr - 1]) && bytes[ptr - 1] != b':' {
        ptr -= 1;
    }
    start = ptr;

    let name = &repo[start..end];
    let suffix = if is_bundle { ".bundle" } else { ".git" };
    let name = name.strip_suffix(suffix).unwrap_or(name);

    if name.is_empty() || name == "/" {
        return Err(SourceError::NoDirectoryName);
    }

    // The bare suffix goes on before the whitespace pass so that a space
    // right in front of it survives.
    let mut raw = name.to_owned();
    if bare {
        raw.push_str(".git");
    }

    // Replace sequences of control characters and whitespace with one ascii
    // space, remove leading and trailing spaces.
    let mut dir = String::with_capacity(raw.len());
    let mut prev_space = true; // strip leading whitespace
    for ch in raw.chars() {
        let ch = if (ch as u32) < 0x20 { ' ' } else { ch };
        if ch.is_ascii_whitespace() {
            if prev_space {
                continue;
            }
            prev_space = true;
        } else {
            prev_space = false;
        }
        dir.push(ch);
    }
    if dir.ends_with(' ') {
        dir.pop();
    }
    Ok(dir)
}

/// Trims trailing directory separators, keeping at least one character.
pub fn strip_trailing_slashes(dir: &str) -> &str {
    let bytes = dir.as_bytes();
    let mut end = bytes.len();
    while end > 1 && is_dir_sep(bytes[end - 1]) {
        end -= 1;
    }
    &dir[..end]
}
