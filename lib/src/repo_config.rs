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

//! Repository-local configuration.
//!
//! The `config` file under the git-dir is TOML, edited through `toml_edit` so
//! that keys and formatting the clone machinery does not know about survive a
//! round-trip. The keys used here are `remote.<name>.{url,fetch,mirror}`,
//! `core.{bare,worktree}`, and `branch.<name>.{remote,merge}`.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use toml_edit::DocumentMut;
use toml_edit::Item;
use toml_edit::value;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::write_file_atomically;

pub const CONFIG_FILE: &str = "config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },
    #[error("Config key '{0}' is not a table")]
    NotATable(String),
    #[error("Invalid config parameter '{0}'")]
    InvalidParameter(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Read/write access to one repository's `config` file.
#[derive(Debug)]
pub struct RepoConfig {
    path: PathBuf,
    doc: DocumentMut,
}

impl RepoConfig {
    /// Loads the config of the repository at `git_dir`, or an empty document
    /// if the file does not exist yet.
    pub fn load(git_dir: &Path) -> Result<Self, ConfigError> {
        let path = git_dir.join(CONFIG_FILE);
        let doc = match fs::read_to_string(&path) {
            Ok(text) => text.parse().map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => DocumentMut::new(),
            Err(err) => {
                return Err(PathError {
                    path,
                    source: err,
                }
                .into());
            }
        };
        Ok(Self { path, doc })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        write_file_atomically(&self.path, self.doc.to_string().as_bytes())?;
        Ok(())
    }

    fn leaf_table_mut(&mut self, segments: &[&str]) -> Result<&mut toml_edit::Table, ConfigError> {
        let (leaf, parents) = segments.split_last().expect("key must have segments");
        let mut table = self.doc.as_table_mut();
        for seg in parents {
            let item = table.entry(seg).or_insert_with(toml_edit::table);
            let name = seg.to_string();
            table = item.as_table_mut().ok_or(ConfigError::NotATable(name))?;
            table.set_implicit(true);
        }
        let item = table.entry(leaf).or_insert_with(toml_edit::table);
        let name = leaf.to_string();
        let table = item.as_table_mut().ok_or(ConfigError::NotATable(name))?;
        table.set_implicit(false);
        Ok(table)
    }

    fn get_item(&self, segments: &[&str]) -> Option<&Item> {
        let (leaf, parents) = segments.split_last()?;
        let mut table = self.doc.as_table();
        for seg in parents {
            table = table.get(seg)?.as_table()?;
        }
        table.get(leaf)
    }

    /// Sets `<section>...<key> = value`. The last segment is the key; the
    /// rest name nested tables which are created as needed.
    pub fn set_str(&mut self, segments: &[&str], v: &str) -> Result<(), ConfigError> {
        let (key, tables) = segments.split_last().expect("key must have segments");
        self.leaf_table_mut(tables)?.insert(key, value(v));
        Ok(())
    }

    pub fn set_bool(&mut self, segments: &[&str], v: bool) -> Result<(), ConfigError> {
        let (key, tables) = segments.split_last().expect("key must have segments");
        self.leaf_table_mut(tables)?.insert(key, value(v));
        Ok(())
    }

    pub fn get_str(&self, segments: &[&str]) -> Option<&str> {
        self.get_item(segments)?.as_str()
    }

    pub fn get_bool(&self, segments: &[&str]) -> Option<bool> {
        let item = self.get_item(segments)?;
        item.as_bool()
            .or_else(|| item.as_str().and_then(|s| s.parse().ok()))
    }

    /// Applies one `key=value` parameter as given on the command line. A bare
    /// `key` sets the boolean `true`, following the usual CLI convention.
    pub fn apply_parameter(&mut self, param: &str) -> Result<(), ConfigError> {
        let (key, val) = match param.split_once('=') {
            Some((key, val)) => (key, Some(val)),
            None => (param, None),
        };
        let segments: Vec<&str> = key.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::InvalidParameter(param.to_owned()));
        }
        match val {
            Some(val) => self.set_str(&segments, val),
            None => self.set_bool(&segments, true),
        }
    }

    /// Names of all configured remotes, in file order.
    pub fn remote_names(&self) -> Vec<String> {
        self.doc
            .as_table()
            .get("remote")
            .and_then(Item::as_table)
            .map(|table| table.iter().map(|(name, _)| name.to_owned()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config(dir: &Path) -> RepoConfig {
        RepoConfig::load(dir).unwrap()
    }

    #[test]
    fn test_set_and_render() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = empty_config(temp_dir.path());
        config
            .set_str(&["remote", "origin", "url"], "https://host/repo")
            .unwrap();
        config
            .set_str(
                &["remote", "origin", "fetch"],
                "+refs/heads/*:refs/remotes/origin/*",
            )
            .unwrap();
        config.set_bool(&["core", "bare"], true).unwrap();
        config.save().unwrap();

        let text = fs::read_to_string(temp_dir.path().join(CONFIG_FILE)).unwrap();
        // the intermediate [remote] table stays implicit
        assert!(text.contains("[remote.origin]"), "{text}");
        assert!(!text.contains("[remote]\n"), "{text}");
        assert!(text.contains(r#"url = "https://host/repo""#), "{text}");

        let config = empty_config(temp_dir.path());
        assert_eq!(
            config.get_str(&["remote", "origin", "fetch"]),
            Some("+refs/heads/*:refs/remotes/origin/*")
        );
        assert_eq!(config.get_bool(&["core", "bare"]), Some(true));
    }

    #[test]
    fn test_load_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            indoc::indoc! {r#"
                # written by hand
                [core]
                bare = false

                [remote.origin]
                url = "host:project.git"
                fetch = "+refs/heads/*:refs/remotes/origin/*"
            "#},
        )
        .unwrap();

        let mut config = empty_config(temp_dir.path());
        assert_eq!(
            config.get_str(&["remote", "origin", "url"]),
            Some("host:project.git")
        );
        assert_eq!(config.get_bool(&["core", "bare"]), Some(false));

        // edits keep what was already there, comments included
        config
            .set_str(&["remote", "origin", "mirror"], "true")
            .unwrap();
        config.save().unwrap();
        let text = fs::read_to_string(temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert!(text.contains("# written by hand"), "{text}");
        assert!(text.contains("host:project.git"), "{text}");
    }

    #[test]
    fn test_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = empty_config(temp_dir.path());
        config
            .set_str(&["remote", "upstream", "url"], "/src/repo")
            .unwrap();
        config.save().unwrap();

        let config = empty_config(temp_dir.path());
        assert_eq!(
            config.get_str(&["remote", "upstream", "url"]),
            Some("/src/repo")
        );
        assert_eq!(config.remote_names(), ["upstream"]);
        assert_eq!(config.get_str(&["remote", "origin", "url"]), None);
    }

    #[test]
    fn test_apply_parameter() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = empty_config(temp_dir.path());
        config.apply_parameter("user.name=A Hacker").unwrap();
        config.apply_parameter("core.autodetach").unwrap();
        assert_eq!(config.get_str(&["user", "name"]), Some("A Hacker"));
        assert_eq!(config.get_bool(&["core", "autodetach"]), Some(true));
        assert!(config.apply_parameter("nodot").is_err());
        assert!(config.apply_parameter(".empty=x").is_err());
    }

    #[test]
    fn test_get_bool_from_string_value() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = empty_config(temp_dir.path());
        config.apply_parameter("core.bare=true").unwrap();
        assert_eq!(config.get_bool(&["core", "bare"]), Some(true));
    }
}
