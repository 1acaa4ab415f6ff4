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

//! Child tools the clone delegates to.
//!
//! Pack indexing, repacking, and submodule recursion are separate executables
//! spawned synchronously. Their stdio is captured and their stderr parsed
//! into typed errors; the clone does not advance until they exit.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::process::Stdio;

use bstr::ByteSlice as _;
use thiserror::Error;

pub const INDEX_PACK_TOOL: &str = "index-pack";
pub const REPACK_TOOL: &str = "repack";
pub const SUBMODULE_TOOL: &str = "submodule";
pub const UNPACK_TREES_TOOL: &str = "unpack-trees";

/// `(tool, environment variable)` pairs through which the executable for a
/// child tool can be replaced.
pub const TOOL_ENV_OVERRIDES: [(&str, &str); 4] = [
    (INDEX_PACK_TOOL, "RECLONE_INDEX_PACK"),
    (REPACK_TOOL, "RECLONE_REPACK"),
    (SUBMODULE_TOOL, "RECLONE_SUBMODULE"),
    (UNPACK_TREES_TOOL, "RECLONE_UNPACK_TREES"),
];

/// Error originating from a child tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Could not execute tool '{path}'")]
    Spawn {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("Failed to wait for tool '{0}'")]
    Wait(String, #[source] io::Error),
    #[error("Tool '{tool}' failed:\n{stderr}")]
    Failed { tool: String, stderr: String },
}

/// Context for spawning child tools against one repository.
#[derive(Clone, Debug)]
pub struct ToolContext {
    git_dir: PathBuf,
    overrides: HashMap<String, PathBuf>,
}

impl ToolContext {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
            overrides: HashMap::new(),
        }
    }

    /// Replaces the executable used for `tool`, mainly so tests can
    /// substitute scripted stand-ins.
    pub fn override_tool(&mut self, tool: &str, program: impl Into<PathBuf>) {
        self.overrides.insert(tool.to_owned(), program.into());
    }

    fn program(&self, tool: &str) -> PathBuf {
        self.overrides
            .get(tool)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(tool))
    }

    fn create_command(&self, tool: &str) -> Command {
        let mut command = Command::new(self.program(tool));
        command
            // Disable translation and other locale-dependent behavior so we
            // can parse the output.
            .env("LC_ALL", "C")
            .current_dir(&self.git_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }

    fn run(&self, tool: &str, mut command: Command) -> Result<Output, ToolError> {
        tracing::debug!(cmd = ?command, "spawning a child tool");
        let child = command.spawn().map_err(|error| ToolError::Spawn {
            path: self.program(tool),
            error,
        })?;
        let output = child
            .wait_with_output()
            .map_err(|error| ToolError::Wait(tool.to_owned(), error))?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(ToolError::Failed {
                tool: tool.to_owned(),
                stderr: output.stderr.to_str_lossy().into_owned(),
            })
        }
    }

    /// Indexes a downloaded primer pack.
    ///
    /// `--clone-bundle` makes the tool drop a bundle-header sidecar next to
    /// the pack; `--check-self-contained-and-connected` rejects packs that
    /// reference objects they do not carry.
    pub fn spawn_index_pack(&self, pack_path: &Path, idx_path: &Path) -> Result<(), ToolError> {
        let mut command = self.create_command(INDEX_PACK_TOOL);
        command
            .arg("--clone-bundle")
            .arg("--check-self-contained-and-connected")
            .arg("-o")
            .arg(idx_path)
            .arg(pack_path);
        self.run(INDEX_PACK_TOOL, command).map(|_| ())
    }

    /// Repacks all objects into a fresh self-contained pack.
    pub fn spawn_repack(&self) -> Result<(), ToolError> {
        let mut command = self.create_command(REPACK_TOOL);
        command.args(["-a", "-d"]);
        self.run(REPACK_TOOL, command).map(|_| ())
    }

    /// Initializes and updates submodules recursively in the work tree.
    pub fn spawn_submodule_update(&self, work_tree: &Path) -> Result<(), ToolError> {
        let mut command = self.create_command(SUBMODULE_TOOL);
        command
            .args(["update", "--init", "--recursive"])
            .current_dir(work_tree);
        self.run(SUBMODULE_TOOL, command).map(|_| ())
    }

    /// Populates the work tree from the given commit.
    pub fn spawn_unpack_trees(
        &self,
        work_tree: &Path,
        commit_hex: &str,
    ) -> Result<(), ToolError> {
        let mut command = self.create_command(UNPACK_TREES_TOOL);
        command
            .arg("--git-dir")
            .arg(&self.git_dir)
            .arg(commit_hex)
            .current_dir(work_tree);
        self.run(UNPACK_TREES_TOOL, command).map(|_| ())
    }
}
