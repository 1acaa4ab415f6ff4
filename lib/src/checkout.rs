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

//! The final checkout stage.
//!
//! Resolves the freshly-written HEAD, hands tree population to the external
//! unpack tool, and recurses into submodules when asked. By the time this
//! runs the repository is complete; failures here keep it on disk.

use std::path::Path;

use thiserror::Error;

use crate::refs::RefStore;
use crate::refs::RefStoreError;
use crate::refs::RefTarget;
use crate::report::Reporter;
use crate::tools::ToolContext;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("HEAD not found below refs/heads!")]
    HeadNotUnderHeads,
    #[error("unable to checkout working tree")]
    Unpack(#[source] ToolError),
    #[error("submodule update failed")]
    Submodule(#[source] ToolError),
    #[error(transparent)]
    Refs(#[from] RefStoreError),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CheckoutOptions {
    pub no_checkout: bool,
    pub recursive: bool,
}

/// Populates the work tree from HEAD.
///
/// A HEAD that cannot be resolved (the remote's HEAD referred to a ref that
/// was never fetched) is a warning, not an error; there is simply nothing to
/// check out.
pub fn run_checkout(
    store: &RefStore,
    work_tree: Option<&Path>,
    tools: &ToolContext,
    options: &CheckoutOptions,
    reporter: &mut dyn Reporter,
) -> Result<(), CheckoutError> {
    if options.no_checkout {
        return Ok(());
    }
    let Some(work_tree) = work_tree else {
        return Ok(());
    };

    let head = store.read("HEAD")?;
    let oid = match &head {
        Some(RefTarget::Symbolic(target)) => {
            if !target.starts_with("refs/heads/") {
                return Err(CheckoutError::HeadNotUnderHeads);
            }
            store.resolve(target)?
        }
        Some(RefTarget::Object(oid)) => Some(oid.clone()),
        None => None,
    };
    let Some(oid) = oid else {
        reporter.warning("remote HEAD refers to nonexistent ref, unable to checkout.");
        return Ok(());
    };
    if let Some(RefTarget::Object(_)) = &head {
        reporter.status(&format!("Note: checking out '{}' (detached HEAD).", oid.hex()));
    }

    tools
        .spawn_unpack_trees(work_tree, &oid.hex())
        .map_err(CheckoutError::Unpack)?;

    if options.recursive {
        tools
            .spawn_submodule_update(work_tree)
            .map_err(CheckoutError::Submodule)?;
    }
    Ok(())
}
