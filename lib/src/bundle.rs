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

//! Bundle headers.
//!
//! A bundle carries a pack prefixed by a header naming its tip objects. The
//! `.bndl` sidecar the pack indexer drops next to a primer pack is the same
//! header on its own, which lets resumption reconstruct staging refs without
//! re-reading the pack.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::write_file_atomically;
use crate::object_id::ObjectId;

pub const BUNDLE_SIGNATURE: &str = "# v2 bundle";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("'{0}' does not look like a bundle header")]
    MissingSignature(std::path::PathBuf),
    #[error("Malformed bundle header line '{0}'")]
    MalformedLine(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// One history tip recorded in a bundle header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BundleTip {
    pub oid: ObjectId,
    pub ref_name: String,
}

/// The reference list of a bundle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BundleHeader {
    pub tips: Vec<BundleTip>,
}

impl BundleHeader {
    /// Reads the header from a sidecar file or from the front of a full
    /// bundle; anything past the first blank line is payload and ignored.
    pub fn read_from(path: &Path) -> Result<Self, BundleError> {
        let bytes = fs::read(path).context(path)?;
        let header_len = bytes
            .windows(2)
            .position(|pair| pair == b"\n\n")
            .map_or(bytes.len(), |pos| pos + 1);
        let text = str::from_utf8(&bytes[..header_len])
            .map_err(|_| BundleError::MissingSignature(path.to_path_buf()))?;

        let mut lines = text.lines();
        if lines.next() != Some(BUNDLE_SIGNATURE) {
            return Err(BundleError::MissingSignature(path.to_path_buf()));
        }
        let mut tips = vec![];
        for line in lines {
            if line.is_empty() {
                break;
            }
            if line.starts_with('#') {
                continue;
            }
            let (hex, ref_name) = line
                .split_once(' ')
                .ok_or_else(|| BundleError::MalformedLine(line.to_owned()))?;
            let oid = ObjectId::try_from_hex(hex)
                .ok_or_else(|| BundleError::MalformedLine(line.to_owned()))?;
            tips.push(BundleTip {
                oid,
                ref_name: ref_name.to_owned(),
            });
        }
        Ok(Self { tips })
    }

    /// Writes the header alone, the `.bndl` sidecar format.
    pub fn write_to(&self, path: &Path) -> Result<(), PathError> {
        let mut content = format!("{BUNDLE_SIGNATURE}\n");
        for tip in &self.tips {
            content.push_str(&format!("{} {}\n", tip.oid.hex(), tip.ref_name));
        }
        write_file_atomically(path, content.as_bytes())
    }
}
