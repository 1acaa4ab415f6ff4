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

//! Priming the object database from an alt-resource.
//!
//! When the server advertises a pre-packaged resource, it is downloaded,
//! indexed, and pinned with staging refs before the regular fetch runs. The
//! staging refs live under `refs/temp/<origin>/resume/` so the objects
//! survive garbage collection without polluting the user-visible namespace;
//! the `.bndl` sidecar carries the tip list so a resumed run can reconstruct
//! them without re-downloading.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::bundle::BundleError;
use crate::bundle::BundleHeader;
use crate::file_util::replace_extension;
use crate::object_id::ObjectId;
use crate::ref_name::RemoteName;
use crate::refs::RefStore;
use crate::refs::RefStoreError;
use crate::report::Reporter;
use crate::tools::ToolContext;
use crate::tools::ToolError;
use crate::transport::AltResource;
use crate::transport::PACK_FILETYPE;
use crate::transport::TransportError;
use crate::transport::open_primer_transport;

#[derive(Debug, Error)]
pub enum PrimerError {
    #[error("alt resource filetype '{0}' is not supported")]
    UnsupportedFiletype(String),
    #[error("invalid pack filename '{0}'")]
    InvalidPackName(PathBuf),
    #[error("could not download primer resource")]
    Download(#[source] TransportError),
    #[error("could not index primer pack")]
    Index(#[source] ToolError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Refs(#[from] RefStoreError),
}

fn staging_ref_name(origin: &RemoteName, oid: &ObjectId) -> String {
    format!("refs/temp/{origin}/resume/temp-{}", oid.hex())
}

fn temp_download_path(resource_path: &Path) -> Option<PathBuf> {
    let name = resource_path.file_name()?;
    Some(resource_path.with_file_name(format!("{}.temp", name.to_string_lossy())))
}

/// Downloads the alt-resource into the destination's pack directory,
/// continuing an interrupted transfer when possible.
pub fn fetch_alt_resource(
    resource: &AltResource,
    git_dir: &Path,
    reporter: &mut dyn Reporter,
) -> Result<PathBuf, PrimerError> {
    reporter.status(&format!("Downloading primer: {}...", resource.url));
    let mut transport = open_primer_transport(&resource.url).map_err(PrimerError::Download)?;
    let pack_dir = git_dir.join("objects").join("pack");
    let path = transport
        .download_primer(resource, &pack_dir)
        .map_err(PrimerError::Download)?;
    transport.disconnect().map_err(PrimerError::Download)?;
    Ok(path)
}

fn setup_and_index_pack(tools: &ToolContext, pack_path: &Path) -> Result<PathBuf, PrimerError> {
    let idx_path = replace_extension(pack_path, ".pack", ".idx")
        .ok_or_else(|| PrimerError::InvalidPackName(pack_path.to_path_buf()))?;
    let bndl_path = replace_extension(pack_path, ".pack", ".bndl")
        .ok_or_else(|| PrimerError::InvalidPackName(pack_path.to_path_buf()))?;
    // an existing sidecar means a prior run already indexed this pack
    if !bndl_path.is_file() {
        tools
            .spawn_index_pack(pack_path, &idx_path)
            .map_err(PrimerError::Index)?;
    }
    Ok(bndl_path)
}

/// Pins every tip of the bundle header with a staging ref, one transaction
/// for all of them. Tips already pinned by an earlier run are kept.
pub fn write_bundle_refs(
    store: &RefStore,
    origin: &RemoteName,
    bndl_path: &Path,
) -> Result<(), PrimerError> {
    let header = BundleHeader::read_from(bndl_path)?;
    let mut tx = store.transaction();
    for tip in &header.tips {
        let name = staging_ref_name(origin, &tip.oid);
        if !store.ref_exists(&name) {
            tx.create(name, tip.oid.clone());
        }
    }
    if !tx.is_empty() {
        tx.commit("prime clone")?;
    }
    Ok(())
}

/// Ingests a downloaded alt-resource: index the pack, pin its tips.
pub fn use_alt_resource(
    tools: &ToolContext,
    store: &RefStore,
    origin: &RemoteName,
    resource: &AltResource,
    resource_path: &Path,
) -> Result<(), PrimerError> {
    if resource.filetype != PACK_FILETYPE {
        return Err(PrimerError::UnsupportedFiletype(resource.filetype.clone()));
    }
    let bndl_path = setup_and_index_pack(tools, resource_path)?;
    write_bundle_refs(store, origin, &bndl_path)
}

/// Removes primer leftovers, best effort.
///
/// After a successful prime the staging refs and the sidecar go; the pack and
/// its index stay, now owned by the object database. After a failed prime the
/// downloaded artifacts go too, so the fallback fetch starts from a clean
/// slate.
pub fn clean_alt_resource(
    store: &RefStore,
    origin: &RemoteName,
    resource: &AltResource,
    resource_path: Option<&Path>,
    prime_successful: bool,
) {
    if resource.filetype != PACK_FILETYPE {
        return;
    }
    let Some(resource_path) = resource_path else {
        return;
    };
    let bndl_path = replace_extension(resource_path, ".pack", ".bndl");

    if prime_successful
        && let Some(bndl_path) = &bndl_path
        && bndl_path.is_file()
    {
        match BundleHeader::read_from(bndl_path) {
            Ok(header) => {
                for tip in &header.tips {
                    let name = staging_ref_name(origin, &tip.oid);
                    if let Err(err) = store.delete(&name, Some(&tip.oid)) {
                        tracing::warn!(%name, %err, "failed to delete staging ref");
                    }
                }
            }
            Err(err) => tracing::warn!(%err, "failed to re-read bundle header for cleanup"),
        }
    }

    if !prime_successful {
        let mut doomed = vec![resource_path.to_path_buf()];
        if let Some(temp) = temp_download_path(resource_path) {
            doomed.push(temp);
        }
        if let Some(idx) = replace_extension(resource_path, ".pack", ".idx") {
            doomed.push(idx);
        }
        for path in doomed {
            if path.is_file()
                && let Err(err) = fs::remove_file(&path)
            {
                tracing::warn!(path = %path.display(), %err, "failed to remove primer artifact");
            }
        }
    }

    if let Some(bndl_path) = bndl_path
        && bndl_path.is_file()
        && let Err(err) = fs::remove_file(&bndl_path)
    {
        tracing::warn!(path = %bndl_path.display(), %err, "failed to remove bundle sidecar");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleTip;
    use crate::ref_name::DEFAULT_REMOTE;
    use crate::report::CollectingReporter;

    fn make_repo(path: &Path) -> RefStore {
        fs::create_dir_all(path.join("objects/pack")).unwrap();
        fs::create_dir_all(path.join("refs")).unwrap();
        fs::write(path.join("HEAD"), "ref: refs/heads/master\n").unwrap();
        RefStore::new(path)
    }

    fn tip(hex: &'static str, name: &str) -> BundleTip {
        BundleTip {
            oid: ObjectId::from_hex(hex),
            ref_name: name.to_owned(),
        }
    }

    #[test]
    fn test_fetch_alt_resource_downloads_into_pack_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("repo");
        make_repo(&git_dir);
        let src = temp_dir.path().join("primer.pack");
        fs::write(&src, b"pack bytes").unwrap();

        let resource = AltResource {
            url: src.to_str().unwrap().to_owned(),
            filetype: PACK_FILETYPE.to_owned(),
        };
        let mut reporter = CollectingReporter::default();
        let path = fetch_alt_resource(&resource, &git_dir, &mut reporter).unwrap();
        assert_eq!(path, git_dir.join("objects/pack/primer.pack"));
        assert_eq!(fs::read(&path).unwrap(), b"pack bytes");
        assert_eq!(reporter.statuses.len(), 1);
        assert!(reporter.statuses[0].starts_with("Downloading primer:"));
    }

    #[test]
    fn test_write_bundle_refs_creates_staging_refs_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("repo");
        let store = make_repo(&git_dir);
        let bndl = git_dir.join("objects/pack/primer.bndl");
        BundleHeader {
            tips: vec![tip("aa11", "refs/heads/main"), tip("bb22", "refs/heads/dev")],
        }
        .write_to(&bndl)
        .unwrap();

        write_bundle_refs(&store, DEFAULT_REMOTE, &bndl).unwrap();
        assert!(store.ref_exists("refs/temp/origin/resume/temp-aa11"));
        assert!(store.ref_exists("refs/temp/origin/resume/temp-bb22"));

        // a second pass sees the refs in place and stays quiet
        write_bundle_refs(&store, DEFAULT_REMOTE, &bndl).unwrap();
    }

    #[test]
    fn test_use_alt_resource_rejects_unknown_filetype() {
        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("repo");
        let store = make_repo(&git_dir);
        let tools = ToolContext::new(&git_dir);
        let resource = AltResource {
            url: "x".to_owned(),
            filetype: "tarball".to_owned(),
        };
        assert!(matches!(
            use_alt_resource(
                &tools,
                &store,
                DEFAULT_REMOTE,
                &resource,
                Path::new("x.pack")
            ),
            Err(PrimerError::UnsupportedFiletype(_))
        ));
    }

    #[test]
    fn test_use_alt_resource_rejects_non_pack_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("repo");
        let store = make_repo(&git_dir);
        let tools = ToolContext::new(&git_dir);
        let resource = AltResource {
            url: "x".to_owned(),
            filetype: PACK_FILETYPE.to_owned(),
        };
        assert!(matches!(
            use_alt_resource(
                &tools,
                &store,
                DEFAULT_REMOTE,
                &resource,
                Path::new("/x/primer.tar")
            ),
            Err(PrimerError::InvalidPackName(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_use_alt_resource_indexes_and_pins() {
        use std::os::unix::fs::PermissionsExt as _;

        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("repo");
        let store = make_repo(&git_dir);
        let pack = git_dir.join("objects/pack/primer.pack");
        fs::write(&pack, b"pack bytes").unwrap();

        // scripted index-pack: writes the idx and the bndl sidecar the way
        // the real tool would
        let bndl = git_dir.join("objects/pack/primer.bndl");
        let idx = git_dir.join("objects/pack/primer.idx");
        let script = temp_dir.path().join("fake-index-pack");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '# v2 bundle\\naa11 refs/heads/main\\n' > {}\nprintf 'aa11\\n' > {}\n",
                bndl.display(),
                idx.display(),
            ),
        )
        .unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();

        let mut tools = ToolContext::new(&git_dir);
        tools.override_tool(crate::tools::INDEX_PACK_TOOL, script);

        let resource = AltResource {
            url: "ignored".to_owned(),
            filetype: PACK_FILETYPE.to_owned(),
        };
        use_alt_resource(&tools, &store, DEFAULT_REMOTE, &resource, &pack).unwrap();
        assert!(store.ref_exists("refs/temp/origin/resume/temp-aa11"));

        // successful cleanup drops staging refs and the sidecar, keeps the pack
        clean_alt_resource(&store, DEFAULT_REMOTE, &resource, Some(&pack), true);
        assert!(!store.ref_exists("refs/temp/origin/resume/temp-aa11"));
        assert!(!bndl.exists());
        assert!(pack.exists());
        assert!(idx.exists());
    }

    #[test]
    fn test_clean_failed_prime_removes_artifacts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("repo");
        let store = make_repo(&git_dir);
        let pack_dir = git_dir.join("objects/pack");
        let pack = pack_dir.join("primer.pack");
        fs::write(&pack, b"pack").unwrap();
        fs::write(pack_dir.join("primer.pack.temp"), b"pa").unwrap();
        fs::write(pack_dir.join("primer.idx"), b"idx").unwrap();
        fs::write(pack_dir.join("primer.bndl"), b"# v2 bundle\n").unwrap();

        let resource = AltResource {
            url: "x".to_owned(),
            filetype: PACK_FILETYPE.to_owned(),
        };
        clean_alt_resource(&store, DEFAULT_REMOTE, &resource, Some(&pack), false);
        assert!(!pack.exists());
        assert!(!pack_dir.join("primer.pack.temp").exists());
        assert!(!pack_dir.join("primer.idx").exists());
        assert!(!pack_dir.join("primer.bndl").exists());
    }
}
