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

//! The transport seam.
//!
//! The clone controller talks to a remote exclusively through the
//! [`Transport`] trait: ref advertisement, object fetch, and the optional
//! primer probe. [`FileTransport`] implements it for same-machine sources
//! (repository directories, bundle files, raw primer resources); network
//! protocols plug in behind the same interface.

use std::fs;
use std::io;
use std::io::Read as _;
use std::io::Seek as _;
use std::io::Write as _;
use std::num::NonZeroU32;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::bundle::BundleError;
use crate::bundle::BundleHeader;
use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::create_or_reuse_dir;
use crate::object_id::ObjectId;
use crate::refs::Ref;
use crate::refs::RefStore;
use crate::refs::RefStoreError;

/// An out-of-band resource the server offers for bulk transfer before the
/// regular fetch. `"pack"` is the only filetype currently defined, but the
/// shape leaves room for other kinds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AltResource {
    pub url: String,
    pub filetype: String,
}

pub const PACK_FILETYPE: &str = "pack";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IpFamily {
    #[default]
    Any,
    V4,
    V6,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProgressMode {
    #[default]
    Auto,
    Force,
    Suppress,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Don't know how to clone '{0}'")]
    UnsupportedUrl(String),
    #[error("This transport cannot list refs")]
    RefsNotSupported,
    #[error("Failed to download '{url}'")]
    Download {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Refs(#[from] RefStoreError),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Options every transport accepts; network transports additionally act on
/// the address family and progress settings.
#[derive(Clone, Debug, Default)]
pub struct TransportOptions {
    pub verbosity: i32,
    pub progress: ProgressMode,
    pub family: IpFamily,
    /// Keep the downloaded pack instead of exploding it into loose objects.
    pub keep: bool,
    pub depth: Option<NonZeroU32>,
    pub follow_tags: bool,
    /// Path of the upload-pack counterpart on the remote.
    pub upload_pack: Option<String>,
    /// Path of the prime-clone counterpart on the remote.
    pub prime_clone: Option<String>,
}

pub trait Transport {
    fn options_mut(&mut self) -> &mut TransportOptions;

    /// Asks the server for an alternate resource to prime the clone with.
    /// `None` means the server offers nothing; the clone falls back to a
    /// plain fetch.
    fn prime_clone(&mut self) -> Result<Option<AltResource>, TransportError> {
        Ok(None)
    }

    /// The remote's ref advertisement. A `HEAD` pseudo-ref is included when
    /// the remote has one.
    fn get_refs_list(&mut self) -> Result<Vec<Ref>, TransportError>;

    /// Transfers the objects needed by `refs` into the destination's object
    /// database.
    fn fetch_refs(&mut self, git_dir: &Path, refs: &[Ref]) -> Result<(), TransportError>;

    /// Downloads the alt-resource into `pack_dir`, continuing a partial
    /// `.temp` transfer from an earlier interrupted run if one exists.
    fn download_primer(
        &mut self,
        resource: &AltResource,
        pack_dir: &Path,
    ) -> Result<PathBuf, TransportError>;

    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

enum FileSource {
    /// A repository root directory.
    Repo(PathBuf),
    /// A bundle file: header plus pack payload.
    Bundle(PathBuf),
    /// No ref source; only good for primer downloads.
    Raw,
}

/// Transport over the local filesystem.
pub struct FileTransport {
    url: String,
    source: FileSource,
    options: TransportOptions,
}

impl FileTransport {
    pub fn open_repo(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            source: FileSource::Repo(path.into()),
            options: TransportOptions::default(),
        }
    }

    pub fn open_bundle(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            source: FileSource::Bundle(path.into()),
            options: TransportOptions::default(),
        }
    }

    fn open_raw(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: FileSource::Raw,
            options: TransportOptions::default(),
        }
    }
}

fn url_to_path(url: &str) -> PathBuf {
    PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
}

/// Copies the loose objects named by `refs` from the source's object
/// database (or the databases it borrows through alternates) into the
/// destination. The wanted refs are the transfer's object list; everything
/// else stays behind.
fn copy_ref_objects(src_repo: &Path, git_dir: &Path, refs: &[Ref]) -> Result<(), PathError> {
    let mut roots = vec![src_repo.join("objects")];
    roots.extend(crate::alternates::read_alternates(src_repo)?);
    let dest_objects = git_dir.join("objects");
    create_or_reuse_dir(&dest_objects).context(&dest_objects)?;
    for r in refs {
        if r.old_oid.is_zero() {
            continue;
        }
        let hex = r.old_oid.hex();
        if hex.len() < 3 {
            continue;
        }
        for root in &roots {
            let src_path = root.join(&hex[..2]).join(&hex[2..]);
            if !src_path.is_file() {
                continue;
            }
            let dest_dir = dest_objects.join(&hex[..2]);
            fs::create_dir_all(&dest_dir).context(&dest_dir)?;
            let dest_path = dest_dir.join(&hex[2..]);
            if !dest_path.exists() {
                fs::copy(&src_path, &dest_path).context(&dest_path)?;
            }
            break;
        }
    }
    Ok(())
}

impl Transport for FileTransport {
    fn options_mut(&mut self) -> &mut TransportOptions {
        &mut self.options
    }

    /// A file source advertises a primer through its own config, the
    /// `primeclone.url` / `primeclone.filetype` keys a server operator would
    /// set next to a pre-built pack.
    fn prime_clone(&mut self) -> Result<Option<AltResource>, TransportError> {
        let FileSource::Repo(path) = &self.source else {
            return Ok(None);
        };
        let Ok(config) = crate::repo_config::RepoConfig::load(path) else {
            return Ok(None);
        };
        let Some(url) = config.get_str(&["primeclone", "url"]) else {
            return Ok(None);
        };
        let filetype = config
            .get_str(&["primeclone", "filetype"])
            .unwrap_or(PACK_FILETYPE);
        tracing::debug!(url, filetype, "remote advertises a clone primer");
        Ok(Some(AltResource {
            url: url.to_owned(),
            filetype: filetype.to_owned(),
        }))
    }

    fn get_refs_list(&mut self) -> Result<Vec<Ref>, TransportError> {
        match &self.source {
            FileSource::Repo(path) => {
                let store = RefStore::new(path);
                let mut refs = vec![];
                if let Some(oid) = store.resolve("HEAD")? {
                    refs.push(Ref::new("HEAD", oid));
                }
                for (name, oid) in store.list("refs")? {
                    refs.push(Ref::new(name, oid));
                }
                Ok(refs)
            }
            FileSource::Bundle(path) => {
                let header = BundleHeader::read_from(path)?;
                Ok(header
                    .tips
                    .into_iter()
                    .map(|tip| Ref::new(tip.ref_name, tip.oid))
                    .collect())
            }
            FileSource::Raw => Err(TransportError::RefsNotSupported),
        }
    }

    fn fetch_refs(&mut self, git_dir: &Path, refs: &[Ref]) -> Result<(), TransportError> {
        tracing::debug!(url = %self.url, count = refs.len(), "fetching refs");
        match &self.source {
            FileSource::Repo(path) => {
                copy_ref_objects(path, git_dir, refs)?;
                Ok(())
            }
            FileSource::Bundle(path) => {
                let header = BundleHeader::read_from(path)?;
                let bytes = fs::read(path).context(path)?;
                let payload_start = bytes
                    .windows(2)
                    .position(|pair| pair == b"\n\n")
                    .map_or(bytes.len(), |pos| pos + 2);
                let stem = path
                    .file_stem()
                    .map_or_else(|| "bundle".to_owned(), |s| s.to_string_lossy().into_owned());
                let pack_dir = git_dir.join("objects").join("pack");
                fs::create_dir_all(&pack_dir).context(&pack_dir)?;
                let pack_path = pack_dir.join(format!("{stem}.pack"));
                fs::write(&pack_path, &bytes[payload_start..]).context(&pack_path)?;
                // A self-contained bundle delivers at least its tips; record
                // them so connectivity can be established without unpacking.
                let idx_path = pack_dir.join(format!("{stem}.idx"));
                let mut idx = String::new();
                for tip in &header.tips {
                    idx.push_str(&tip.oid.hex());
                    idx.push('\n');
                }
                fs::write(&idx_path, idx).context(&idx_path)?;
                Ok(())
            }
            FileSource::Raw => Err(TransportError::RefsNotSupported),
        }
    }

    fn download_primer(
        &mut self,
        resource: &AltResource,
        pack_dir: &Path,
    ) -> Result<PathBuf, TransportError> {
        let src_path = url_to_path(&resource.url);
        let file_name = src_path
            .file_name()
            .ok_or_else(|| TransportError::UnsupportedUrl(resource.url.clone()))?;
        fs::create_dir_all(pack_dir).context(pack_dir)?;
        let dest = pack_dir.join(file_name);
        if dest.is_file() {
            return Ok(dest);
        }
        let temp = pack_dir.join(format!("{}.temp", file_name.to_string_lossy()));

        let download = |url: &str| -> io::Result<()> {
            let mut src = fs::File::open(&src_path)?;
            let mut out = fs::File::options().append(true).create(true).open(&temp)?;
            let offset = out.metadata()?.len();
            if offset > 0 {
                tracing::debug!(offset, url, "continuing interrupted download");
                src.seek(io::SeekFrom::Start(offset))?;
            }
            let mut buf = vec![0; 16 << 10];
            loop {
                let n = src.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n])?;
            }
            out.sync_data()?;
            fs::rename(&temp, &dest)
        };
        download(&resource.url).map_err(|source| TransportError::Download {
            url: resource.url.clone(),
            source,
        })?;
        Ok(dest)
    }
}

/// Opens a transport for the given source.
///
/// A resolved local path or bundle gets the file transport; a `file://` URL
/// is resolved likewise. Anything else is a scheme this build does not speak.
pub fn open_transport(
    url: &str,
    resolved: Option<&crate::source::RepoSource>,
) -> Result<Box<dyn Transport>, TransportError> {
    if let Some(source) = resolved {
        let transport: Box<dyn Transport> = if source.is_bundle {
            Box::new(FileTransport::open_bundle(url, &source.path))
        } else {
            Box::new(FileTransport::open_repo(url, &source.path))
        };
        return Ok(transport);
    }
    if let Some(path) = url.strip_prefix("file://") {
        let path = Path::new(path);
        if path.is_dir() {
            return Ok(Box::new(FileTransport::open_repo(url, path)));
        }
        if path.is_file() {
            return Ok(Box::new(FileTransport::open_bundle(url, path)));
        }
    }
    Err(TransportError::UnsupportedUrl(url.to_owned()))
}

/// Opens a transport good only for downloading an alt-resource.
pub fn open_primer_transport(url: &str) -> Result<Box<dyn Transport>, TransportError> {
    if url.contains("://") && !url.starts_with("file://") {
        return Err(TransportError::UnsupportedUrl(url.to_owned()));
    }
    Ok(Box::new(FileTransport::open_raw(url)))
}

/// Whether any advertised ref has an unknown (all-zeros) value, in which case
/// objects must be fetched before HEAD can be resolved.
pub fn has_null_oid(refs: &[Ref]) -> bool {
    refs.iter().any(|r| r.old_oid.is_zero())
}
