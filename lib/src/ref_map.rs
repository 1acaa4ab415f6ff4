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

//! Mapping the remote's ref advertisement to local peer refs.

use std::path::Path;

use itertools::Itertools as _;

use crate::alternates::object_exists;
use crate::file_util::PathError;
use crate::object_id::ObjectId;
use crate::refs::Ref;
use crate::refs::RefStore;
use crate::refs::RefStoreError;
use crate::report::Reporter;

/// A `[+]<src>:<dst>` mapping pattern. Source and destination may carry one
/// `*` each, matching any suffix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefSpec {
    pub forced: bool,
    pub src: String,
    pub dst: String,
}

impl RefSpec {
    pub fn forced(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            forced: true,
            src: src.into(),
            dst: dst.into(),
        }
    }

    /// The standard clone refspec `+<src_ref_prefix>*:<branch_top>*`.
    pub fn standard(src_ref_prefix: &str, branch_top: &str) -> Self {
        Self::forced(format!("{src_ref_prefix}*"), format!("{branch_top}*"))
    }

    /// Parses the configured `[+]<src>:<dst>` form.
    pub fn parse(text: &str) -> Option<Self> {
        let (forced, rest) = match text.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (src, dst) = rest.split_once(':')?;
        if src.is_empty() || dst.is_empty() {
            return None;
        }
        Some(Self {
            forced,
            src: src.to_owned(),
            dst: dst.to_owned(),
        })
    }

    /// The `[+]<src>:<dst>` form persisted in config.
    pub fn to_config_format(&self) -> String {
        let force = if self.forced { "+" } else { "" };
        format!("{force}{}:{}", self.src, self.dst)
    }

    /// Maps a remote ref name through this spec, or `None` if it does not
    /// match the source pattern.
    pub fn map_name(&self, name: &str) -> Option<String> {
        match self.src.split_once('*') {
            Some((prefix, suffix)) => {
                let tail = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
                Some(self.dst.replacen('*', tail, 1))
            }
            None => (name == self.src).then(|| self.dst.clone()),
        }
    }
}

/// The refspec following all tags into the local tag namespace.
pub fn tag_refspec() -> RefSpec {
    RefSpec {
        forced: false,
        src: "refs/tags/*".to_owned(),
        dst: "refs/tags/*".to_owned(),
    }
}

#[derive(Clone, Debug, Default)]
pub struct RefMapOptions {
    pub single_branch: bool,
    pub branch: Option<String>,
    pub mirror: bool,
}

/// Finds `refs/heads/<branch>`, falling back to `refs/tags/<branch>`.
pub fn find_remote_branch<'a>(refs: &'a [Ref], branch: &str) -> Option<&'a Ref> {
    let head_name = format!("refs/heads/{branch}");
    let tag_name = format!("refs/tags/{branch}");
    refs.iter()
        .find(|r| r.name == head_name)
        .or_else(|| refs.iter().find(|r| r.name == tag_name))
}

/// Guesses which branch the remote's HEAD points at by matching its object
/// id, preferring the conventional default branch name on a tie.
pub fn guess_remote_head<'a>(head: Option<&Ref>, refs: &'a [Ref]) -> Option<&'a Ref> {
    let head = head?;
    let candidates = || {
        refs.iter()
            .filter(|r| r.name.starts_with("refs/heads/") && r.old_oid == head.old_oid)
    };
    candidates()
        .find(|r| r.name == "refs/heads/master")
        .or_else(|| candidates().next())
}

/// Appends a peer-mapped copy of every ref matching the spec. Peeled `^{}`
/// entries never become refs of their own.
fn get_fetch_map(refs: &[Ref], spec: &RefSpec, out: &mut Vec<Ref>) {
    for r in refs {
        if r.name.ends_with("^{}") {
            continue;
        }
        if let Some(peer) = spec.map_name(&r.name) {
            out.push(Ref {
                name: r.name.clone(),
                old_oid: r.old_oid.clone(),
                peer_ref: Some(peer),
            });
        }
    }
}

/// Computes which refs to write locally for the given advertisement.
///
/// The result always carries a peer-less copy of the remote `HEAD` pseudo-ref
/// (if advertised) so that later HEAD-guessing can use it.
pub fn wanted_peer_refs(
    remote_refs: &[Ref],
    refspec: &RefSpec,
    options: &RefMapOptions,
    reporter: &mut dyn Reporter,
) -> Vec<Ref> {
    let head = remote_refs.iter().find(|r| r.name == "HEAD").cloned();
    let mut local_refs: Vec<Ref> = head.iter().cloned().collect();

    if options.single_branch {
        let remote_head = match &options.branch {
            Some(branch) => {
                local_refs.clear();
                find_remote_branch(remote_refs, branch).cloned()
            }
            None => guess_remote_head(head.as_ref(), remote_refs).cloned(),
        };
        match remote_head {
            None => {
                if let Some(branch) = &options.branch {
                    reporter
                        .warning(&format!("Could not find remote branch {branch} to clone."));
                }
            }
            Some(remote_head) => {
                let selected = std::slice::from_ref(&remote_head);
                get_fetch_map(selected, refspec, &mut local_refs);
                // if --branch names a tag, pull that tag explicitly
                get_fetch_map(selected, &tag_refspec(), &mut local_refs);
            }
        }
    } else {
        get_fetch_map(remote_refs, refspec, &mut local_refs);
    }

    if !options.mirror && !options.single_branch {
        get_fetch_map(remote_refs, &tag_refspec(), &mut local_refs);
    }

    local_refs
}

/// Object ids that a connectivity check must account for: everything that is
/// actually going to be written, skipping refs without a peer.
pub fn mapped_oids(mapped: &[Ref]) -> impl Iterator<Item = &ObjectId> {
    mapped
        .iter()
        .filter(|r| r.peer_ref.is_some())
        .map(|r| &r.old_oid)
}

/// Writes all mapped refs that do not exist yet, in one transaction.
pub fn write_remote_refs(
    store: &RefStore,
    mapped: &[Ref],
    msg: &str,
) -> Result<(), RefStoreError> {
    let mut tx = store.transaction();
    let peers = mapped
        .iter()
        .filter_map(|r| Some((r.peer_ref.as_deref()?, &r.old_oid)))
        .unique_by(|&(peer, _)| peer);
    for (peer, oid) in peers {
        if store.ref_exists(peer) {
            continue;
        }
        tx.create(peer, oid.clone());
    }
    tx.commit(msg)
}

/// Upserts every advertised tag whose object is already present locally.
/// Only meaningful under `--single-branch`, where the fetch map left the
/// other tags out.
pub fn write_followtags(
    store: &RefStore,
    git_dir: &Path,
    remote_refs: &[Ref],
    msg: &str,
) -> Result<(), WriteTagsError> {
    for r in remote_refs {
        if !r.name.starts_with("refs/tags/") || r.name.ends_with("^{}") {
            continue;
        }
        if !object_exists(git_dir, &r.old_oid)? {
            continue;
        }
        store.update(&r.name, &r.old_oid, msg)?;
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum WriteTagsError {
    #[error(transparent)]
    Refs(#[from] RefStoreError),
    #[error(transparent)]
    Path(#[from] PathError),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::report::CollectingReporter;

    fn advertisement() -> Vec<Ref> {
        vec![
            Ref::new("HEAD", ObjectId::from_hex("aaaa")),
            Ref::new("refs/heads/dev", ObjectId::from_hex("bbbb")),
            Ref::new("refs/heads/main", ObjectId::from_hex("aaaa")),
            Ref::new("refs/tags/v1", ObjectId::from_hex("cccc")),
            Ref::new("refs/tags/v1^{}", ObjectId::from_hex("dddd")),
        ]
    }

    fn standard_spec() -> RefSpec {
        RefSpec::standard("refs/heads/", "refs/remotes/origin/")
    }

    #[test_case("+refs/heads/*:refs/remotes/origin/*", true, "refs/heads/*"; "forced glob")]
    #[test_case("refs/tags/*:refs/tags/*", false, "refs/tags/*"; "plain glob")]
    fn test_refspec_parse_roundtrip(text: &str, forced: bool, src: &str) {
        let spec = RefSpec::parse(text).unwrap();
        assert_eq!(spec.forced, forced);
        assert_eq!(spec.src, src);
        assert_eq!(spec.to_config_format(), text);
    }

    #[test]
    fn test_refspec_parse_rejects_junk() {
        assert_eq!(RefSpec::parse("no-colon"), None);
        assert_eq!(RefSpec::parse(":empty-src"), None);
        assert_eq!(RefSpec::parse("empty-dst:"), None);
    }

    #[test]
    fn test_refspec_map_name() {
        let spec = standard_spec();
        assert_eq!(
            spec.map_name("refs/heads/main").as_deref(),
            Some("refs/remotes/origin/main")
        );
        assert_eq!(spec.map_name("refs/tags/v1"), None);
        assert_eq!(spec.map_name("HEAD"), None);

        let exact = RefSpec::forced("refs/heads/dev", "refs/remotes/origin/dev");
        assert_eq!(
            exact.map_name("refs/heads/dev").as_deref(),
            Some("refs/remotes/origin/dev")
        );
        assert_eq!(exact.map_name("refs/heads/main"), None);
    }

    #[test]
    fn test_wanted_peer_refs_default() {
        let mut reporter = CollectingReporter::default();
        let mapped = wanted_peer_refs(
            &advertisement(),
            &standard_spec(),
            &RefMapOptions::default(),
            &mut reporter,
        );
        let summary: Vec<_> = mapped
            .iter()
            .map(|r| (r.name.as_str(), r.peer_ref.as_deref()))
            .collect();
        assert_eq!(
            summary,
            [
                ("HEAD", None),
                ("refs/heads/dev", Some("refs/remotes/origin/dev")),
                ("refs/heads/main", Some("refs/remotes/origin/main")),
                ("refs/tags/v1", Some("refs/tags/v1")),
            ]
        );
    }

    #[test]
    fn test_wanted_peer_refs_deterministic() {
        let mut reporter = CollectingReporter::default();
        let first = wanted_peer_refs(
            &advertisement(),
            &standard_spec(),
            &RefMapOptions::default(),
            &mut reporter,
        );
        let second = wanted_peer_refs(
            &advertisement(),
            &standard_spec(),
            &RefMapOptions::default(),
            &mut reporter,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_wanted_peer_refs_single_branch() {
        let mut reporter = CollectingReporter::default();
        let options = RefMapOptions {
            single_branch: true,
            branch: Some("dev".to_owned()),
            mirror: false,
        };
        let mapped = wanted_peer_refs(
            &advertisement(),
            &standard_spec(),
            &options,
            &mut reporter,
        );
        let summary: Vec<_> = mapped
            .iter()
            .map(|r| (r.name.as_str(), r.peer_ref.as_deref()))
            .collect();
        // no HEAD seed, no tags, just the one branch
        assert_eq!(
            summary,
            [("refs/heads/dev", Some("refs/remotes/origin/dev"))]
        );
    }

    #[test]
    fn test_wanted_peer_refs_single_branch_tag() {
        let mut reporter = CollectingReporter::default();
        let options = RefMapOptions {
            single_branch: true,
            branch: Some("v1".to_owned()),
            mirror: false,
        };
        let mapped = wanted_peer_refs(
            &advertisement(),
            &standard_spec(),
            &options,
            &mut reporter,
        );
        let summary: Vec<_> = mapped
            .iter()
            .map(|r| (r.name.as_str(), r.peer_ref.as_deref()))
            .collect();
        // --branch=<tag> pulls that tag through the tag refspec
        assert_eq!(summary, [("refs/tags/v1", Some("refs/tags/v1"))]);
    }

    #[test]
    fn test_wanted_peer_refs_single_branch_guessed_head() {
        let mut reporter = CollectingReporter::default();
        let options = RefMapOptions {
            single_branch: true,
            branch: None,
            mirror: false,
        };
        let mapped = wanted_peer_refs(
            &advertisement(),
            &standard_spec(),
            &options,
            &mut reporter,
        );
        let summary: Vec<_> = mapped
            .iter()
            .map(|r| (r.name.as_str(), r.peer_ref.as_deref()))
            .collect();
        assert_eq!(
            summary,
            [
                ("HEAD", None),
                ("refs/heads/main", Some("refs/remotes/origin/main")),
            ]
        );
    }

    #[test]
    fn test_wanted_peer_refs_missing_branch_warns() {
        let mut reporter = CollectingReporter::default();
        let options = RefMapOptions {
            single_branch: true,
            branch: Some("gone".to_owned()),
            mirror: false,
        };
        let mapped = wanted_peer_refs(
            &advertisement(),
            &standard_spec(),
            &options,
            &mut reporter,
        );
        assert!(mapped.is_empty());
        assert_eq!(
            reporter.warnings,
            ["Could not find remote branch gone to clone."]
        );
    }

    #[test]
    fn test_wanted_peer_refs_mirror() {
        let mut reporter = CollectingReporter::default();
        let options = RefMapOptions {
            single_branch: false,
            branch: None,
            mirror: true,
        };
        let mapped = wanted_peer_refs(
            &advertisement(),
            &RefSpec::standard("refs/", "refs/"),
            &options,
            &mut reporter,
        );
        let peers: Vec<_> = mapped.iter().filter_map(|r| r.peer_ref.as_deref()).collect();
        // everything under refs/ verbatim, tags included exactly once
        assert_eq!(
            peers,
            ["refs/heads/dev", "refs/heads/main", "refs/tags/v1"]
        );
    }

    #[test]
    fn test_guess_remote_head_prefers_master() {
        let refs = vec![
            Ref::new("refs/heads/main", ObjectId::from_hex("aaaa")),
            Ref::new("refs/heads/master", ObjectId::from_hex("aaaa")),
        ];
        let head = Ref::new("HEAD", ObjectId::from_hex("aaaa"));
        let guessed = guess_remote_head(Some(&head), &refs).unwrap();
        assert_eq!(guessed.name, "refs/heads/master");

        // no matching branch at all
        let other = Ref::new("HEAD", ObjectId::from_hex("ffff"));
        assert_eq!(guess_remote_head(Some(&other), &refs), None);
        assert_eq!(guess_remote_head(None, &refs), None);
    }

    #[test]
    fn test_write_remote_refs_skips_existing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = RefStore::new(temp_dir.path());
        let existing = ObjectId::from_hex("9999");
        store
            .update("refs/remotes/origin/main", &existing, "test")
            .unwrap();

        let mapped = vec![
            Ref {
                name: "refs/heads/main".to_owned(),
                old_oid: ObjectId::from_hex("aaaa"),
                peer_ref: Some("refs/remotes/origin/main".to_owned()),
            },
            Ref {
                name: "refs/heads/dev".to_owned(),
                old_oid: ObjectId::from_hex("bbbb"),
                peer_ref: Some("refs/remotes/origin/dev".to_owned()),
            },
            Ref::new("HEAD", ObjectId::from_hex("aaaa")),
        ];
        write_remote_refs(&store, &mapped, "clone: from src").unwrap();

        // the existing peer was left alone, the new one created
        assert_eq!(
            store.resolve("refs/remotes/origin/main").unwrap(),
            Some(existing)
        );
        assert_eq!(
            store.resolve("refs/remotes/origin/dev").unwrap(),
            Some(ObjectId::from_hex("bbbb"))
        );
    }

    #[test]
    fn test_write_followtags_requires_local_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let git_dir = temp_dir.path().join("repo");
        std::fs::create_dir_all(git_dir.join("objects/cc")).unwrap();
        std::fs::create_dir_all(git_dir.join("refs")).unwrap();
        std::fs::write(git_dir.join("objects/cc/cc"), "present").unwrap();
        let store = RefStore::new(&git_dir);

        let remote_refs = vec![
            Ref::new("refs/tags/have", ObjectId::from_hex("cccc")),
            Ref::new("refs/tags/have^{}", ObjectId::from_hex("dddd")),
            Ref::new("refs/tags/missing", ObjectId::from_hex("eeee")),
        ];
        write_followtags(&store, &git_dir, &remote_refs, "clone: from src").unwrap();

        assert!(store.ref_exists("refs/tags/have"));
        assert!(!store.ref_exists("refs/tags/have^{}"));
        assert!(!store.ref_exists("refs/tags/missing"));
    }

    #[test]
    fn test_mapped_oids_skips_peerless() {
        let mapped = vec![
            Ref::new("HEAD", ObjectId::from_hex("aaaa")),
            Ref {
                name: "refs/heads/main".to_owned(),
                old_oid: ObjectId::from_hex("bbbb"),
                peer_ref: Some("refs/remotes/origin/main".to_owned()),
            },
        ];
        let oids: Vec<_> = mapped_oids(&mapped).collect();
        assert_eq!(oids, [&ObjectId::from_hex("bbbb")]);
    }
}
