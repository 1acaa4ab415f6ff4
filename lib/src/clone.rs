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

//! The clone controller.
//!
//! One state machine drives the whole operation: source resolution,
//! destination provisioning, the optional primer, transport negotiation, ref
//! mapping and writing, HEAD setup, and checkout. The junk guard shadows
//! every step so that any exit leaves the destination in a defined state.

use std::fs;
use std::num::NonZeroU32;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::alternates::AlternatesError;
use crate::alternates::add_reference;
use crate::alternates::dissociate_from_alternates;
use crate::alternates::object_exists;
use crate::checkout::CheckoutError;
use crate::checkout::CheckoutOptions;
use crate::checkout::run_checkout;
use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::file_util::is_empty_dir;
use crate::file_util::normalize_path;
use crate::junk::JunkGuard;
use crate::junk::JunkMode;
use crate::local_clone::LocalCloneError;
use crate::local_clone::LocalCloneOptions;
use crate::local_clone::clone_local;
use crate::primer::PrimerError;
use crate::primer::clean_alt_resource;
use crate::primer::fetch_alt_resource;
use crate::primer::use_alt_resource;
use crate::provision::DEFAULT_BRANCH;
use crate::provision::ProvisionError;
use crate::provision::create_leading_dirs;
use crate::provision::init_repo_layout;
use crate::provision::write_config_params;
use crate::provision::write_gitfile;
use crate::ref_map::RefMapOptions;
use crate::ref_map::RefSpec;
use crate::ref_map::WriteTagsError;
use crate::ref_map::find_remote_branch;
use crate::ref_map::guess_remote_head;
use crate::ref_map::mapped_oids;
use crate::ref_map::wanted_peer_refs;
use crate::ref_map::write_followtags;
use crate::ref_map::write_remote_refs;
use crate::ref_name::DEFAULT_REMOTE;
use crate::ref_name::RemoteNameBuf;
use crate::refs::Ref;
use crate::refs::RefStore;
use crate::refs::RefStoreError;
use crate::repo_config::ConfigError;
use crate::repo_config::RepoConfig;
use crate::report::Reporter;
use crate::resume::ResumeDescriptor;
use crate::resume::ResumeError;
use crate::resume::load_existing_state;
use crate::source::RepoSource;
use crate::source::SourceError;
use crate::source::guess_destination;
use crate::source::resolve_source;
use crate::source::strip_trailing_slashes;
use crate::tools::ToolContext;
use crate::transport::AltResource;
use crate::transport::IpFamily;
use crate::transport::ProgressMode;
use crate::transport::TransportError;
use crate::transport::has_null_oid;
use crate::transport::open_transport;

/// Environment variable naming a pre-decided work tree location.
pub const WORK_TREE_ENV: &str = "RECLONE_WORK_TREE";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LocalMode {
    /// Hardlink/copy when the source is on the same filesystem, falling back
    /// to a copy when linking fails.
    #[default]
    Auto,
    /// `--local`: same, but a failed hardlink is an error.
    Force,
    /// `--no-local`: always go through the transport.
    Forbid,
}

/// Everything the user can ask of a clone.
#[derive(Clone, Debug)]
pub struct CloneOptions {
    pub bare: bool,
    pub mirror: bool,
    pub local: LocalMode,
    pub no_hardlinks: bool,
    pub shared: bool,
    pub recursive: bool,
    pub template_dir: Option<PathBuf>,
    /// `None` means the default remote name.
    pub origin: Option<RemoteNameBuf>,
    pub branch: Option<String>,
    pub depth: Option<NonZeroU32>,
    /// `None` means "on iff `--depth` was given".
    pub single_branch: Option<bool>,
    pub reference: Vec<String>,
    pub dissociate: bool,
    pub separate_git_dir: Option<PathBuf>,
    pub upload_pack_path: String,
    pub prime_clone_path: String,
    pub config_params: Vec<String>,
    pub ip_family: IpFamily,
    pub verbosity: i32,
    pub progress: ProgressMode,
    pub no_checkout: bool,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            bare: false,
            mirror: false,
            local: LocalMode::Auto,
            no_hardlinks: false,
            shared: false,
            recursive: false,
            template_dir: None,
            origin: None,
            branch: None,
            depth: None,
            single_branch: None,
            reference: vec![],
            dissociate: false,
            separate_git_dir: None,
            upload_pack_path: "upload-pack".to_owned(),
            prime_clone_path: "prime-clone".to_owned(),
            config_params: vec![],
            ip_family: IpFamily::Any,
            verbosity: 0,
            progress: ProgressMode::Auto,
            no_checkout: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("{0}")]
    InvalidOptions(String),
    #[error("repository '{0}' does not exist")]
    RepositoryNotFound(String),
    #[error("directory '{0}' does not exist")]
    DirectoryNotFound(String),
    #[error("destination path '{0}' already exists and is not an empty directory")]
    DestinationNotEmpty(String),
    #[error("working tree '{0}' already exists")]
    WorkTreeExists(String),
    #[error("Remote branch {branch} not found in upstream {origin}")]
    RemoteBranchNotFound {
        branch: String,
        origin: RemoteNameBuf,
    },
    #[error("remote did not send all necessary objects")]
    MissingObjects,
    #[error("resumable resource is no longer available or usable")]
    PrimerUnusable(#[source] PrimerError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Alternates(#[from] AlternatesError),
    #[error(transparent)]
    LocalClone(#[from] LocalCloneError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Refs(#[from] RefStoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resume(#[from] ResumeError),
    #[error(transparent)]
    Tags(#[from] WriteTagsError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Collaborators the caller provides: where output goes, and which
/// executables stand in for the child tools.
pub struct CloneContext<'a> {
    pub reporter: &'a mut dyn Reporter,
    pub tool_overrides: Vec<(String, PathBuf)>,
}

fn absolute_str(path: &str) -> Result<String, PathError> {
    let abs = std::path::absolute(Path::new(path)).context(path)?;
    Ok(normalize_path(&abs).display().to_string())
}

/// Clones `repo_arg` into `dir_arg` (or a guessed directory).
pub fn clone(
    repo_arg: &str,
    dir_arg: Option<&str>,
    options: &CloneOptions,
    ctx: &mut CloneContext,
) -> Result<(), CloneError> {
    let mut options = options.clone();
    if options.mirror {
        options.bare = true;
    }
    if options.bare {
        if let Some(origin) = &options.origin {
            return Err(CloneError::InvalidOptions(format!(
                "--bare and --origin {origin} options are incompatible"
            )));
        }
        if options.separate_git_dir.is_some() {
            return Err(CloneError::InvalidOptions(
                "--bare and --separate-git-dir are incompatible".to_owned(),
            ));
        }
        options.no_checkout = true;
    }
    let single_branch = options.single_branch.unwrap_or(options.depth.is_some());
    let origin = options
        .origin
        .clone()
        .unwrap_or_else(|| DEFAULT_REMOTE.to_owned());

    let resolved = resolve_source(repo_arg)?;
    let url = if resolved.is_some() {
        absolute_str(repo_arg)?
    } else if !repo_arg.contains(':') {
        return Err(CloneError::RepositoryNotFound(repo_arg.to_owned()));
    } else {
        repo_arg.to_owned()
    };

    let dir = match dir_arg {
        Some(dir) => dir.to_owned(),
        None => {
            let is_bundle = resolved.as_ref().is_some_and(|s| s.is_bundle);
            guess_destination(repo_arg, is_bundle, options.bare)?
        }
    };
    let dir = strip_trailing_slashes(&dir).to_owned();
    let dest = PathBuf::from(&dir);
    let dest_exists = dest.exists();
    if dest_exists && !is_empty_dir(&dest)? {
        return Err(CloneError::DestinationNotEmpty(dir));
    }
    let reflog_msg = format!("clone: from {url}");

    let env_work_tree = if options.bare {
        None
    } else {
        std::env::var(WORK_TREE_ENV).ok().filter(|wt| !wt.is_empty())
    };
    if let Some(wt) = &env_work_tree
        && Path::new(wt).exists()
    {
        return Err(CloneError::WorkTreeExists(wt.clone()));
    }
    let (mut git_dir, work_tree) = if options.bare {
        (dest.clone(), None)
    } else if let Some(wt) = env_work_tree {
        (dest.clone(), Some(PathBuf::from(wt)))
    } else {
        (dest.join(".git"), Some(dest.clone()))
    };
    let separate_git_dir = options.separate_git_dir.clone();
    if let Some(real) = &separate_git_dir {
        git_dir = real.clone();
    }

    let guard = JunkGuard::new(JunkMode::Remove);
    if let Some(wt) = &work_tree {
        create_leading_dirs(wt)?;
        if !dest_exists {
            fs::create_dir(wt).context(wt)?;
        }
        guard.set_work_tree(wt);
    }
    guard.set_git_dir(&git_dir);
    create_leading_dirs(&git_dir)?;

    if options.bare {
        ctx.reporter
            .status(&format!("Cloning into bare repository '{dir}'..."));
    } else {
        ctx.reporter.status(&format!("Cloning into '{dir}'..."));
    }

    init_repo_layout(&git_dir, options.template_dir.as_deref())?;
    write_config_params(&git_dir, &options.config_params)?;

    let (src_ref_prefix, branch_top) = if options.bare {
        let prefix = if options.mirror { "refs/" } else { "refs/heads/" };
        (prefix.to_owned(), prefix.to_owned())
    } else {
        ("refs/heads/".to_owned(), format!("refs/remotes/{origin}/"))
    };
    let refspec = RefSpec::standard(&src_ref_prefix, &branch_top);

    let mut config = RepoConfig::load(&git_dir)?;
    if options.bare {
        config.set_bool(&["core", "bare"], true)?;
    }
    if let (Some(_), Some(wt)) = (&separate_git_dir, &work_tree) {
        let wt_abs = absolute_str(&wt.display().to_string())?;
        config.set_str(&["core", "worktree"], &wt_abs)?;
        write_gitfile(wt, Path::new(&absolute_str(&git_dir.display().to_string())?))?;
    }
    config.set_str(&["remote", origin.as_str(), "url"], &url)?;
    config.save()?;

    for donor in &options.reference {
        add_reference(&git_dir, donor)?;
    }

    let task = CloneTask {
        options,
        origin,
        single_branch,
        url,
        resolved,
        git_dir,
        work_tree,
        branch_top,
        refspec,
        reflog_msg,
        alt_res: None,
        resuming: false,
        guard,
    };
    task.run(ctx)
}

/// Continues an interrupted clone from its destination directory. Everything
/// beyond verbosity/progress is reconstructed from the destination itself.
pub fn resume(
    dir_arg: &str,
    options: &CloneOptions,
    ctx: &mut CloneContext,
) -> Result<(), CloneError> {
    let dir = strip_trailing_slashes(dir_arg);
    let dest = normalize_path(&std::path::absolute(Path::new(dir)).context(dir)?);
    if !dest.exists() {
        return Err(CloneError::DirectoryNotFound(dir_arg.to_owned()));
    }
    let state = load_existing_state(&dest)?;

    let mut options = options.clone();
    options.bare = state.remote.bare;
    options.mirror = state.remote.mirror;
    if state.work_tree.is_none() {
        options.no_checkout = true;
    }
    let origin = state
        .remote
        .name
        .clone()
        .map_or_else(|| DEFAULT_REMOTE.to_owned(), RemoteNameBuf::from);

    let refspec = state
        .remote
        .fetch_pattern
        .as_deref()
        .and_then(RefSpec::parse)
        .unwrap_or_else(|| RefSpec::standard("refs/heads/", "refs/heads/"));
    let branch_top = refspec
        .dst
        .strip_suffix('*')
        .unwrap_or(&refspec.dst)
        .to_owned();

    let config = RepoConfig::load(&state.git_dir)?;
    let url = config
        .get_str(&["remote", origin.as_str(), "url"])
        .ok_or_else(|| {
            CloneError::InvalidOptions(format!("remote '{origin}' has no url configured"))
        })?
        .to_owned();

    let descriptor = ResumeDescriptor::load(&state.git_dir)?.ok_or(ResumeError::NotResumable)?;

    let guard = JunkGuard::new(JunkMode::LeaveResumable);
    guard.set_git_dir(&state.git_dir);
    if let Some(wt) = &state.work_tree {
        guard.set_work_tree(wt);
    }
    guard.set_resume(Some(descriptor.clone()));

    let task = CloneTask {
        options,
        origin,
        single_branch: false,
        reflog_msg: format!("clone: from {url}"),
        resolved: resolve_source(&url)?,
        url,
        git_dir: state.git_dir,
        work_tree: state.work_tree,
        branch_top,
        refspec,
        alt_res: Some(descriptor.into()),
        resuming: true,
        guard,
    };
    task.run(ctx)
}

struct CloneTask {
    options: CloneOptions,
    origin: RemoteNameBuf,
    single_branch: bool,
    url: String,
    resolved: Option<RepoSource>,
    git_dir: PathBuf,
    work_tree: Option<PathBuf>,
    branch_top: String,
    refspec: RefSpec,
    reflog_msg: String,
    alt_res: Option<AltResource>,
    resuming: bool,
    guard: JunkGuard,
}

impl CloneTask {
    fn run(mut self, ctx: &mut CloneContext) -> Result<(), CloneError> {
        let store = RefStore::new(&self.git_dir);
        let mut tools = ToolContext::new(&self.git_dir);
        for (tool, program) in &ctx.tool_overrides {
            tools.override_tool(tool, program);
        }

        let mut transport = open_transport(&self.url, self.resolved.as_ref())?;
        {
            let topts = transport.options_mut();
            topts.verbosity = self.options.verbosity;
            topts.progress = self.options.progress;
            topts.family = self.options.ip_family;
            topts.keep = true;
            topts.depth = self.options.depth;
            topts.follow_tags = self.single_branch;
            topts.upload_pack = Some(self.options.upload_pack_path.clone());
            topts.prime_clone = Some(self.options.prime_clone_path.clone());
        }

        let mut local_source = match (&self.resolved, self.options.local) {
            (Some(source), mode) if mode != LocalMode::Forbid && !source.is_bundle => {
                Some(source.path.clone())
            }
            _ => None,
        };
        if let Some(src) = &local_source {
            if self.options.depth.is_some() {
                ctx.reporter
                    .warning("--depth is ignored in local clones; use file:// instead.");
            }
            if src.join("shallow").is_file() {
                if self.options.local == LocalMode::Force {
                    ctx.reporter
                        .warning("source repository is shallow, ignoring --local");
                }
                local_source = None;
            }
        }
        if self.options.local == LocalMode::Force && local_source.is_none() {
            ctx.reporter.warning("--local is ignored");
        }
        let is_local = local_source.is_some();

        if !is_local && self.options.reference.is_empty() && self.alt_res.is_none() {
            self.alt_res = transport.prime_clone()?;
        }

        let remote_refs = transport.get_refs_list()?;

        let mut no_checkout = self.options.no_checkout;
        let mut mapped_refs: Vec<Ref> = vec![];
        let mut remote_head: Option<Ref> = None;
        let mut remote_head_points_at: Option<Ref> = None;
        let mut our_head_points_at: Option<Ref> = None;
        let mut complete_refs_before_fetch = true;

        if !remote_refs.is_empty() {
            let map_options = RefMapOptions {
                single_branch: self.single_branch,
                branch: self.options.branch.clone(),
                mirror: self.options.mirror,
            };
            mapped_refs = wanted_peer_refs(&remote_refs, &self.refspec, &map_options, ctx.reporter);

            // A transport may advertise refs whose values it does not know
            // yet; those need the objects early so HEAD can be resolved.
            if has_null_oid(&remote_refs) {
                complete_refs_before_fetch = false;
                if !is_local {
                    transport.fetch_refs(&self.git_dir, &mapped_refs)?;
                }
            }

            remote_head = remote_refs.iter().find(|r| r.name == "HEAD").cloned();
            remote_head_points_at = guess_remote_head(remote_head.as_ref(), &mapped_refs).cloned();
            our_head_points_at = match &self.options.branch {
                Some(branch) => Some(
                    find_remote_branch(&mapped_refs, branch)
                        .cloned()
                        .ok_or_else(|| CloneError::RemoteBranchNotFound {
                            branch: branch.clone(),
                            origin: self.origin.clone(),
                        })?,
                ),
                None => remote_head_points_at.clone(),
            };
        } else {
            if let Some(branch) = &self.options.branch {
                return Err(CloneError::RemoteBranchNotFound {
                    branch: branch.clone(),
                    origin: self.origin.clone(),
                });
            }
            ctx.reporter
                .warning("You appear to have cloned an empty repository.");
            no_checkout = true;
            if !self.options.bare {
                let mut config = RepoConfig::load(&self.git_dir)?;
                config.set_str(&["branch", DEFAULT_BRANCH, "remote"], self.origin.as_str())?;
                config.set_str(
                    &["branch", DEFAULT_BRANCH, "merge"],
                    &format!("refs/heads/{DEFAULT_BRANCH}"),
                )?;
                config.save()?;
            }
        }

        if !self.resuming {
            self.write_refspec_config(&our_head_points_at, &remote_head_points_at)?;
        }

        let mut primer_path: Option<PathBuf> = None;
        if let Some(alt_res) = self.alt_res.clone() {
            self.guard
                .set_resume(Some(ResumeDescriptor::from(alt_res.clone())));
            self.guard.set_mode(JunkMode::LeaveResumable);
            let primed: Result<PathBuf, (PrimerError, Option<PathBuf>)> =
                match fetch_alt_resource(&alt_res, &self.git_dir, ctx.reporter) {
                    Err(err) => Err((err, None)),
                    Ok(path) => {
                        match use_alt_resource(&tools, &store, &self.origin, &alt_res, &path) {
                            Ok(()) => Ok(path),
                            Err(err) => Err((err, Some(path))),
                        }
                    }
                };
            match primed {
                Ok(path) => primer_path = Some(path),
                Err((err, path)) => {
                    if self.resuming {
                        return Err(CloneError::PrimerUnusable(err));
                    }
                    ctx.reporter.warning(&format!(
                        "could not use clone primer, falling back to full clone: {err}"
                    ));
                    clean_alt_resource(&store, &self.origin, &alt_res, path.as_deref(), false);
                    self.alt_res = None;
                    self.guard.set_resume(None);
                    self.guard.set_mode(JunkMode::Remove);
                }
            }
        }

        if let Some(src) = &local_source {
            clone_local(
                src,
                &self.git_dir,
                &LocalCloneOptions {
                    shared: self.options.shared,
                    no_hardlinks: self.options.no_hardlinks,
                    require_hardlinks: self.options.local == LocalMode::Force,
                },
            )?;
            ctx.reporter.status("done.");
        } else if !remote_refs.is_empty() && complete_refs_before_fetch {
            transport.fetch_refs(&self.git_dir, &mapped_refs)?;
        }

        if !is_local && !remote_refs.is_empty() {
            ctx.reporter.status("Checking connectivity...");
            for oid in mapped_oids(&mapped_refs) {
                if !object_exists(&self.git_dir, oid)? {
                    return Err(CloneError::MissingObjects);
                }
            }
            ctx.reporter.status("done.");
        }

        if !remote_refs.is_empty() {
            write_remote_refs(&store, &mapped_refs, &self.reflog_msg)?;
            if self.single_branch {
                write_followtags(&store, &self.git_dir, &remote_refs, &self.reflog_msg)?;
            }
        }
        if let Some(rhpa) = &remote_head_points_at
            && !self.options.bare
            && let Some(peer) = &rhpa.peer_ref
        {
            store.create_symref(
                &format!("{}HEAD", self.branch_top),
                peer,
                &self.reflog_msg,
            )?;
        }

        self.update_head(&store, &our_head_points_at, &remote_head)?;

        transport.disconnect()?;
        if self.options.dissociate {
            dissociate_from_alternates(&self.git_dir, &tools)?;
        }

        if let (Some(path), Some(alt_res)) = (&primer_path, &self.alt_res) {
            clean_alt_resource(&store, &self.origin, alt_res, Some(path), true);
        }
        self.guard.set_resume(None);
        self.guard.set_mode(JunkMode::LeaveRepo);

        let checkout_options = CheckoutOptions {
            no_checkout,
            recursive: self.options.recursive,
        };
        let checkout_result = run_checkout(
            &store,
            self.work_tree.as_deref(),
            &tools,
            &checkout_options,
            ctx.reporter,
        );
        match checkout_result {
            Ok(()) => {}
            // submodule trouble is reported, but the finished clone stands
            Err(CheckoutError::Submodule(_)) => {
                ResumeDescriptor::remove(&self.git_dir)?;
                self.guard.set_mode(JunkMode::LeaveAll);
                return checkout_result.map_err(Into::into);
            }
            Err(err) => return Err(err.into()),
        }

        ResumeDescriptor::remove(&self.git_dir)?;
        self.guard.set_mode(JunkMode::LeaveAll);
        Ok(())
    }

    /// Persists `remote.<origin>.fetch` (and `.mirror`). Single-branch mode
    /// pins the refspec to the selected ref so future fetches stay narrow.
    fn write_refspec_config(
        &self,
        our_head_points_at: &Option<Ref>,
        remote_head_points_at: &Option<Ref>,
    ) -> Result<(), CloneError> {
        if self.options.bare && !self.options.mirror {
            return Ok(());
        }
        let value = if self.single_branch && !self.options.mirror {
            match (&self.options.branch, our_head_points_at, remote_head_points_at) {
                (Some(branch), Some(our), _) => {
                    if our.name.starts_with("refs/tags/") {
                        Some(format!("+{0}:{0}", our.name))
                    } else {
                        Some(format!("+{}:{}{branch}", our.name, self.branch_top))
                    }
                }
                (None, _, Some(remote_head)) => remote_head
                    .name
                    .strip_prefix("refs/heads/")
                    .map(|head| format!("+{}:{}{head}", remote_head.name, self.branch_top)),
                // otherwise the next fetch will simply fetch from HEAD
                // without updating any remote-tracking ref, which is fine
                _ => None,
            }
        } else {
            Some(self.refspec.to_config_format())
        };
        if let Some(value) = value {
            let mut config = RepoConfig::load(&self.git_dir)?;
            config.set_str(&["remote", self.origin.as_str(), "fetch"], &value)?;
            if self.options.mirror {
                config.set_bool(&["remote", self.origin.as_str(), "mirror"], true)?;
            }
            config.save()?;
        }
        Ok(())
    }

    /// Points HEAD at the selected branch, or detaches it when only an
    /// object is known.
    fn update_head(
        &self,
        store: &RefStore,
        our_head_points_at: &Option<Ref>,
        remote_head: &Option<Ref>,
    ) -> Result<(), CloneError> {
        if let Some(our) = our_head_points_at
            && let Some(branch) = our.name.strip_prefix("refs/heads/")
        {
            store.create_symref("HEAD", &our.name, &self.reflog_msg)?;
            if !self.options.bare {
                store.update(&our.name, &our.old_oid, &self.reflog_msg)?;
                let mut config = RepoConfig::load(&self.git_dir)?;
                config.set_str(&["branch", branch, "remote"], self.origin.as_str())?;
                config.set_str(&["branch", branch, "merge"], &our.name)?;
                config.save()?;
            }
        } else if let Some(our) = our_head_points_at {
            // --branch named a tag: detach HEAD at its object
            store.update("HEAD", &our.old_oid, &self.reflog_msg)?;
        } else if let Some(remote) = remote_head {
            // remote HEAD points at something we could not name locally
            store.update("HEAD", &remote.old_oid, &self.reflog_msg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::report::CollectingReporter;

    fn ctx(reporter: &mut CollectingReporter) -> CloneContext<'_> {
        CloneContext {
            reporter,
            tool_overrides: vec![],
        }
    }

    #[test]
    fn test_bare_with_origin_rejected() {
        let mut reporter = CollectingReporter::default();
        let options = CloneOptions {
            bare: true,
            origin: Some("upstream".into()),
            ..Default::default()
        };
        let err = clone("src", None, &options, &mut ctx(&mut reporter)).unwrap_err();
        assert_matches!(err, CloneError::InvalidOptions(_));
    }

    #[test]
    fn test_bare_with_separate_git_dir_rejected() {
        let mut reporter = CollectingReporter::default();
        let options = CloneOptions {
            bare: true,
            separate_git_dir: Some("elsewhere".into()),
            ..Default::default()
        };
        let err = clone("src", None, &options, &mut ctx(&mut reporter)).unwrap_err();
        assert_matches!(err, CloneError::InvalidOptions(_));
    }

    #[test]
    fn test_mirror_implies_bare_restrictions() {
        let mut reporter = CollectingReporter::default();
        let options = CloneOptions {
            mirror: true,
            origin: Some("upstream".into()),
            ..Default::default()
        };
        let err = clone("src", None, &options, &mut ctx(&mut reporter)).unwrap_err();
        assert_matches!(err, CloneError::InvalidOptions(_));
    }

    #[test]
    fn test_nonexistent_local_path_rejected() {
        let mut reporter = CollectingReporter::default();
        let options = CloneOptions::default();
        let err = clone(
            "/no/such/repository/anywhere",
            None,
            &options,
            &mut ctx(&mut reporter),
        )
        .unwrap_err();
        assert_matches!(err, CloneError::RepositoryNotFound(_));
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let mut reporter = CollectingReporter::default();
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("dst");
        let options = CloneOptions::default();
        let err = clone(
            "https://host/repo",
            Some(dest.to_str().unwrap()),
            &options,
            &mut ctx(&mut reporter),
        )
        .unwrap_err();
        assert_matches!(err, CloneError::Transport(TransportError::UnsupportedUrl(_)));
        // the half-created destination was junked
        assert!(!dest.exists());
    }
}
