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

//! Command-line surface.

use std::num::NonZeroU32;
use std::path::PathBuf;

use reclone_lib::clone::CloneOptions;
use reclone_lib::clone::LocalMode;
use reclone_lib::transport::IpFamily;
use reclone_lib::transport::ProgressMode;

/// Clone a repository into a new directory
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "reclone", version, max_term_width = 100)]
pub struct CloneArgs {
    /// The repository to clone from, or (with `--resume`) the destination of
    /// an interrupted clone
    #[arg(value_name = "repo", required = true)]
    pub repo: String,
    /// The name of a new directory to clone into
    ///
    /// Defaults to a directory named after the last path component of the
    /// source.
    #[arg(value_name = "dir")]
    pub dir: Option<String>,

    /// Continue a resumable clone
    ///
    /// Incompatible with every other clone option; everything else is
    /// recovered from the interrupted destination.
    #[arg(
        long,
        conflicts_with_all = [
            "dir", "no_checkout", "bare", "mirror", "local", "no_local",
            "no_hardlinks", "shared", "recursive", "template", "reference",
            "dissociate", "origin", "branch", "depth", "single_branch",
            "no_single_branch", "separate_git_dir", "config", "ipv4", "ipv6",
            "upload_pack", "prime_clone",
        ],
    )]
    pub resume: bool,

    /// Don't create a checkout
    #[arg(long, short = 'n')]
    pub no_checkout: bool,
    /// Create a bare repository
    #[arg(long)]
    pub bare: bool,
    /// Create a mirror repository (implies --bare)
    #[arg(long)]
    pub mirror: bool,
    /// Clone from a local repository
    #[arg(long, short = 'l', overrides_with = "no_local")]
    pub local: bool,
    /// Always use the transport, even for a local source
    #[arg(long, overrides_with = "local")]
    pub no_local: bool,
    /// Don't use local hardlinks, always copy
    #[arg(long)]
    pub no_hardlinks: bool,
    /// Set up as a shared repository borrowing the source's objects
    #[arg(long, short = 's')]
    pub shared: bool,
    /// Initialize submodules in the clone
    #[arg(long, visible_alias = "recurse-submodules")]
    pub recursive: bool,
    /// Directory from which templates will be used
    #[arg(long, value_name = "template-directory")]
    pub template: Option<PathBuf>,
    /// Reference repository whose objects may be borrowed
    #[arg(long, value_name = "repo")]
    pub reference: Vec<String>,
    /// Use --reference only while cloning
    #[arg(long)]
    pub dissociate: bool,
    /// Use <name> instead of 'origin' to track upstream
    #[arg(long, short = 'o', value_name = "name")]
    pub origin: Option<String>,
    /// Checkout <branch> instead of the remote's HEAD
    #[arg(long, short = 'b', value_name = "branch")]
    pub branch: Option<String>,
    /// Path to upload-pack on the remote
    #[arg(long, short = 'u', value_name = "path", default_value = "upload-pack")]
    pub upload_pack: String,
    /// Path to prime-clone on the remote
    #[arg(long, short = 'p', value_name = "path", default_value = "prime-clone")]
    pub prime_clone: String,
    /// Create a shallow clone of that depth
    #[arg(long, value_name = "depth")]
    pub depth: Option<NonZeroU32>,
    /// Clone only one branch, HEAD or --branch
    #[arg(long, overrides_with = "no_single_branch")]
    pub single_branch: bool,
    /// Fetch all branches even with --depth
    #[arg(long, overrides_with = "single_branch")]
    pub no_single_branch: bool,
    /// Separate the git dir from the working tree
    #[arg(long, value_name = "gitdir")]
    pub separate_git_dir: Option<PathBuf>,
    /// Set a config value inside the new repository
    #[arg(long, short = 'c', value_name = "key=value")]
    pub config: Vec<String>,
    /// Use IPv4 addresses only
    #[arg(long, short = '4', conflicts_with = "ipv6")]
    pub ipv4: bool,
    /// Use IPv6 addresses only
    #[arg(long, short = '6')]
    pub ipv6: bool,

    /// Be more verbose
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Be more quiet
    #[arg(long, short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
    /// Force progress reporting
    #[arg(long, overrides_with = "no_progress")]
    pub progress: bool,
    /// Suppress progress reporting
    #[arg(long, overrides_with = "progress")]
    pub no_progress: bool,
}

impl CloneArgs {
    pub fn verbosity(&self) -> i32 {
        i32::from(self.verbose) - i32::from(self.quiet)
    }

    pub fn to_clone_options(&self) -> CloneOptions {
        CloneOptions {
            bare: self.bare,
            mirror: self.mirror,
            local: if self.local {
                LocalMode::Force
            } else if self.no_local {
                LocalMode::Forbid
            } else {
                LocalMode::Auto
            },
            no_hardlinks: self.no_hardlinks,
            shared: self.shared,
            recursive: self.recursive,
            template_dir: self.template.clone(),
            origin: self.origin.as_deref().map(Into::into),
            branch: self.branch.clone(),
            depth: self.depth,
            single_branch: if self.single_branch {
                Some(true)
            } else if self.no_single_branch {
                Some(false)
            } else {
                None
            },
            reference: self.reference.clone(),
            dissociate: self.dissociate,
            separate_git_dir: self.separate_git_dir.clone(),
            upload_pack_path: self.upload_pack.clone(),
            prime_clone_path: self.prime_clone.clone(),
            config_params: self.config.clone(),
            ip_family: if self.ipv4 {
                IpFamily::V4
            } else if self.ipv6 {
                IpFamily::V6
            } else {
                IpFamily::Any
            },
            verbosity: self.verbosity(),
            progress: if self.progress {
                ProgressMode::Force
            } else if self.no_progress {
                ProgressMode::Suppress
            } else {
                ProgressMode::Auto
            },
            no_checkout: self.no_checkout,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let args = CloneArgs::parse_from(["reclone", "host:repo.git"]);
        assert_eq!(args.repo, "host:repo.git");
        assert_eq!(args.dir, None);
        let options = args.to_clone_options();
        assert_eq!(options.single_branch, None);
        assert_eq!(options.local, LocalMode::Auto);
        assert_eq!(options.verbosity, 0);
    }

    #[test]
    fn test_resume_conflicts_with_clone_options() {
        assert!(CloneArgs::try_parse_from(["reclone", "--resume", "dir"]).is_ok());
        assert!(CloneArgs::try_parse_from(["reclone", "--resume", "--bare", "dir"]).is_err());
        assert!(
            CloneArgs::try_parse_from(["reclone", "--resume", "-o", "upstream", "dir"]).is_err()
        );
        // verbosity stays allowed
        assert!(CloneArgs::try_parse_from(["reclone", "--resume", "-v", "dir"]).is_ok());
    }

    #[test]
    fn test_single_branch_toggles() {
        let args = CloneArgs::parse_from(["reclone", "--single-branch", "src"]);
        assert_eq!(args.to_clone_options().single_branch, Some(true));
        let args = CloneArgs::parse_from(["reclone", "--no-single-branch", "src"]);
        assert_eq!(args.to_clone_options().single_branch, Some(false));
        let args =
            CloneArgs::parse_from(["reclone", "--single-branch", "--no-single-branch", "src"]);
        assert_eq!(args.to_clone_options().single_branch, Some(false));
    }

    #[test]
    fn test_verbosity_counts() {
        let args = CloneArgs::parse_from(["reclone", "-q", "-q", "src"]);
        assert_eq!(args.verbosity(), -2);
        let args = CloneArgs::parse_from(["reclone", "-v", "src"]);
        assert_eq!(args.verbosity(), 1);
    }

    #[test]
    fn test_depth_requires_positive_number() {
        assert!(CloneArgs::try_parse_from(["reclone", "--depth", "0", "src"]).is_err());
        assert!(CloneArgs::try_parse_from(["reclone", "--depth", "-1", "src"]).is_err());
        let args = CloneArgs::parse_from(["reclone", "--depth", "3", "src"]);
        assert_eq!(args.depth.map(NonZeroU32::get), Some(3));
    }
}
