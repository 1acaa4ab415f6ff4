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

//! Crash-safe cleanup of a partially-created destination.
//!
//! As soon as a destination exists on disk, the clone registers it here. Any
//! exit path - normal return, error propagation, or a terminating signal -
//! converges on the same cleanup, whose behavior is selected by the current
//! [`JunkMode`]. The guard handle drives mode transitions and owns the
//! state; a process-wide slot points the signal handler at the active guard.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Once;

use crate::resume::ResumeDescriptor;

/// What to do with the destination when the process stops now.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JunkMode {
    /// Remove the work tree and git-dir; nothing of value exists yet.
    Remove,
    /// A primer transfer is in flight: persist the resume descriptor and
    /// leave everything for `--resume`.
    LeaveResumable,
    /// Refs and HEAD are in place: keep the repository, advise retrying the
    /// checkout.
    LeaveRepo,
    /// The clone completed; nothing to do.
    LeaveAll,
}

#[derive(Debug)]
struct JunkState {
    active: bool,
    git_dir: Option<PathBuf>,
    work_tree: Option<PathBuf>,
    mode: JunkMode,
    resume: Option<ResumeDescriptor>,
}

impl JunkState {
    fn new(mode: JunkMode) -> Self {
        Self {
            active: true,
            git_dir: None,
            work_tree: None,
            mode,
            resume: None,
        }
    }
}

type SharedState = Arc<Mutex<JunkState>>;

/// The state the signal handler consults. Always the most recently created
/// guard's.
static ACTIVE: Mutex<Option<SharedState>> = Mutex::new(None);
static REGISTER_HANDLERS: Once = Once::new();

const LEAVE_REPO_MSG: &str = "\
Clone succeeded, but checkout failed.
You can inspect what was checked out with 'reclone status'
and retry the checkout with 'reclone checkout -f HEAD'";

const LEAVE_RESUMABLE_MSG: &str = "\
Clone interrupted while copying resumable resource.
Try using 'reclone --resume <new_directory>',
where <new_directory> is either the new working
directory or git directory.

If this does not succeed, it could be because the
resource has been moved, corrupted, or changed.
If this is the case, you should remove <new_directory>
and run the original command.";

fn remove_dir_best_effort(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => eprintln!("warning: failed to remove '{}': {err}", path.display()),
    }
}

fn run_cleanup(state: &JunkState) {
    if !state.active {
        return;
    }
    match state.mode {
        JunkMode::LeaveAll => {}
        JunkMode::LeaveRepo => {
            eprintln!("warning: {LEAVE_REPO_MSG}");
        }
        JunkMode::LeaveResumable => {
            if let (Some(git_dir), Some(resume)) = (&state.git_dir, &state.resume) {
                if let Err(err) = resume.save(git_dir) {
                    eprintln!("warning: failed to write resume descriptor: {err}");
                }
            }
            eprintln!("warning: {LEAVE_RESUMABLE_MSG}");
        }
        JunkMode::Remove => {
            if let Some(git_dir) = &state.git_dir {
                remove_dir_best_effort(git_dir);
            }
            if let Some(work_tree) = &state.work_tree {
                remove_dir_best_effort(work_tree);
            }
        }
    }
}

#[cfg(unix)]
mod platform {
    use super::ACTIVE;
    use super::run_cleanup;

    const SIGNALS: [libc::c_int; 5] = [
        libc::SIGINT,
        libc::SIGTERM,
        libc::SIGHUP,
        libc::SIGQUIT,
        libc::SIGPIPE,
    ];

    extern "C" fn handle_signal(signo: libc::c_int) {
        // The guard only mutates the state between suspension points. If a
        // lock happens to be held, skipping the cleanup beats deadlocking in
        // the handler.
        if let Ok(active) = ACTIVE.try_lock()
            && let Some(state) = active.as_ref()
            && let Ok(state) = state.try_lock()
        {
            run_cleanup(&state);
        }
        unsafe {
            libc::signal(signo, libc::SIG_DFL);
            libc::raise(signo);
        }
    }

    pub(super) fn register_signal_handlers() {
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction =
                handle_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            for sig in SIGNALS {
                libc::sigaction(sig, &action, std::ptr::null_mut());
            }
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) fn register_signal_handlers() {}
}

/// Handle owning the junk state for the duration of one clone.
///
/// Dropping the guard runs the cleanup for the current mode and deactivates
/// the state, so an early `?` return behaves exactly like `exit()` would.
#[derive(Debug)]
pub struct JunkGuard {
    state: SharedState,
}

impl JunkGuard {
    pub fn new(mode: JunkMode) -> Self {
        REGISTER_HANDLERS.call_once(platform::register_signal_handlers);
        let state = Arc::new(Mutex::new(JunkState::new(mode)));
        let mut active = ACTIVE.lock().unwrap_or_else(|err| err.into_inner());
        *active = Some(state.clone());
        Self { state }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut JunkState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        f(&mut state)
    }

    pub fn set_git_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.with_state(|state| state.git_dir = Some(path));
    }

    pub fn set_work_tree(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.with_state(|state| state.work_tree = Some(path));
    }

    pub fn set_mode(&self, mode: JunkMode) {
        tracing::debug!(?mode, "junk mode transition");
        self.with_state(|state| state.mode = mode);
    }

    /// Installs the descriptor the cleanup would persist in
    /// [`JunkMode::LeaveResumable`].
    pub fn set_resume(&self, resume: Option<ResumeDescriptor>) {
        self.with_state(|state| state.resume = resume);
    }
}

impl Drop for JunkGuard {
    fn drop(&mut self) {
        self.with_state(|state| {
            run_cleanup(state);
            state.active = false;
        });
        let mut active = ACTIVE.lock().unwrap_or_else(|err| err.into_inner());
        if active
            .as_ref()
            .is_some_and(|state| Arc::ptr_eq(state, &self.state))
        {
            *active = None;
        }
    }
}
