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

//! The `reclone` binary: argument parsing, logging setup, and error-to-exit
//! mapping around the library's clone controller.

use std::process::ExitCode;

use clap::Parser as _;
use reclone_lib::checkout::CheckoutError;
use reclone_lib::clone::CloneContext;
use reclone_lib::clone::CloneError;
use reclone_lib::report::StderrReporter;
use reclone_lib::tools::TOOL_ENV_OVERRIDES;
use tracing_subscriber::EnvFilter;

pub mod cli;

use crate::cli::CloneArgs;

/// Exit code for fatal errors, distinct from the small codes soft failures
/// produce.
const FATAL_EXIT_CODE: u8 = 128;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("RECLONE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn tool_overrides_from_env() -> Vec<(String, std::path::PathBuf)> {
    TOOL_ENV_OVERRIDES
        .iter()
        .filter_map(|(tool, var)| {
            let program = std::env::var(var).ok().filter(|p| !p.is_empty())?;
            Some(((*tool).to_owned(), program.into()))
        })
        .collect()
}

fn report_error(err: &CloneError) {
    eprintln!("fatal: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(err) = source {
        eprintln!("caused by: {err}");
        source = err.source();
    }
}

pub fn run() -> ExitCode {
    init_tracing();
    let args = CloneArgs::parse();
    tracing::debug!(?args, "starting clone");
    let options = args.to_clone_options();

    let mut reporter = StderrReporter {
        verbosity: options.verbosity,
    };
    let mut ctx = CloneContext {
        reporter: &mut reporter,
        tool_overrides: tool_overrides_from_env(),
    };

    let result = if args.resume {
        reclone_lib::clone::resume(&args.repo, &options, &mut ctx)
    } else {
        reclone_lib::clone::clone(&args.repo, args.dir.as_deref(), &options, &mut ctx)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // the clone itself stands; only the submodule recursion failed
        Err(err @ CloneError::Checkout(CheckoutError::Submodule(_))) => {
            report_error(&err);
            ExitCode::FAILURE
        }
        Err(err) => {
            report_error(&err);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}
