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

//! User-facing status and warning output.

/// Sink for the human-readable side channel of a clone.
///
/// Fatal conditions travel as errors; everything the user should see while
/// the clone keeps going lands here.
pub trait Reporter {
    fn status(&mut self, message: &str);
    fn warning(&mut self, message: &str);
}

/// Prints to stderr, the way interactive use expects.
#[derive(Debug)]
pub struct StderrReporter {
    pub verbosity: i32,
}

impl Reporter for StderrReporter {
    fn status(&mut self, message: &str) {
        if self.verbosity >= 0 {
            eprintln!("{message}");
        }
    }

    fn warning(&mut self, message: &str) {
        eprintln!("warning: {message}");
    }
}

/// Collects messages instead of printing them.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub statuses: Vec<String>,
    pub warnings: Vec<String>,
}

impl Reporter for CollectingReporter {
    fn status(&mut self, message: &str) {
        self.statuses.push(message.to_owned());
    }

    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_owned());
    }
}
