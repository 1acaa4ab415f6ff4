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

//! Clone orchestration core for reclone.
//!
//! The crate is organized around a single state machine, the
//! [`clone::CloneTask`], which coordinates destination provisioning, transport
//! negotiation, ref mapping, alt-resource priming with resumption, and
//! crash-safe junk cleanup. Object transport, working-tree population, and the
//! external pack tools are collaborators behind small interfaces with
//! file-backed default implementations.

#![deny(unused_must_use)]

pub mod alternates;
pub mod bundle;
pub mod checkout;
pub mod clone;
pub mod file_util;
pub mod junk;
pub mod local_clone;
pub mod object_id;
pub mod primer;
pub mod provision;
pub mod ref_map;
pub mod ref_name;
pub mod refs;
pub mod repo_config;
pub mod report;
pub mod resume;
pub mod source;
pub mod tools;
pub mod transport;
