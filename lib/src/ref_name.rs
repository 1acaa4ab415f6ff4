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

//! Name type for remotes.
//!
//! A remote name can be constructed from a string:
//! ```
//! # use reclone_lib::ref_name::*;
//! let _: RemoteNameBuf = "origin".into();
//! let _: &RemoteName = "origin".as_ref();
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::fmt::Display;
use std::ops::Deref;

use ref_cast::RefCastCustom;
use ref_cast::ref_cast_custom;

/// Owned remote name.
///
/// Other than `.as_str()` and `Display`, this can be considered an immutable
/// `String`.
// Eq, Hash, and Ord must be compatible with RemoteName.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RemoteNameBuf(String);

/// Borrowed remote name.
#[derive(Debug, Eq, Hash, Ord, PartialEq, PartialOrd, RefCastCustom)]
#[repr(transparent)]
pub struct RemoteName(str);

impl RemoteNameBuf {
    /// Consumes this and returns the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl RemoteName {
    /// Wraps string name.
    #[ref_cast_custom]
    pub const fn new(name: &str) -> &Self;

    /// Returns the underlying string.
    pub const fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RemoteNameBuf {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RemoteNameBuf {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<&RemoteName> for RemoteNameBuf {
    fn from(value: &RemoteName) -> Self {
        value.to_owned()
    }
}

impl AsRef<RemoteName> for str {
    fn as_ref(&self) -> &RemoteName {
        RemoteName::new(self)
    }
}

impl AsRef<RemoteName> for String {
    fn as_ref(&self) -> &RemoteName {
        RemoteName::new(self)
    }
}

impl AsRef<RemoteName> for RemoteName {
    fn as_ref(&self) -> &RemoteName {
        self
    }
}

impl AsRef<RemoteName> for RemoteNameBuf {
    fn as_ref(&self) -> &RemoteName {
        self
    }
}

impl AsRef<str> for RemoteName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<RemoteName> for RemoteNameBuf {
    fn borrow(&self) -> &RemoteName {
        self
    }
}

impl Deref for RemoteNameBuf {
    type Target = RemoteName;

    fn deref(&self) -> &Self::Target {
        RemoteName::new(&self.0)
    }
}

impl ToOwned for RemoteName {
    type Owned = RemoteNameBuf;

    fn to_owned(&self) -> Self::Owned {
        RemoteNameBuf(self.0.to_owned())
    }
}

impl PartialEq<RemoteName> for RemoteNameBuf {
    fn eq(&self, other: &RemoteName) -> bool {
        self.0 == other.0
    }
}

impl PartialEq<RemoteNameBuf> for RemoteName {
    fn eq(&self, other: &RemoteNameBuf) -> bool {
        self.0 == other.0
    }
}

impl PartialEq<str> for RemoteName {
    fn eq(&self, other: &str) -> bool {
        &self.0 == other
    }
}

impl PartialEq<str> for RemoteNameBuf {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl Display for RemoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Display for RemoteNameBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self.deref(), f)
    }
}

/// Name of the remote created by default.
pub const DEFAULT_REMOTE: &RemoteName = RemoteName::new("origin");
