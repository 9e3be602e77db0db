// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Run-wide defaults; every field can be overridden on the command line.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Defaults {
    /// Port used for hosts that do not name one. Default: 22
    pub port: Option<u16>,
    /// Gzip output on the remote side and decompress locally.
    pub compress: Option<bool>,
    /// Connection timeout in seconds. Default: 10
    pub connect_timeout: Option<u64>,
}

/// Login identity and credential source.
#[derive(Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub user: Option<String>,
    pub key_file: Option<String>,
    pub key_passphrase: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub use_agent: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("user", &self.user)
            .field("key_file", &self.key_file)
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("use_agent", &self.use_agent)
            .finish()
    }
}
