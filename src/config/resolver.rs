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

//! Merging of file configuration with command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::ExecutorSettings;
use crate::ssh::{AuthContext, DEFAULT_CONNECT_TIMEOUT};

use super::types::Config;
use super::utils::expand_tilde;

pub const DEFAULT_PORT: u16 = 22;

/// Values given on the command line. `None` and `false` leave the file
/// configuration in charge.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub user: Option<String>,
    pub key_file: Option<PathBuf>,
    pub password: Option<String>,
    pub use_agent: bool,
    pub compress: bool,
    pub connect_timeout: Option<u64>,
    /// Stream mode prints live plain-text lines, so it never compresses.
    pub stream: bool,
}

impl Config {
    pub fn port(&self, overrides: &Overrides) -> u16 {
        overrides
            .port
            .or(self.defaults.port)
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn compress(&self, overrides: &Overrides) -> bool {
        if overrides.stream {
            return false;
        }
        overrides.compress || self.defaults.compress.unwrap_or(false)
    }

    pub fn connect_timeout(&self, overrides: &Overrides) -> Duration {
        overrides
            .connect_timeout
            .or(self.defaults.connect_timeout)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Authentication inputs: command-line values first, then the file.
    pub fn auth_context(&self, overrides: &Overrides) -> AuthContext {
        let key_path = overrides.key_file.clone().or_else(|| {
            self.auth
                .key_file
                .as_deref()
                .map(|path| expand_tilde(Path::new(path)))
        });

        AuthContext::new()
            .with_username(overrides.user.clone().or_else(|| self.auth.user.clone()))
            .with_key_path(key_path)
            .with_key_passphrase(self.auth.key_passphrase.clone())
            .with_password(
                overrides
                    .password
                    .clone()
                    .or_else(|| self.auth.password.clone()),
            )
            .with_agent(overrides.use_agent || self.auth.use_agent)
    }

    /// Everything the executor needs for one run.
    pub fn executor_settings(&self, overrides: &Overrides) -> ExecutorSettings {
        ExecutorSettings::default()
            .with_default_port(self.port(overrides))
            .with_compress(self.compress(overrides))
            .with_connect_timeout(self.connect_timeout(overrides))
            .with_auth(self.auth_context(overrides))
    }
}
