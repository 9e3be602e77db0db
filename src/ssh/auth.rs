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

//! Authentication material for SSH connections.
//!
//! [`AuthContext`] turns configuration into a single [`AuthMethod`] once per
//! run. Failing to do so is a configuration error: no host is attempted.
//! [`authenticate`] then applies that method to every new connection.

use anyhow::{Context, Result};
use russh::client::{Handle, Handler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::error::TransportError;

/// An authentication token applied to every connection of a run.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthMethod {
    Password(Zeroizing<String>),
    PrivateKey {
        /// entire contents of private key file
        key_data: Zeroizing<String>,
        key_pass: Option<Zeroizing<String>>,
    },
    #[cfg(not(target_os = "windows"))]
    Agent,
}

impl AuthMethod {
    pub fn with_password(password: &str) -> Self {
        Self::Password(Zeroizing::new(password.to_string()))
    }

    pub fn with_key(key: &str, passphrase: Option<&str>) -> Self {
        Self::PrivateKey {
            key_data: Zeroizing::new(key.to_string()),
            key_pass: passphrase.map(|p| Zeroizing::new(p.to_string())),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::PrivateKey { .. } => "private key",
            #[cfg(not(target_os = "windows"))]
            AuthMethod::Agent => "ssh agent",
        }
    }
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthMethod({})", self.label())
    }
}

/// Inputs for choosing the authentication method.
#[derive(Clone, Default)]
pub struct AuthContext {
    pub username: Option<String>,
    pub key_path: Option<PathBuf>,
    pub key_passphrase: Option<Zeroizing<String>>,
    pub password: Option<Zeroizing<String>>,
    pub use_agent: bool,
    /// Directory searched for default keys; `~/.ssh` when unset.
    pub ssh_dir: Option<PathBuf>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_key_path(mut self, key_path: Option<PathBuf>) -> Self {
        self.key_path = key_path;
        self
    }

    pub fn with_key_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.key_passphrase = passphrase.map(Zeroizing::new);
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.map(Zeroizing::new);
        self
    }

    pub fn with_agent(mut self, use_agent: bool) -> Self {
        self.use_agent = use_agent;
        self
    }

    pub fn with_ssh_dir(mut self, ssh_dir: PathBuf) -> Self {
        self.ssh_dir = Some(ssh_dir);
        self
    }

    /// Login name: the configured user, else the local user, else `root`.
    pub fn effective_username(&self) -> String {
        self.username
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| {
                std::env::var("USER")
                    .or_else(|_| std::env::var("USERNAME"))
                    .unwrap_or_else(|_| "root".to_string())
            })
    }

    /// Pick the authentication method.
    ///
    /// Priority:
    /// 1. Password (if configured)
    /// 2. Explicit key file
    /// 3. SSH agent (if requested and `SSH_AUTH_SOCK` is set)
    /// 4. Default key locations (`id_ed25519`, `id_rsa`, `id_ecdsa`)
    pub fn determine_method(&self) -> Result<AuthMethod> {
        if let Some(ref password) = self.password {
            tracing::debug!("Using password authentication");
            return Ok(AuthMethod::Password(password.clone()));
        }

        if let Some(ref key_path) = self.key_path {
            return self.key_file_auth(key_path);
        }

        #[cfg(not(target_os = "windows"))]
        if self.use_agent {
            if std::env::var("SSH_AUTH_SOCK").is_ok() {
                tracing::debug!("Using SSH agent for authentication");
                return Ok(AuthMethod::Agent);
            }
            tracing::warn!("SSH agent requested but SSH_AUTH_SOCK environment variable not set");
        }

        self.default_key_auth()
    }

    /// Read and decode a key file so a bad key or passphrase fails the run
    /// up front instead of once per host.
    fn key_file_auth(&self, key_path: &Path) -> Result<AuthMethod> {
        tracing::debug!("Authenticating with key: {:?}", key_path);

        let key_data = Zeroizing::new(
            std::fs::read_to_string(key_path)
                .with_context(|| format!("Failed to read SSH key file: {key_path:?}"))?,
        );
        let key_pass = self.key_passphrase.clone();

        russh::keys::decode_secret_key(&key_data, key_pass.as_ref().map(|p| p.as_str()))
            .with_context(|| {
                format!("Failed to decode SSH key {key_path:?}; check the format and passphrase")
            })?;

        Ok(AuthMethod::PrivateKey { key_data, key_pass })
    }

    fn default_key_auth(&self) -> Result<AuthMethod> {
        let ssh_dir = match self.ssh_dir {
            Some(ref dir) => dir.clone(),
            None => directories::BaseDirs::new()
                .map(|dirs| dirs.home_dir().join(".ssh"))
                .context("Unable to determine the home directory for default SSH keys")?,
        };

        for name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
            let candidate = ssh_dir.join(name);
            if candidate.exists() {
                tracing::debug!("Using default key: {:?}", candidate);
                return self.key_file_auth(&candidate);
            }
        }

        anyhow::bail!(
            "No SSH authentication method available.\n\
             Tried:\n\
             - password: not configured\n\
             - SSH agent: {}\n\
             - default keys in {:?}: not found\n\
             Configure auth.password, auth.key_file or auth.use_agent",
            if self.use_agent {
                "SSH_AUTH_SOCK not set"
            } else {
                "disabled"
            },
            ssh_dir
        )
    }
}

/// Authenticate `handle` as `username` with `auth`.
pub(crate) async fn authenticate<H: Handler>(
    handle: &mut Handle<H>,
    username: &str,
    auth: &AuthMethod,
) -> Result<(), TransportError> {
    let failed = || TransportError::AuthFailed {
        user: username.to_string(),
        method: auth.label(),
    };

    match auth {
        AuthMethod::Password(password) => {
            let result = handle
                .authenticate_password(username, password.as_str())
                .await?;
            if !result.success() {
                return Err(failed());
            }
        }
        AuthMethod::PrivateKey { key_data, key_pass } => {
            let private_key =
                russh::keys::decode_secret_key(key_data, key_pass.as_ref().map(|p| p.as_str()))?;
            let result = handle
                .authenticate_publickey(
                    username,
                    russh::keys::PrivateKeyWithHashAlg::new(
                        Arc::new(private_key),
                        handle.best_supported_rsa_hash().await?.flatten(),
                    ),
                )
                .await?;
            if !result.success() {
                return Err(failed());
            }
        }
        #[cfg(not(target_os = "windows"))]
        AuthMethod::Agent => {
            let mut agent = russh::keys::agent::client::AgentClient::connect_env()
                .await
                .map_err(|e| TransportError::Agent(format!("failed to connect: {e}")))?;

            let identities = agent
                .request_identities()
                .await
                .map_err(|e| TransportError::Agent(format!("failed to list identities: {e}")))?;

            if identities.is_empty() {
                return Err(TransportError::Agent("agent has no identities".to_string()));
            }

            let mut authenticated = false;
            for identity in identities {
                let result = handle
                    .authenticate_publickey_with(
                        username,
                        identity.clone(),
                        handle.best_supported_rsa_hash().await?.flatten(),
                        &mut agent,
                    )
                    .await;

                if let Ok(auth_result) = result {
                    if auth_result.success() {
                        authenticated = true;
                        break;
                    }
                }
            }

            if !authenticated {
                return Err(failed());
            }
        }
    }
    Ok(())
}
