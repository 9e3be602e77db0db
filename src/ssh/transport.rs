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

//! Transport seam between the executor and an SSH implementation.
//!
//! The executor only talks to these traits. [`crate::ssh::client::RusshTransport`]
//! is the production implementation; tests plug in scripted transports.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::auth::AuthMethod;
use super::client::CommandResult;
use super::error::Result;
use super::pipe::OutputReader;

/// Connection timeout used when the configuration does not set one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by every dial of a run.
///
/// Host keys are not verified: the operator's network is trusted, the
/// remote identity is not checked.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub username: String,
    pub auth: AuthMethod,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            username: username.into(),
            auth,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Signals that can be delivered to a remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
    Int,
    Hup,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Term => "TERM",
            Signal::Kill => "KILL",
            Signal::Int => "INT",
            Signal::Hup => "HUP",
        }
    }
}

/// Produces connections to remote hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect and authenticate to `address` (`host:port`).
    async fn dial(&self, address: &str, config: &ClientConfig) -> Result<Box<dyn Connection>>;
}

/// An authenticated connection able to open command sessions.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn new_session(&self) -> Result<Arc<dyn Session>>;

    async fn close(&self) -> Result<()>;
}

/// A single remote command execution.
///
/// A session runs exactly one command, either to completion through
/// [`Session::output`] or live through [`Session::start`] and
/// [`Session::wait`]. Pipes must be requested before `start`.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run `command` to completion and collect its output.
    async fn output(&self, command: &str) -> Result<CommandResult>;

    async fn stdout_pipe(&self) -> Result<OutputReader>;

    async fn stderr_pipe(&self) -> Result<OutputReader>;

    /// Launch `command` without waiting for it.
    async fn start(&self, command: &str) -> Result<()>;

    /// Block until the command started with [`Session::start`] exits and
    /// return its exit status.
    async fn wait(&self) -> Result<u32>;

    async fn signal(&self, signal: Signal) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
