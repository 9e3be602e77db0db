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

//! Errors raised by the session transport.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure of a dial, session, or command operation on a single host.
///
/// These never abort a run on their own: the executor turns them into the
/// host's entry in the error map.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid address '{address}': {source}")]
    AddressInvalid {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("address '{0}' did not resolve to any socket address")]
    AddressUnresolved(String),

    #[error("connection to {address} timed out after {}s", timeout.as_secs())]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("ssh: {0}")]
    Ssh(#[from] russh::Error),

    #[error("unable to authenticate as '{user}' using {method}")]
    AuthFailed { user: String, method: &'static str },

    #[error("failed to load private key: {0}")]
    KeyInvalid(#[from] russh::keys::Error),

    #[error("ssh agent: {0}")]
    Agent(String),

    #[error("no authentication method configured")]
    NoAuthMethod,

    #[error("session {0}")]
    SessionState(&'static str),

    #[error("remote command exited without reporting an exit status")]
    CommandDidntExit,

    #[error("remote command terminated by signal {0}")]
    Signaled(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
