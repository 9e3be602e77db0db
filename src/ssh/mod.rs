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

//! SSH session transport.
//!
//! The executor consumes the [`Transport`] seam; [`RusshTransport`] is the
//! implementation used by the binary.

pub mod auth;
pub mod client;
pub mod error;
pub mod pipe;
pub mod transport;

pub use auth::{AuthContext, AuthMethod};
pub use client::{CommandResult, RusshTransport};
pub use error::TransportError;
pub use pipe::{output_pipe, OutputReader, PipeWriter};
pub use transport::{
    ClientConfig, Connection, Session, Signal, Transport, DEFAULT_CONNECT_TIMEOUT,
};
