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

//! russh-backed transport: dialing, host-key handling and session opening.

use async_trait::async_trait;
use russh::client::{Config, Handle, Handler};
use std::net::SocketAddr;
use std::sync::Arc;

use super::session::RusshSession;
use crate::ssh::auth::authenticate;
use crate::ssh::error::{Result, TransportError};
use crate::ssh::transport::{ClientConfig, Connection, Session, Transport};

/// [`Transport`] implementation over russh.
#[derive(Clone, Default)]
pub struct RusshTransport {
    config: Arc<Config>,
}

impl RusshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn connect(
        &self,
        address: &str,
        config: &ClientConfig,
    ) -> Result<(SocketAddr, Handle<ClientHandler>)> {
        let socket_addrs = tokio::net::lookup_host(address).await.map_err(|source| {
            TransportError::AddressInvalid {
                address: address.to_string(),
                source,
            }
        })?;

        // Try each resolved address until one accepts the handshake
        let mut connect_res = Err(TransportError::AddressUnresolved(address.to_string()));
        for socket_addr in socket_addrs {
            let handler = ClientHandler::new(address.to_string(), socket_addr);
            match russh::client::connect(self.config.clone(), socket_addr, handler).await {
                Ok(handle) => {
                    connect_res = Ok((socket_addr, handle));
                    break;
                }
                Err(e) => {
                    tracing::debug!("Connecting to {} ({}) failed: {}", address, socket_addr, e);
                    connect_res = Err(e);
                }
            }
        }
        let (socket_addr, mut handle) = connect_res?;

        authenticate(&mut handle, &config.username, &config.auth).await?;
        Ok((socket_addr, handle))
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn dial(&self, address: &str, config: &ClientConfig) -> Result<Box<dyn Connection>> {
        tracing::debug!("Connecting to {} as {}", address, config.username);

        let (socket_addr, handle) =
            match tokio::time::timeout(config.connect_timeout, self.connect(address, config)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(TransportError::ConnectTimeout {
                        address: address.to_string(),
                        timeout: config.connect_timeout,
                    })
                }
            };

        tracing::debug!("Connected and authenticated to {} ({})", address, socket_addr);
        Ok(Box::new(RusshConnection {
            address: address.to_string(),
            handle: Arc::new(handle),
        }))
    }
}

/// An authenticated russh connection.
pub struct RusshConnection {
    address: String,
    handle: Arc<Handle<ClientHandler>>,
}

#[async_trait]
impl Connection for RusshConnection {
    async fn new_session(&self) -> Result<Arc<dyn Session>> {
        let channel = self.handle.channel_open_session().await?;
        Ok(Arc::new(RusshSession::new(self.address.clone(), channel)))
    }

    async fn close(&self) -> Result<()> {
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

/// russh client handler. Accepts every server key.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    address: String,
    host: SocketAddr,
}

impl ClientHandler {
    pub fn new(address: String, host: SocketAddr) -> Self {
        Self { address, host }
    }
}

impl Handler for ClientHandler {
    type Error = TransportError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::trace!("Accepting host key for {} ({})", self.address, self.host);
        Ok(true)
    }
}
