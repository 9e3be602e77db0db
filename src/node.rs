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

use anyhow::{Context, Result};
use std::fmt;

/// A target host as given by the operator, resolved to a dialable address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The identifier exactly as supplied; results are keyed by it.
    pub original: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
}

impl Node {
    pub fn parse(node_str: &str, default_port: u16) -> Result<Self> {
        // Parse formats:
        // - host
        // - host:port
        // - user@host[:port]
        // - [v6addr] / [v6addr]:port
        // - bare v6addr (always the default port)

        let (username, host_part) = match node_str.find('@') {
            Some(at_pos) => (
                Some(node_str[..at_pos].to_string()),
                &node_str[at_pos + 1..],
            ),
            None => (None, node_str),
        };

        let (host, port) = if let Some(bracketed) = host_part.strip_prefix('[') {
            let close = bracketed
                .find(']')
                .with_context(|| format!("Unclosed '[' in host '{node_str}'"))?;
            let host = &bracketed[..close];
            let rest = &bracketed[close + 1..];
            let port = match rest.strip_prefix(':') {
                Some(port_str) => parse_port(port_str, node_str)?,
                None if rest.is_empty() => default_port,
                None => anyhow::bail!("Unexpected '{rest}' after ']' in host '{node_str}'"),
            };
            (host, port)
        } else {
            match host_part.matches(':').count() {
                0 => (host_part, default_port),
                1 => match host_part.split_once(':') {
                    Some((host, port_str)) => (host, parse_port(port_str, node_str)?),
                    None => (host_part, default_port),
                },
                _ => (host_part, default_port),
            }
        };

        if host.is_empty() {
            anyhow::bail!("Empty host name in '{node_str}'");
        }

        Ok(Node {
            original: node_str.to_string(),
            host: host.to_string(),
            port,
            username: username.filter(|u| !u.is_empty()),
        })
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(port_str: &str, node_str: &str) -> Result<u16> {
    port_str
        .parse::<u16>()
        .with_context(|| format!("Invalid port number in host '{node_str}'"))
}

/// Append `default_port` to a host identifier that has no explicit port.
pub fn normalize_address(host: &str, default_port: u16) -> Result<String> {
    Node::parse(host, default_port).map(|node| node.address())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.username {
            Some(ref user) => write!(f, "{}@{}", user, self.address()),
            None => write!(f, "{}", self.address()),
        }
    }
}
