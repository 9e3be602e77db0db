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

//! Core parallel executor implementation.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::codec;
use crate::ssh::{
    AuthContext, ClientConfig, RusshTransport, Signal, Transport, DEFAULT_CONNECT_TIMEOUT,
};

use super::execution_strategy::{execute_host_task, HostTask, LaunchGuard, LaunchTracker};
use super::output_mode::ExecutionMode;
use super::result_types::{ExecutionState, ExecutionSummary, HostStreams, Report};

/// Run-wide settings handed to the executor at construction.
#[derive(Clone)]
pub struct ExecutorSettings {
    /// Port appended to hosts that do not name one.
    pub default_port: u16,
    /// Wrap the command in remote gzip; the formatter must decompress.
    pub compress: bool,
    pub connect_timeout: Duration,
    pub auth: AuthContext,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            default_port: 22,
            compress: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auth: AuthContext::default(),
        }
    }
}

impl ExecutorSettings {
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = auth;
        self
    }
}

/// Runs one command on many hosts at once.
///
/// One executor serves exactly one command. Host failures never fail
/// [`start`](Self::start); they are collected per host and surface through
/// [`report`](Self::report).
pub struct ParallelExecutor {
    hosts: Vec<String>,
    command: Arc<str>,
    mode: ExecutionMode,
    settings: ExecutorSettings,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<ExecutionState>>,
    ready: Arc<watch::Sender<bool>>,
    started: AtomicBool,
}

impl ParallelExecutor {
    /// Create an executor. With `settings.compress` the command is rewritten
    /// here, once, to gzip its output on the remote side.
    pub fn new(
        hosts: Vec<String>,
        command: &str,
        mode: ExecutionMode,
        settings: ExecutorSettings,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let command = if settings.compress {
            codec::compress_command(command)
        } else {
            command.to_string()
        };
        let (ready, _) = watch::channel(false);

        Self {
            hosts,
            command: Arc::from(command),
            mode,
            settings,
            transport,
            state: Arc::new(Mutex::new(ExecutionState::default())),
            ready: Arc::new(ready),
            started: AtomicBool::new(false),
        }
    }

    /// Create an executor backed by the russh transport.
    pub fn with_russh(
        hosts: Vec<String>,
        command: &str,
        mode: ExecutionMode,
        settings: ExecutorSettings,
    ) -> Self {
        Self::new(hosts, command, mode, settings, Arc::new(RusshTransport::new()))
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// The command as sent to each host, after any compression rewrite.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_compressed(&self) -> bool {
        self.settings.compress
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let auth = self
            .settings
            .auth
            .determine_method()
            .context("Failed to prepare SSH authentication")?;
        Ok(
            ClientConfig::new(self.settings.auth.effective_username(), auth)
                .with_connect_timeout(self.settings.connect_timeout),
        )
    }

    /// Run the command on every host and wait for all of them to finish.
    ///
    /// In stream mode the readiness flag (see [`ready`](Self::ready)) fires
    /// as soon as every host has started its command or failed, while this
    /// call keeps waiting for the remote commands to exit.
    ///
    /// Errors only when the run cannot start at all: a second call, or
    /// authentication that cannot be prepared.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            anyhow::bail!("Executor already started; create a new one for each command");
        }

        if self.hosts.is_empty() {
            self.ready.send_replace(true);
            return Ok(());
        }

        let client_config = match self.client_config() {
            Ok(config) => Arc::new(config),
            Err(e) => {
                self.ready.send_replace(true);
                return Err(e);
            }
        };

        tracing::debug!(
            "Executing '{}' on {} hosts in {:?} mode",
            self.command,
            self.hosts.len(),
            self.mode
        );

        let tracker = LaunchTracker::new(self.hosts.len(), Arc::clone(&self.ready));
        let tasks: Vec<_> = self
            .hosts
            .iter()
            .map(|host| {
                let task = HostTask {
                    host: host.clone(),
                    command: Arc::clone(&self.command),
                    mode: self.mode,
                    default_port: self.settings.default_port,
                    transport: Arc::clone(&self.transport),
                    client_config: Arc::clone(&client_config),
                    state: Arc::clone(&self.state),
                    launch: LaunchGuard::new(&tracker),
                };
                tokio::spawn(execute_host_task(task))
            })
            .collect();

        let results = join_all(tasks).await;

        for (host, result) in self.hosts.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!("[{}] execution task failed: {}", host, e);
                self.state
                    .lock()
                    .await
                    .errors
                    .entry(host.clone())
                    .or_insert_with(|| format!("Execution task failed: {e}"));
            }
        }

        Ok(())
    }

    /// Receiver for the stream-mode readiness flag.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Wait until every host has launched its command or failed.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Hand the live output readers to the caller.
    ///
    /// Each host's readers can be taken once; later calls return only hosts
    /// registered since.
    pub async fn take_streams(&self) -> HashMap<String, HostStreams> {
        std::mem::take(&mut self.state.lock().await.streams)
    }

    /// Hosts holding a live session, in host order.
    pub async fn live_hosts(&self) -> Vec<String> {
        let state = self.state.lock().await;
        self.ordered_hosts()
            .filter(|host| state.sessions.contains_key(*host))
            .cloned()
            .collect()
    }

    /// Signal and close every live session.
    ///
    /// Best effort: failures are logged and otherwise ignored, hosts without
    /// a session are skipped.
    pub async fn close_sessions(&self) {
        let sessions: Vec<_> = {
            let state = self.state.lock().await;
            state
                .sessions
                .iter()
                .map(|(host, session)| (host.clone(), Arc::clone(session)))
                .collect()
        };

        for (host, session) in sessions {
            tracing::debug!("[{}] terminating session", host);
            if let Err(e) = session.signal(Signal::Term).await {
                tracing::debug!("[{}] failed to signal session: {}", host, e);
            }
            if let Err(e) = session.close().await {
                tracing::debug!("[{}] failed to close session: {}", host, e);
            }
        }
    }

    /// Errors and outputs collected so far, in host order.
    pub async fn report(&self) -> Report {
        let state = self.state.lock().await;
        let mut report = Report::new();
        for host in self.ordered_hosts() {
            if let Some(error) = state.errors.get(host) {
                report.errors.push((host.clone(), error.clone()));
            }
            if let Some(output) = state.outputs.get(host) {
                report.outputs.push((host.clone(), output.clone()));
            }
        }
        report
    }

    pub async fn errors(&self) -> HashMap<String, String> {
        self.state.lock().await.errors.clone()
    }

    pub async fn outputs(&self) -> HashMap<String, Vec<u8>> {
        self.state.lock().await.outputs.clone()
    }

    pub async fn summary(&self) -> ExecutionSummary {
        let state = self.state.lock().await;
        let total = self.ordered_hosts().count();
        let failed = self
            .ordered_hosts()
            .filter(|host| state.errors.contains_key(*host))
            .count();
        ExecutionSummary {
            total,
            succeeded: total - failed,
            failed,
        }
    }

    /// Hosts in order with duplicates removed.
    fn ordered_hosts(&self) -> impl Iterator<Item = &String> {
        let mut seen = HashSet::new();
        self.hosts.iter().filter(move |host| seen.insert(*host))
    }
}
