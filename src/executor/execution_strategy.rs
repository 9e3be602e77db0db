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

//! Per-host worker logic for the parallel executor.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::node::Node;
use crate::ssh::{ClientConfig, Connection, Transport};

use super::output_mode::ExecutionMode;
use super::result_types::{ExecutionState, HostStreams};

/// Counts workers that have not yet launched their command.
///
/// The readiness flag flips once the count reaches zero. A worker counts as
/// launched when its command started or when it failed before getting there.
pub(crate) struct LaunchTracker {
    remaining: AtomicUsize,
    ready: Arc<watch::Sender<bool>>,
}

impl LaunchTracker {
    pub fn new(workers: usize, ready: Arc<watch::Sender<bool>>) -> Arc<Self> {
        let tracker = Arc::new(Self {
            remaining: AtomicUsize::new(workers),
            ready,
        });
        if workers == 0 {
            tracker.ready.send_replace(true);
        }
        tracker
    }

    fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.ready.send_replace(true);
        }
    }
}

/// Marks one worker as launched when dropped, so every exit path counts,
/// including a panicking task.
pub(crate) struct LaunchGuard {
    tracker: Arc<LaunchTracker>,
}

impl LaunchGuard {
    pub fn new(tracker: &Arc<LaunchTracker>) -> Self {
        Self {
            tracker: Arc::clone(tracker),
        }
    }
}

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        self.tracker.arrive();
    }
}

/// Everything one host's worker needs.
pub(crate) struct HostTask {
    pub host: String,
    pub command: Arc<str>,
    pub mode: ExecutionMode,
    pub default_port: u16,
    pub transport: Arc<dyn Transport>,
    pub client_config: Arc<ClientConfig>,
    pub state: Arc<Mutex<ExecutionState>>,
    pub launch: LaunchGuard,
}

/// Run the command on one host and record the outcome in the shared state.
pub(crate) async fn execute_host_task(task: HostTask) {
    let HostTask {
        host,
        command,
        mode,
        default_port,
        transport,
        client_config,
        state,
        launch,
    } = task;

    let node = match Node::parse(&host, default_port) {
        Ok(node) => node,
        Err(e) => {
            state.lock().await.record_error(&host, format!("{e:#}"));
            return;
        }
    };

    let config = match node.username {
        Some(ref user) => Cow::Owned(ClientConfig {
            username: user.clone(),
            ..(*client_config).clone()
        }),
        None => Cow::Borrowed(client_config.as_ref()),
    };

    let address = node.address();
    tracing::debug!("[{}] dialing {} as {}", host, address, config.username);

    let connection = match transport.dial(&address, &config).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::debug!("[{}] dial failed: {}", host, e);
            state.lock().await.record_error(&host, e.to_string());
            return;
        }
    };

    match mode {
        ExecutionMode::Capture => {
            drop(launch);
            capture_on_host(&host, &command, connection.as_ref(), &state).await;
        }
        ExecutionMode::Stream => {
            stream_on_host(&host, &command, connection.as_ref(), &state, launch).await;
        }
    }

    if let Err(e) = connection.close().await {
        tracing::debug!("[{}] failed to close connection: {}", host, e);
    }
}

async fn capture_on_host(
    host: &str,
    command: &str,
    connection: &dyn Connection,
    state: &Mutex<ExecutionState>,
) {
    let session = match connection.new_session().await {
        Ok(session) => session,
        Err(e) => {
            state.lock().await.record_error(host, e.to_string());
            return;
        }
    };

    let result = session.output(command).await;

    if let Err(e) = session.close().await {
        tracing::debug!("[{}] failed to close session: {}", host, e);
    }

    let mut state = state.lock().await;
    match result {
        Ok(result) if result.is_success() => {
            tracing::debug!("[{}] command succeeded", host);
            state.record_output(host, result.output);
        }
        Ok(result) => {
            tracing::debug!("[{}] command exited with {}", host, result.exit_status);
            let message = result.failure_message();
            if !result.output.is_empty() {
                state.record_output(host, result.output);
            }
            state.record_error(host, message);
        }
        Err(e) => {
            tracing::debug!("[{}] command failed: {}", host, e);
            state.record_error(host, e.to_string());
        }
    }
}

async fn stream_on_host(
    host: &str,
    command: &str,
    connection: &dyn Connection,
    state: &Mutex<ExecutionState>,
    launch: LaunchGuard,
) {
    let session = match connection.new_session().await {
        Ok(session) => session,
        Err(e) => {
            state.lock().await.record_error(host, e.to_string());
            return;
        }
    };

    let readers = async {
        let stdout = session.stdout_pipe().await?;
        let stderr = session.stderr_pipe().await?;
        session.start(command).await?;
        Ok::<_, crate::ssh::TransportError>(HostStreams { stdout, stderr })
    };

    let streams = match readers.await {
        Ok(streams) => streams,
        Err(e) => {
            state.lock().await.record_error(host, e.to_string());
            if let Err(e) = session.close().await {
                tracing::debug!("[{}] failed to close session: {}", host, e);
            }
            return;
        }
    };

    {
        let mut state = state.lock().await;
        state.sessions.insert(host.to_string(), Arc::clone(&session));
        state.streams.insert(host.to_string(), streams);
    }
    tracing::debug!("[{}] command started", host);
    drop(launch);

    match session.wait().await {
        Ok(0) => tracing::debug!("[{}] command finished", host),
        Ok(status) => {
            state
                .lock()
                .await
                .record_error(host, format!("Process exited with status {status}"));
        }
        Err(e) => {
            tracing::debug!("[{}] wait failed: {}", host, e);
            state.lock().await.record_error(host, e.to_string());
        }
    }

    if let Err(e) = session.close().await {
        tracing::debug!("[{}] session already closed: {}", host, e);
    }
}
