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

//! Scripted in-process transport for executor tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

use hostrun::executor::ExecutorSettings;
use hostrun::ssh::{
    output_pipe, AuthContext, ClientConfig, CommandResult, Connection, OutputReader, PipeWriter,
    Session, Signal, Transport, TransportError,
};

/// What a host does when the executor talks to it.
#[derive(Debug, Clone)]
pub enum Script {
    DialError(String),
    SessionError(String),
    Output {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        status: u32,
    },
    OutputError(String),
    Stream {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        status: u32,
        /// Keep running until the session is closed.
        hold: bool,
    },
    StartError(String),
}

impl Script {
    pub fn ok(stdout: &str) -> Self {
        Script::Output {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            status: 0,
        }
    }

    pub fn failed(stdout: &str, stderr: &str, status: u32) -> Self {
        Script::Output {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            status,
        }
    }

    pub fn stream(stdout: &str, stderr: &str, status: u32) -> Self {
        Script::Stream {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            status,
            hold: false,
        }
    }

    pub fn held_stream(stdout: &str) -> Self {
        Script::Stream {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            status: 0,
            hold: true,
        }
    }
}

/// Everything the transport observed, keyed by dialed address.
#[derive(Debug, Default)]
pub struct Log {
    pub dials: Vec<(String, String)>,
    pub commands: Vec<(String, String)>,
    pub signals: Vec<(String, Signal)>,
    pub closed_sessions: Vec<String>,
    pub closed_connections: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: HashMap<String, Script>,
    dial_delay: Option<Duration>,
    log: Arc<Mutex<Log>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the host dialed at `address` (`host:port`). Unscripted hosts
    /// succeed and print their own address.
    pub fn with_script(mut self, address: &str, script: Script) -> Self {
        self.scripts.insert(address.to_string(), script);
        self
    }

    pub fn with_dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = Some(delay);
        self
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }

    fn script_for(&self, address: &str) -> Script {
        self.scripts
            .get(address)
            .cloned()
            .unwrap_or_else(|| Script::ok(&format!("{address}\n")))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn dial(
        &self,
        address: &str,
        config: &ClientConfig,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.log
            .lock()
            .unwrap()
            .dials
            .push((address.to_string(), config.username.clone()));

        if let Some(delay) = self.dial_delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.script_for(address);
        if let Script::DialError(ref msg) = script {
            return Err(TransportError::Other(msg.clone()));
        }

        Ok(Box::new(MockConnection {
            address: address.to_string(),
            script,
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockConnection {
    address: String,
    script: Script,
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn new_session(&self) -> Result<Arc<dyn Session>, TransportError> {
        if let Script::SessionError(ref msg) = self.script {
            return Err(TransportError::Other(msg.clone()));
        }
        Ok(Arc::new(MockSession {
            address: self.address.clone(),
            script: self.script.clone(),
            log: Arc::clone(&self.log),
            stdout: Mutex::new(None),
            stderr: Mutex::new(None),
            closed: Arc::new(Notify::new()),
            exit: tokio::sync::Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .closed_connections
            .push(self.address.clone());
        Ok(())
    }
}

struct MockSession {
    address: String,
    script: Script,
    log: Arc<Mutex<Log>>,
    stdout: Mutex<Option<PipeWriter>>,
    stderr: Mutex<Option<PipeWriter>>,
    closed: Arc<Notify>,
    exit: tokio::sync::Mutex<Option<oneshot::Receiver<Result<u32, String>>>>,
}

impl MockSession {
    fn pipe(&self, slot: &Mutex<Option<PipeWriter>>) -> OutputReader {
        let (writer, reader) = output_pipe();
        *slot.lock().unwrap() = Some(writer);
        reader
    }

    fn record_command(&self, command: &str) {
        self.log
            .lock()
            .unwrap()
            .commands
            .push((self.address.clone(), command.to_string()));
    }
}

#[async_trait]
impl Session for MockSession {
    async fn output(&self, command: &str) -> Result<CommandResult, TransportError> {
        self.record_command(command);
        match self.script {
            Script::Output {
                ref stdout,
                ref stderr,
                status,
            } => Ok(CommandResult {
                output: stdout.clone(),
                stderr: stderr.clone(),
                exit_status: status,
            }),
            Script::OutputError(ref msg) => Err(TransportError::Other(msg.clone())),
            _ => Err(TransportError::Other("unexpected output call".to_string())),
        }
    }

    async fn stdout_pipe(&self) -> Result<OutputReader, TransportError> {
        Ok(self.pipe(&self.stdout))
    }

    async fn stderr_pipe(&self) -> Result<OutputReader, TransportError> {
        Ok(self.pipe(&self.stderr))
    }

    async fn start(&self, command: &str) -> Result<(), TransportError> {
        self.record_command(command);

        let (stdout_data, stderr_data, status, hold) = match self.script {
            Script::Stream {
                ref stdout,
                ref stderr,
                status,
                hold,
            } => (stdout.clone(), stderr.clone(), status, hold),
            Script::StartError(ref msg) => return Err(TransportError::Other(msg.clone())),
            _ => return Err(TransportError::Other("unexpected start call".to_string())),
        };

        let stdout = self.stdout.lock().unwrap().take();
        let stderr = self.stderr.lock().unwrap().take();
        let closed = Arc::clone(&self.closed);
        let (tx, rx) = oneshot::channel();
        *self.exit.lock().await = Some(rx);

        tokio::spawn(async move {
            if let Some(ref writer) = stdout {
                writer.write(&stdout_data);
            }
            if let Some(ref writer) = stderr {
                writer.write(&stderr_data);
            }
            if hold {
                closed.notified().await;
                drop((stdout, stderr));
                let _ = tx.send(Err("terminated".to_string()));
            } else {
                drop((stdout, stderr));
                let _ = tx.send(Ok(status));
            }
        });

        Ok(())
    }

    async fn wait(&self) -> Result<u32, TransportError> {
        let rx = self
            .exit
            .lock()
            .await
            .take()
            .ok_or(TransportError::SessionState("not started"))?;
        match rx.await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(_)) => Err(TransportError::Signaled("TERM".to_string())),
            Err(_) => Err(TransportError::CommandDidntExit),
        }
    }

    async fn signal(&self, signal: Signal) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .signals
            .push((self.address.clone(), signal));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .closed_sessions
            .push(self.address.clone());
        self.closed.notify_one();
        Ok(())
    }
}

/// Settings that resolve authentication without touching the filesystem.
pub fn test_settings() -> ExecutorSettings {
    let auth = AuthContext::new()
        .with_username(Some("tester".to_string()))
        .with_password(Some("secret".to_string()));
    ExecutorSettings::default().with_auth(auth)
}

pub fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
