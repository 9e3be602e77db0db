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

//! Command sessions on a russh channel.
//!
//! A session wraps one `session` channel. [`Session::output`] drives the
//! channel inline. [`Session::start`] hands the channel to a pump task that
//! forwards data into the output pipes and serves signal/close requests
//! until the remote side closes the channel; [`Session::wait`] then yields
//! the exit status.

use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg, Sig};
use tokio::sync::{mpsc, oneshot, Mutex};

use super::result::CommandResult;
use crate::ssh::error::{Result, TransportError};
use crate::ssh::pipe::{output_pipe, OutputReader, PipeWriter};
use crate::ssh::transport::{Session, Signal};

/// Initial capacity of the stdout buffer in capture mode.
const SSH_CMD_BUFFER_SIZE: usize = 8192;

/// Initial capacity of the stderr buffer in capture mode.
const SSH_RESPONSE_BUFFER_SIZE: usize = 1024;

#[derive(Debug)]
enum Control {
    Signal(Signal),
    Close,
}

pub struct RusshSession {
    address: String,
    /// Present until the command is launched.
    channel: Mutex<Option<Channel<Msg>>>,
    stdout: Mutex<Option<PipeWriter>>,
    stderr: Mutex<Option<PipeWriter>>,
    /// Present once the pump task runs.
    control: Mutex<Option<mpsc::UnboundedSender<Control>>>,
    exit: Mutex<Option<oneshot::Receiver<Result<u32>>>>,
}

impl RusshSession {
    pub(super) fn new(address: String, channel: Channel<Msg>) -> Self {
        Self {
            address,
            channel: Mutex::new(Some(channel)),
            stdout: Mutex::new(None),
            stderr: Mutex::new(None),
            control: Mutex::new(None),
            exit: Mutex::new(None),
        }
    }

    async fn take_channel(&self) -> Result<Channel<Msg>> {
        self.channel
            .lock()
            .await
            .take()
            .ok_or(TransportError::SessionState("already started"))
    }

    async fn pipe(&self, slot: &Mutex<Option<PipeWriter>>) -> Result<OutputReader> {
        if self.channel.lock().await.is_none() {
            return Err(TransportError::SessionState("pipe requested after start"));
        }
        let mut slot = slot.lock().await;
        if slot.is_some() {
            return Err(TransportError::SessionState("pipe already requested"));
        }
        let (writer, reader) = output_pipe();
        *slot = Some(writer);
        Ok(reader)
    }
}

fn to_russh_sig(signal: Signal) -> Sig {
    match signal {
        Signal::Term => Sig::TERM,
        Signal::Kill => Sig::KILL,
        Signal::Int => Sig::INT,
        Signal::Hup => Sig::HUP,
    }
}

#[async_trait]
impl Session for RusshSession {
    async fn output(&self, command: &str) -> Result<CommandResult> {
        let mut channel = self.take_channel().await?;
        tracing::debug!("Executing command on {}: {}", self.address, command);

        let mut stdout_buffer = Vec::with_capacity(SSH_CMD_BUFFER_SIZE);
        let mut stderr_buffer = Vec::with_capacity(SSH_RESPONSE_BUFFER_SIZE);
        channel.exec(true, command).await?;

        let mut exit_status: Option<u32> = None;
        let mut exit_signal: Option<String> = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout_buffer.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } => {
                    if ext == 1 {
                        stderr_buffer.extend_from_slice(data)
                    }
                }
                // The exit status may arrive before the last data packet, so
                // keep reading until the channel closes
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    exit_signal = Some(format!("{signal_name:?}"))
                }
                _ => {}
            }
        }

        match (exit_status, exit_signal) {
            (Some(exit_status), _) => Ok(CommandResult {
                output: stdout_buffer,
                stderr: stderr_buffer,
                exit_status,
            }),
            (None, Some(signal)) => Err(TransportError::Signaled(signal)),
            (None, None) => Err(TransportError::CommandDidntExit),
        }
    }

    async fn stdout_pipe(&self) -> Result<OutputReader> {
        self.pipe(&self.stdout).await
    }

    async fn stderr_pipe(&self) -> Result<OutputReader> {
        self.pipe(&self.stderr).await
    }

    async fn start(&self, command: &str) -> Result<()> {
        let channel = self.take_channel().await?;
        tracing::debug!("Starting command on {}: {}", self.address, command);
        channel.exec(true, command).await?;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let stdout = self.stdout.lock().await.take();
        let stderr = self.stderr.lock().await.take();

        *self.control.lock().await = Some(control_tx);
        *self.exit.lock().await = Some(exit_rx);

        tokio::spawn(pump(
            self.address.clone(),
            channel,
            control_rx,
            stdout,
            stderr,
            exit_tx,
        ));
        Ok(())
    }

    async fn wait(&self) -> Result<u32> {
        let exit_rx = self
            .exit
            .lock()
            .await
            .take()
            .ok_or(TransportError::SessionState("not started or already waited"))?;

        exit_rx
            .await
            .map_err(|_| TransportError::Other("session pump stopped unexpectedly".to_string()))?
    }

    async fn signal(&self, signal: Signal) -> Result<()> {
        match self.control.lock().await.as_ref() {
            Some(tx) => tx
                .send(Control::Signal(signal))
                .map_err(|_| TransportError::SessionState("already closed")),
            None => Err(TransportError::SessionState("not started")),
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(tx) = self.control.lock().await.as_ref() {
            return tx
                .send(Control::Close)
                .map_err(|_| TransportError::SessionState("already closed"));
        }

        // Never started: close the idle channel directly
        if let Some(channel) = self.channel.lock().await.take() {
            channel.close().await?;
        }
        Ok(())
    }
}

/// Forward channel traffic into the pipes and apply control requests until
/// the channel is gone, then report how the command ended.
async fn pump(
    address: String,
    mut channel: Channel<Msg>,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    stdout: Option<PipeWriter>,
    stderr: Option<PipeWriter>,
    exit_tx: oneshot::Sender<Result<u32>>,
) {
    let mut exit_status: Option<u32> = None;
    let mut exit_signal: Option<String> = None;
    let mut control_open = true;

    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { ref data }) => {
                    if let Some(ref writer) = stdout {
                        writer.write(data);
                    }
                }
                Some(ChannelMsg::ExtendedData { ref data, ext }) => {
                    if ext == 1 {
                        if let Some(ref writer) = stderr {
                            writer.write(data);
                        }
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => exit_status = Some(status),
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    exit_signal = Some(format!("{signal_name:?}"))
                }
                Some(_) => {}
                None => break,
            },
            request = control_rx.recv(), if control_open => match request {
                Some(Control::Signal(signal)) => {
                    if let Err(e) = channel.signal(to_russh_sig(signal)).await {
                        tracing::debug!("Failed to send SIG{} to {}: {}", signal.name(), address, e);
                    }
                }
                Some(Control::Close) => {
                    if let Err(e) = channel.close().await {
                        tracing::debug!("Failed to close session on {}: {}", address, e);
                    }
                }
                None => control_open = false,
            },
        }
    }

    // Dropping the writers gives the readers EOF
    drop(stdout);
    drop(stderr);

    let result = match (exit_status, exit_signal) {
        (Some(status), _) => Ok(status),
        (None, Some(signal)) => Err(TransportError::Signaled(signal)),
        (None, None) => Err(TransportError::CommandDidntExit),
    };
    tracing::debug!("Session on {} finished: {:?}", address, result);
    let _ = exit_tx.send(result);
}
