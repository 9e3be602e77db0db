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

//! Execution mode for a multi-host run.
//!
//! - Capture: run to completion and buffer each host's output
//! - Stream: expose live stdout/stderr readers while commands run

/// How the executor runs the command on each host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Run to completion, capturing standard output per host.
    ///
    /// `start` returns once every host has finished.
    #[default]
    Capture,

    /// Keep sessions live and hand out readers for their output.
    ///
    /// Readers become available as soon as the readiness signal fires;
    /// `start` still returns only after every remote command has exited.
    Stream,
}

impl ExecutionMode {
    /// Create the mode from the `--stream` CLI flag.
    pub fn from_args(stream: bool) -> Self {
        if stream {
            ExecutionMode::Stream
        } else {
            ExecutionMode::Capture
        }
    }

    pub fn is_capture(&self) -> bool {
        matches!(self, ExecutionMode::Capture)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, ExecutionMode::Stream)
    }
}

/// Check if stdout is a TTY
///
/// This is used to automatically disable colored output when output is
/// being piped or redirected, or when running in CI environments.
pub fn is_tty() -> bool {
    use std::io::IsTerminal;

    let is_terminal = std::io::stdout().is_terminal();

    let is_ci = std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("JENKINS_URL").is_ok();

    is_terminal && !is_ci
}

/// Check if colors should be enabled
///
/// Colors are enabled when:
/// - Output is a TTY
/// - NO_COLOR environment variable is not set
/// - TERM is not "dumb"
pub fn should_use_colors() -> bool {
    if !is_tty() {
        return false;
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}
