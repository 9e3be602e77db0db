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

//! Result types for parallel execution operations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ssh::{OutputReader, Session};

/// Live output readers for one host in stream mode.
pub struct HostStreams {
    pub stdout: OutputReader,
    pub stderr: OutputReader,
}

impl std::fmt::Debug for HostStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostStreams").finish_non_exhaustive()
    }
}

/// Per-host aggregation shared by every worker of one run.
///
/// All maps are keyed by the host identifier exactly as the caller supplied
/// it, before any default port is appended.
#[derive(Default)]
pub(crate) struct ExecutionState {
    pub outputs: HashMap<String, Vec<u8>>,
    pub errors: HashMap<String, String>,
    pub sessions: HashMap<String, Arc<dyn Session>>,
    pub streams: HashMap<String, HostStreams>,
}

impl ExecutionState {
    pub fn record_error(&mut self, host: &str, error: impl Into<String>) {
        self.errors.insert(host.to_string(), error.into());
    }

    pub fn record_output(&mut self, host: &str, output: Vec<u8>) {
        self.outputs.insert(host.to_string(), output);
    }
}

/// Snapshot of a run's errors and outputs, ordered by the host sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub errors: Vec<(String, String)>,
    /// Raw payloads; gzip data when the run was compressed.
    pub outputs: Vec<(String, Vec<u8>)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(mut self, host: impl Into<String>, error: impl Into<String>) -> Self {
        self.errors.push((host.into(), error.into()));
        self
    }

    pub fn with_output(mut self, host: impl Into<String>, output: impl Into<Vec<u8>>) -> Self {
        self.outputs.push((host.into(), output.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.outputs.is_empty()
    }

    pub fn error_for(&self, host: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, e)| e.as_str())
    }

    pub fn output_for(&self, host: &str) -> Option<&[u8]> {
        self.outputs
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, o)| o.as_slice())
    }
}

/// Host counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ExecutionSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Process exit code: 0 when every host succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }
}
