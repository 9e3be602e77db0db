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

//! Parallel execution of one command across many hosts.

mod execution_strategy;
mod output_mode;
mod output_sync;
mod parallel;
mod result_types;

// Re-export public types
pub use output_mode::{is_tty, should_use_colors, ExecutionMode};
pub use output_sync::{forward_lines, HostOutputWriter};
pub use parallel::{ExecutorSettings, ParallelExecutor};
pub use result_types::{ExecutionSummary, HostStreams, Report};
