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

//! Line-atomic, host-prefixed output for stream mode.

use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Writes whole lines prefixed with `[host]` to stdout or stderr.
///
/// Each line is written while holding the stream lock, so lines from
/// different hosts never interleave mid-line.
#[derive(Debug, Clone)]
pub struct HostOutputWriter {
    prefix: String,
}

impl HostOutputWriter {
    pub fn new(host: &str) -> Self {
        Self {
            prefix: format!("[{host}]"),
        }
    }

    pub fn format_line(&self, line: &str) -> String {
        format!("{} {}", self.prefix, line)
    }

    pub fn write_stdout(&self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", self.format_line(line))?;
        stdout.flush()
    }

    pub fn write_stderr(&self, line: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", self.format_line(line))?;
        stderr.flush()
    }
}

/// Read `reader` to the end and hand each line, without its terminator,
/// to `emit`. Invalid UTF-8 is replaced rather than treated as an error.
///
/// Returns the number of lines emitted.
pub async fn forward_lines<R, F>(reader: R, mut emit: F) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str) -> io::Result<()>,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        emit(line.trim_end_matches(['\n', '\r']))?;
        count += 1;
    }

    Ok(count)
}
