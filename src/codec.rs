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

//! Transparent gzip handling for remote output.
//!
//! Compression happens on the remote side by piping the command through
//! gzip; the local side only ever decompresses.

use flate2::read::GzDecoder;
use std::io::{self, Read};

/// Suffix appended to a command when compression is enabled.
pub const COMPRESS_SUFFIX: &str = " | /usr/bin/gzip -f";

/// Rewrite `command` so its standard output is gzip-compressed remotely.
pub fn compress_command(command: &str) -> String {
    format!("{command}{COMPRESS_SUFFIX}")
}

/// Decompress a gzip payload captured from a host.
pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded)?;
    Ok(decoded)
}
