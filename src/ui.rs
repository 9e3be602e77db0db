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

//! Rendering of a finished run into an error stream and an output stream.

use owo_colors::OwoColorize;
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

use crate::codec;
use crate::executor::{ExecutionSummary, Report};

pub const ERROR_HEADER: &str =
    "================================= ERROR =================================";
pub const OUTPUT_HEADER: &str =
    "================================= OUTPUT =================================";

/// Display width of the right-aligned host label in the output section.
pub const HOST_LABEL_WIDTH: usize = 15;

/// Renders a [`Report`] as an error section and an output section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFormatter {
    compressed: bool,
    show_headers: bool,
    show_hosts: bool,
    colored: bool,
}

impl ReportFormatter {
    /// `compressed` must match the executor's setting: outputs are then
    /// gzip payloads and get decompressed before display.
    pub fn new(compressed: bool) -> Self {
        Self {
            compressed,
            show_headers: true,
            show_hosts: true,
            colored: false,
        }
    }

    pub fn with_headers(mut self, show: bool) -> Self {
        self.show_headers = show;
        self
    }

    pub fn with_hosts(mut self, show: bool) -> Self {
        self.show_hosts = show;
        self
    }

    pub fn with_colors(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Write the error section to `err` and the output section to `out`.
    ///
    /// Errors are only listed when host labels are shown, since an error
    /// without its host says nothing useful. An output that fails to
    /// decompress is logged and skipped; the remaining hosts still render.
    pub fn render<E: Write, O: Write>(
        &self,
        report: &Report,
        err: &mut E,
        out: &mut O,
    ) -> io::Result<()> {
        if !report.errors.is_empty() && self.show_hosts {
            if self.show_headers {
                writeln!(err, "{}", self.header(ERROR_HEADER, true))?;
            }
            for (host, error) in &report.errors {
                self.write_error(err, host, error)?;
            }
        }

        if !report.outputs.is_empty() {
            if self.show_headers {
                writeln!(out, "{}", self.header(OUTPUT_HEADER, false))?;
            }
            for (host, payload) in &report.outputs {
                let Some(text) = self.decode(host, payload) else {
                    continue;
                };
                self.write_output(out, host, &text)?;
            }
        }

        err.flush()?;
        out.flush()
    }

    fn decode(&self, host: &str, payload: &[u8]) -> Option<String> {
        if !self.compressed {
            return Some(String::from_utf8_lossy(payload).into_owned());
        }
        match codec::decompress(payload) {
            Ok(data) => Some(String::from_utf8_lossy(&data).into_owned()),
            Err(e) => {
                tracing::warn!("[{}] failed to decompress output: {}", host, e);
                None
            }
        }
    }

    fn write_error<W: Write>(&self, err: &mut W, host: &str, error: &str) -> io::Result<()> {
        let error = error.trim_end_matches('\n');
        let label = if self.colored {
            host.red().bold().to_string()
        } else {
            host.to_string()
        };

        if error.contains('\n') {
            writeln!(err, "{label} :")?;
            writeln!(err, "{error}")
        } else {
            writeln!(err, "{label} : {error}")
        }
    }

    fn write_output<W: Write>(&self, out: &mut W, host: &str, text: &str) -> io::Result<()> {
        let body = text.trim_end_matches('\n');

        if self.show_hosts {
            let padding = HOST_LABEL_WIDTH.saturating_sub(host.width());
            let label = if self.colored {
                host.cyan().bold().to_string()
            } else {
                host.to_string()
            };
            write!(out, "{}{}: ", " ".repeat(padding), label)?;
            if body.contains('\n') {
                writeln!(out)?;
            }
        }

        writeln!(out, "{body}")
    }

    fn header(&self, title: &str, is_error: bool) -> String {
        match (self.colored, is_error) {
            (false, _) => title.to_string(),
            (true, true) => title.red().to_string(),
            (true, false) => title.dimmed().to_string(),
        }
    }
}

/// One-line summary of how many hosts succeeded and failed.
pub fn format_summary(summary: &ExecutionSummary, colored: bool) -> String {
    let hosts = if summary.total == 1 { "host" } else { "hosts" };
    if !colored {
        return format!(
            "{} {}: {} succeeded, {} failed",
            summary.total, hosts, summary.succeeded, summary.failed
        );
    }

    format!(
        "{} {}: {} {}, {} {}",
        summary.total.to_string().bold(),
        hosts,
        summary.succeeded.to_string().green().bold(),
        "succeeded".green(),
        summary.failed.to_string().red().bold(),
        "failed".red()
    )
}
