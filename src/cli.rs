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

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::Overrides;
use crate::executor::ExecutionMode;

#[derive(Parser, Debug)]
#[command(
    name = "hostrun",
    version,
    about = "Run one command on many hosts over SSH and report what happened",
    long_about = "hostrun executes a single command concurrently on every listed host.\nIn the default capture mode it waits for all hosts, then prints an error section\n(stderr) and an output section (stdout) with one entry per host.\nWith --stream, output lines are printed as they arrive, prefixed with the host.",
    after_help = "EXAMPLES:\n  Run on two hosts:            hostrun -H web1,web2 -- uptime\n  Custom port and user:        hostrun -H ops@db1:2222,db2 -- df -h\n  Live output:                 hostrun -H web1,web2 --stream -- tail -n 20 /var/log/syslog\n  Gzip large output in flight: hostrun -H web1,web2 -z -- journalctl -b\n  Only the output bodies:      hostrun -H web1 --no-header --no-host -- hostname\n\nExit codes: 0 (all hosts succeeded), 1 (any host failed)"
)]
pub struct Cli {
    #[arg(
        short = 'H',
        long,
        value_delimiter = ',',
        required = true,
        help = "Comma-separated list of hosts in [user@]hostname[:port] format\nExamples: 'host1,host2' or 'ops@host1:2222,[fe80::1]:22'"
    )]
    pub hosts: Vec<String>,

    #[arg(
        long,
        help = "Print output lines as they arrive instead of waiting for every host"
    )]
    pub stream: bool,

    #[arg(long, help = "Do not print the ERROR/OUTPUT section headers")]
    pub no_header: bool,

    #[arg(
        long,
        help = "Do not label output with host names (also hides the error section)"
    )]
    pub no_host: bool,

    #[arg(
        short = 'z',
        long,
        help = "Compress output with gzip on the remote side and decompress locally\nIgnored with --stream"
    )]
    pub compress: bool,

    #[arg(
        short = 'p',
        long,
        help = "Port for hosts that do not name one [default: 22 or config]"
    )]
    pub port: Option<u16>,

    #[arg(short = 'l', long, help = "Login user for hosts that do not name one")]
    pub user: Option<String>,

    #[arg(
        short = 'i',
        long,
        help = "SSH private key file path\nFalls back to default keys (~/.ssh/id_ed25519, ~/.ssh/id_rsa, ~/.ssh/id_ecdsa) if not specified"
    )]
    pub identity: Option<PathBuf>,

    #[arg(
        short = 'A',
        long,
        help = "Use SSH agent for authentication (Unix/Linux/macOS only)"
    )]
    pub use_agent: bool,

    #[arg(
        long,
        value_name = "VAR",
        help = "Read the SSH password from this environment variable"
    )]
    pub password_env: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Connection timeout in seconds [default: 10]")]
    pub connect_timeout: Option<u64>,

    #[arg(
        long,
        env = "HOSTRUN_CONFIG",
        help = "Configuration file path [default: ~/.config/hostrun/config.yaml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    #[arg(
        trailing_var_arg = true,
        required = true,
        help = "Command to execute on remote hosts"
    )]
    pub command_args: Vec<String>,
}

impl Cli {
    pub fn get_command(&self) -> String {
        self.command_args.join(" ")
    }

    pub fn mode(&self) -> ExecutionMode {
        ExecutionMode::from_args(self.stream)
    }

    /// Command-line values that take precedence over the config file.
    pub fn overrides(&self) -> Result<Overrides> {
        let password = match self.password_env {
            Some(ref var) => Some(
                std::env::var(var)
                    .with_context(|| format!("Password variable {var} is not set"))?,
            ),
            None => None,
        };

        Ok(Overrides {
            port: self.port,
            user: self.user.clone(),
            key_file: self.identity.clone(),
            password,
            use_agent: self.use_agent,
            compress: self.compress,
            connect_timeout: self.connect_timeout,
            stream: self.stream,
        })
    }
}
