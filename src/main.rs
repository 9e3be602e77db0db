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
use futures::future::join_all;
use std::io;
use std::sync::Arc;

use hostrun::{
    cli::Cli,
    config::Config,
    executor::{
        forward_lines, should_use_colors, ExecutionMode, HostOutputWriter, HostStreams,
        ParallelExecutor,
    },
    ui::{format_summary, ReportFormatter},
    utils::init_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load_with_priority(cli.config.as_deref()).await?;
    let overrides = cli.overrides()?;
    let settings = config.executor_settings(&overrides);

    let colored = should_use_colors();
    let formatter = ReportFormatter::new(settings.compress)
        .with_headers(!cli.no_header)
        .with_hosts(!cli.no_host)
        .with_colors(colored);

    let command = cli.get_command();
    let mode = cli.mode();
    tracing::info!("Running '{}' on {} hosts", command, cli.hosts.len());

    let executor = Arc::new(ParallelExecutor::with_russh(
        cli.hosts.clone(),
        &command,
        mode,
        settings,
    ));

    match mode {
        ExecutionMode::Capture => executor.start().await?,
        ExecutionMode::Stream => run_stream(Arc::clone(&executor)).await?,
    }

    let report = executor.report().await;
    formatter
        .render(&report, &mut io::stderr().lock(), &mut io::stdout().lock())
        .context("Failed to write report")?;

    let summary = executor.summary().await;
    if cli.verbose > 0 {
        eprintln!("{}", format_summary(&summary, colored));
    }

    if !summary.all_succeeded() {
        std::process::exit(summary.exit_code());
    }

    Ok(())
}

/// Run in stream mode: print `[host] line` as output arrives and terminate
/// the remote commands on Ctrl-C.
async fn run_stream(executor: Arc<ParallelExecutor>) -> Result<()> {
    let mut runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.start().await })
    };

    executor.wait_ready().await;

    let mut forwarders = Vec::new();
    for (host, streams) in executor.take_streams().await {
        let HostStreams { stdout, stderr } = streams;
        let writer = HostOutputWriter::new(&host);
        let stdout_writer = writer.clone();

        forwarders.push(tokio::spawn(async move {
            forward_lines(stdout, |line| stdout_writer.write_stdout(line)).await
        }));
        forwarders.push(tokio::spawn(async move {
            forward_lines(stderr, |line| writer.write_stderr(line)).await
        }));
    }

    let result = tokio::select! {
        result = &mut runner => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, terminating remote commands");
            executor.close_sessions().await;
            runner.await
        }
    };
    result.context("Executor task failed")??;

    for forwarded in join_all(forwarders).await {
        match forwarded {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!("Stopped forwarding output: {}", e),
            Err(e) => tracing::debug!("Output forwarder failed: {}", e),
        }
    }

    Ok(())
}
