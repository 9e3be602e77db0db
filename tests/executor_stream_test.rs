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

//! Stream-mode behaviour: live readers, readiness and termination.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use common::{hosts, test_settings, MockTransport, Script};
use hostrun::executor::{ExecutionMode, ParallelExecutor};
use hostrun::ssh::Signal;

fn stream(host_list: &[&str], transport: &MockTransport) -> Arc<ParallelExecutor> {
    Arc::new(ParallelExecutor::new(
        hosts(host_list),
        "tail -f /var/log/app.log",
        ExecutionMode::Stream,
        test_settings(),
        Arc::new(transport.clone()),
    ))
}

#[tokio::test]
async fn test_readers_deliver_output() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::stream("line one\nline two\n", "warn\n", 0))
        .with_script("h2:22", Script::stream("other\n", "", 0));
    let executor = stream(&["h1", "h2"], &transport);

    executor.start().await.unwrap();

    let mut streams = executor.take_streams().await;
    assert_eq!(streams.len(), 2);

    let h1 = streams.get_mut("h1").unwrap();
    let mut stdout = String::new();
    h1.stdout.read_to_string(&mut stdout).await.unwrap();
    let mut stderr = String::new();
    h1.stderr.read_to_string(&mut stderr).await.unwrap();
    assert_eq!(stdout, "line one\nline two\n");
    assert_eq!(stderr, "warn\n");

    let h2 = streams.get_mut("h2").unwrap();
    let mut stdout = String::new();
    h2.stdout.read_to_string(&mut stdout).await.unwrap();
    assert_eq!(stdout, "other\n");

    assert!(executor.errors().await.is_empty());
    assert!(executor.outputs().await.is_empty());
    assert_eq!(executor.live_hosts().await, ["h1", "h2"]);
}

#[tokio::test]
async fn test_streams_can_be_taken_once() {
    let transport = MockTransport::new().with_script("h1:22", Script::stream("x\n", "", 0));
    let executor = stream(&["h1"], &transport);

    executor.start().await.unwrap();

    assert_eq!(executor.take_streams().await.len(), 1);
    assert!(executor.take_streams().await.is_empty());
}

#[tokio::test]
async fn test_ready_fires_before_remote_exit() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::held_stream("started\n"))
        .with_script("h2:22", Script::held_stream("started\n"));
    let executor = stream(&["h1", "h2"], &transport);

    let runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.start().await })
    };

    tokio::time::timeout(Duration::from_secs(5), executor.wait_ready())
        .await
        .expect("readiness should fire while commands are still running");
    assert!(!runner.is_finished());

    let mut streams = executor.take_streams().await;
    let mut buf = [0u8; 8];
    let n = streams
        .get_mut("h1")
        .unwrap()
        .stdout
        .read(&mut buf)
        .await
        .unwrap();
    assert_eq!(&buf[..n], b"started\n");

    executor.close_sessions().await;
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("start should return once sessions are closed")
        .unwrap()
        .unwrap();

    let errors = executor.errors().await;
    assert!(errors["h1"].contains("signal TERM"));
    assert!(errors["h2"].contains("signal TERM"));
}

#[tokio::test]
async fn test_close_sessions_signals_every_live_session() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::held_stream(""))
        .with_script("h2:22", Script::held_stream(""))
        .with_script("h3:22", Script::DialError("unreachable".to_string()));
    let executor = stream(&["h1", "h2", "h3"], &transport);

    let runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.start().await })
    };
    executor.wait_ready().await;

    assert_eq!(executor.live_hosts().await, ["h1", "h2"]);
    executor.close_sessions().await;
    runner.await.unwrap().unwrap();

    let log = transport.log();
    let mut signaled: Vec<&str> = log
        .signals
        .iter()
        .map(|(address, signal)| {
            assert_eq!(*signal, Signal::Term);
            address.as_str()
        })
        .collect();
    signaled.sort();
    assert_eq!(signaled, ["h1:22", "h2:22"]);
    assert!(log.closed_sessions.iter().any(|a| a == "h1:22"));
    assert!(log.closed_sessions.iter().any(|a| a == "h2:22"));
    assert!(!log.closed_sessions.iter().any(|a| a == "h3:22"));
}

#[tokio::test]
async fn test_failures_stay_out_of_live_maps() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::DialError("unreachable".to_string()))
        .with_script("h2:22", Script::SessionError("refused".to_string()))
        .with_script("h3:22", Script::StartError("exec failed".to_string()))
        .with_script("h4:22", Script::stream("ok\n", "", 0));
    let executor = stream(&["h1", "h2", "h3", "h4"], &transport);

    executor.start().await.unwrap();

    let errors = executor.errors().await;
    assert_eq!(errors["h1"], "unreachable");
    assert_eq!(errors["h2"], "refused");
    assert_eq!(errors["h3"], "exec failed");
    assert!(!errors.contains_key("h4"));

    assert_eq!(executor.live_hosts().await, ["h4"]);
    let streams = executor.take_streams().await;
    assert_eq!(streams.len(), 1);
    assert!(streams.contains_key("h4"));
}

#[tokio::test]
async fn test_nonzero_exit_is_recorded() {
    let transport = MockTransport::new().with_script("h1:22", Script::stream("", "boom\n", 2));
    let executor = stream(&["h1"], &transport);

    executor.start().await.unwrap();

    assert_eq!(
        executor.errors().await["h1"],
        "Process exited with status 2"
    );
    assert_eq!(transport.log().closed_connections, ["h1:22"]);
}

#[tokio::test]
async fn test_close_sessions_in_capture_mode_is_noop() {
    let transport = MockTransport::new();
    let executor = ParallelExecutor::new(
        hosts(&["h1"]),
        "true",
        ExecutionMode::Capture,
        test_settings(),
        Arc::new(transport.clone()),
    );

    executor.start().await.unwrap();
    executor.close_sessions().await;

    assert!(transport.log().signals.is_empty());
    assert!(executor.live_hosts().await.is_empty());
}

#[tokio::test]
async fn test_ready_with_only_failed_hosts() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::DialError("unreachable".to_string()));
    let executor = stream(&["h1"], &transport);

    executor.start().await.unwrap();

    assert!(*executor.ready().borrow());
    executor.close_sessions().await;
    assert!(transport.log().signals.is_empty());
}
