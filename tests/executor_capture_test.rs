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

//! Capture-mode behaviour of the parallel executor against a scripted
//! transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{hosts, test_settings, MockTransport, Script};
use hostrun::executor::{ExecutionMode, ParallelExecutor};
use hostrun::ssh::AuthContext;

fn capture(host_list: &[&str], command: &str, transport: &MockTransport) -> ParallelExecutor {
    ParallelExecutor::new(
        hosts(host_list),
        command,
        ExecutionMode::Capture,
        test_settings(),
        Arc::new(transport.clone()),
    )
}

#[tokio::test]
async fn test_empty_host_list() {
    let transport = MockTransport::new();
    let executor = capture(&[], "uptime", &transport);

    executor.start().await.unwrap();

    assert!(executor.outputs().await.is_empty());
    assert!(executor.errors().await.is_empty());
    assert!(transport.log().dials.is_empty());
}

#[tokio::test]
async fn test_every_host_gets_an_output() {
    let transport = MockTransport::new();
    let names: Vec<String> = (0..16).map(|i| format!("node{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let executor = capture(&refs, "hostname", &transport);

    executor.start().await.unwrap();

    let outputs = executor.outputs().await;
    assert_eq!(outputs.len(), 16);
    for name in &names {
        assert_eq!(outputs[name], format!("{name}:22\n").into_bytes());
    }
    assert!(executor.errors().await.is_empty());
    assert_eq!(transport.log().closed_connections.len(), 16);
}

#[tokio::test]
async fn test_dial_failure_is_keyed_by_original_host() {
    let transport = MockTransport::new()
        .with_script("db1:22", Script::DialError("connection refused".to_string()));
    let executor = capture(&["db1", "web1:2222"], "uptime", &transport);

    executor.start().await.unwrap();

    let errors = executor.errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors["db1"], "connection refused");
    assert!(!errors.contains_key("db1:22"));

    let outputs = executor.outputs().await;
    assert_eq!(outputs["web1:2222"], b"web1:2222\n");
    assert!(!outputs.contains_key("db1"));

    let dialed: Vec<String> = transport
        .log()
        .dials
        .iter()
        .map(|(address, _)| address.clone())
        .collect();
    assert!(dialed.contains(&"db1:22".to_string()));
    assert!(dialed.contains(&"web1:2222".to_string()));
}

#[tokio::test]
async fn test_session_failure_still_closes_connection() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::SessionError("channel open failed".to_string()));
    let executor = capture(&["h1"], "uptime", &transport);

    executor.start().await.unwrap();

    assert_eq!(executor.errors().await["h1"], "channel open failed");
    assert!(executor.outputs().await.is_empty());
    assert_eq!(transport.log().closed_connections, ["h1:22"]);
}

#[tokio::test]
async fn test_nonzero_exit_records_error_and_output() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::failed("partial\n", "disk full\n", 3))
        .with_script("h2:22", Script::failed("", "", 1));
    let executor = capture(&["h1", "h2"], "backup", &transport);

    executor.start().await.unwrap();

    let errors = executor.errors().await;
    assert_eq!(errors["h1"], "disk full\nProcess exited with status 3");
    assert_eq!(errors["h2"], "Process exited with status 1");

    let outputs = executor.outputs().await;
    assert_eq!(outputs["h1"], b"partial\n");
    assert!(!outputs.contains_key("h2"));
}

#[tokio::test]
async fn test_execution_error_lands_in_errors() {
    let transport = MockTransport::new()
        .with_script("h1:22", Script::OutputError("channel closed".to_string()));
    let executor = capture(&["h1", "h2"], "uptime", &transport);

    executor.start().await.unwrap();

    assert_eq!(executor.errors().await["h1"], "channel closed");
    assert!(executor.outputs().await.contains_key("h2"));

    let summary = executor.summary().await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn test_each_host_in_exactly_one_map_on_success_or_connect_failure() {
    let transport = MockTransport::new()
        .with_script("a:22", Script::DialError("no route".to_string()))
        .with_script("b:22", Script::SessionError("refused".to_string()))
        .with_script("c:22", Script::ok("fine\n"));
    let executor = capture(&["a", "b", "c", "d"], "true", &transport);

    executor.start().await.unwrap();

    let outputs = executor.outputs().await;
    let errors = executor.errors().await;
    for host in ["a", "b", "c", "d"] {
        assert!(
            outputs.contains_key(host) ^ errors.contains_key(host),
            "{host} must be in exactly one map"
        );
    }
}

#[tokio::test]
async fn test_compression_rewrites_command_once() {
    let transport = MockTransport::new();
    let executor = ParallelExecutor::new(
        hosts(&["h1", "h2"]),
        "cat /var/log/syslog",
        ExecutionMode::Capture,
        test_settings().with_compress(true),
        Arc::new(transport.clone()),
    );

    executor.start().await.unwrap();

    let log = transport.log();
    assert_eq!(log.commands.len(), 2);
    for (_, command) in &log.commands {
        assert_eq!(command, "cat /var/log/syslog | /usr/bin/gzip -f");
    }
}

#[tokio::test]
async fn test_default_port_and_user_override() {
    let transport = MockTransport::new();
    let executor = ParallelExecutor::new(
        hosts(&["ops@h1", "h2:2022"]),
        "id",
        ExecutionMode::Capture,
        test_settings().with_default_port(2200),
        Arc::new(transport.clone()),
    );

    executor.start().await.unwrap();

    let mut dials = transport.log().dials.clone();
    dials.sort();
    assert_eq!(
        dials,
        [
            ("h1:2200".to_string(), "ops".to_string()),
            ("h2:2022".to_string(), "tester".to_string()),
        ]
    );
    assert!(executor.outputs().await.contains_key("ops@h1"));
}

#[tokio::test]
async fn test_invalid_host_is_a_host_error() {
    let transport = MockTransport::new();
    let executor = capture(&["h1:notaport", "h2"], "true", &transport);

    executor.start().await.unwrap();

    assert!(executor.errors().await["h1:notaport"].contains("Invalid port"));
    assert!(executor.outputs().await.contains_key("h2"));
    assert_eq!(transport.log().dials.len(), 1);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let transport = MockTransport::new();
    let executor = capture(&["h1"], "true", &transport);

    executor.start().await.unwrap();
    assert!(executor.start().await.is_err());
    assert_eq!(transport.log().dials.len(), 1);
}

#[tokio::test]
async fn test_auth_failure_attempts_no_host() {
    let transport = MockTransport::new();
    let auth = AuthContext::new().with_key_path(Some("/nonexistent/hostrun/id_ed25519".into()));
    let executor = ParallelExecutor::new(
        hosts(&["h1", "h2"]),
        "true",
        ExecutionMode::Capture,
        test_settings().with_auth(auth),
        Arc::new(transport.clone()),
    );

    let err = executor.start().await.unwrap_err();
    assert!(format!("{err:#}").contains("authentication"));
    assert!(transport.log().dials.is_empty());
    assert!(executor.errors().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hosts_run_concurrently() {
    let transport = MockTransport::new().with_dial_delay(Duration::from_secs(5));
    let executor = capture(&["h1", "h2", "h3", "h4"], "true", &transport);

    let started = tokio::time::Instant::now();
    executor.start().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(executor.outputs().await.len(), 4);
}

#[tokio::test]
async fn test_report_follows_host_order() {
    let transport = MockTransport::new()
        .with_script("b:22", Script::DialError("down".to_string()))
        .with_script("d:22", Script::DialError("down".to_string()));
    let executor = capture(&["d", "c", "b", "a"], "true", &transport);

    executor.start().await.unwrap();
    let report = executor.report().await;

    let error_hosts: Vec<&str> = report.errors.iter().map(|(h, _)| h.as_str()).collect();
    let output_hosts: Vec<&str> = report.outputs.iter().map(|(h, _)| h.as_str()).collect();
    assert_eq!(error_hosts, ["d", "b"]);
    assert_eq!(output_hosts, ["c", "a"]);
}
