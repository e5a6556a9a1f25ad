// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use kuriiri::{
    Capabilities, ConsoleEntry, EnvironmentSnapshot, Error, ExecutionContext, RequestSnapshot,
    ResponseSnapshot, SandboxHost, ScriptCall, ScriptHttp, ScriptOutcome, ScriptRuntime,
    ScriptRuntimeConfig, ScriptStage,
};

struct NoHttp;

#[async_trait]
impl ScriptHttp for NoHttp {
    async fn request(&self, call: ScriptCall) -> kuriiri::Result<ResponseSnapshot> {
        Err(Error::transport(call.url, "offline"))
    }
}

fn runtime(timeout: Duration) -> ScriptRuntime {
    ScriptRuntime::new(ScriptRuntimeConfig {
        timeout,
        host: SandboxHost::Process {
            program: PathBuf::from(env!("CARGO_BIN_EXE_kuriiri")),
        },
        ..Default::default()
    })
}

async fn execute(
    runtime: &ScriptRuntime,
    script: &str,
    environment: &mut EnvironmentSnapshot,
) -> (ScriptOutcome, Vec<ConsoleEntry>) {
    let console = Mutex::new(Vec::new());
    let outcome = runtime
        .execute(
            ScriptStage::Standalone,
            script,
            ExecutionContext::pre(RequestSnapshot {
                method: "GET".into(),
                url: "https://example.com/".into(),
                ..Default::default()
            }),
            environment,
            Capabilities {
                console: &console,
                http: &NoHttp,
            },
        )
        .await;
    (outcome, console.into_inner())
}

/// Live (non-zombie) children of this test process
#[cfg(target_os = "linux")]
fn live_children() -> Vec<u32> {
    let me = std::process::id();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return vec![];
    };
    entries
        .filter_map(|entry| {
            let pid: u32 = entry.ok()?.file_name().to_str()?.parse().ok()?;
            let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
            // pid (comm) state ppid ...
            let mut fields = stat[stat.rfind(')')? + 1..].split_whitespace();
            let state = fields.next()?;
            let ppid: u32 = fields.next()?.parse().ok()?;
            (ppid == me && state != "Z").then_some(pid)
        })
        .collect()
}

#[tokio::test]
async fn test_sandbox_process_runs_script() {
    let mut env: EnvironmentSnapshot = vec![("seed", "x")].into_iter().collect();
    let (outcome, console) = execute(
        &runtime(Duration::from_secs(10)),
        r#"
        console.log("hello", { n: 1 });
        environment.set("copy", environment.get("seed") + "!");
        try {
            await http.get("https://example.com/down");
        } catch (e) {
            environment.set("error", e.message);
        }
        request.url = request.url + "next";
        "#,
        &mut env,
    )
    .await;

    let ScriptOutcome::Succeeded(context) = outcome else {
        panic!("expected success, got {:?}", outcome);
    };
    assert_eq!(context.request.url, "https://example.com/next");
    assert_eq!(env.get("copy"), Some("x!"));
    assert!(env.get("error").unwrap().contains("offline"));
    assert_eq!(console[0].text(), Some(r#"hello {"n":1}"#));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_spinning_script_is_killed_on_timeout() {
    let runtime = runtime(Duration::from_millis(300));
    let mut env = EnvironmentSnapshot::new();
    let (outcome, console) = execute(
        &runtime,
        r#"
        environment.set("started", "1");
        for (;;) { for (let i = 0; i < 1000; i++) {} }
        "#,
        &mut env,
    )
    .await;

    assert_eq!(outcome, ScriptOutcome::TimedOut);
    assert_eq!(env.get("started"), Some("1"));
    assert!(console
        .last()
        .and_then(|e| e.text())
        .map_or(false, |t| t.contains("exceeded time budget")));

    let mut survivors = live_children();
    for _ in 0..50 {
        if survivors.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        survivors = live_children();
    }
    assert!(survivors.is_empty(), "sandbox processes still alive: {:?}", survivors);
}
