// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Host side of the script sandbox

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::message::{HostMessage, SandboxMessage};
use super::process;
use super::sandbox::{SandboxJob, SandboxLimits};
use crate::console::{ConsoleEntry, ConsoleSink};
use crate::error::{Error, Result, ScriptStage};
use crate::model::{
    EnvironmentSnapshot, ExecutionContext, HeaderList, RequestSnapshot, ResponseSnapshot,
};

/// Script runtime configuration
#[derive(Debug, Clone)]
pub struct ScriptRuntimeConfig {
    /// Wall-clock budget for one script, awaited `http.*` calls included
    pub timeout: Duration,
    /// Iterations any single loop may run before the script is stopped
    pub loop_iteration_limit: u64,
    /// Maximum call depth
    pub recursion_limit: usize,
    /// Where scripts are interpreted
    pub host: SandboxHost,
}

impl Default for ScriptRuntimeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(60_000),
            loop_iteration_limit: 50_000_000,
            recursion_limit: 512,
            host: SandboxHost::default(),
        }
    }
}

/// Where a sandbox runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxHost {
    /// A child process running `<program> sandbox`, killed on teardown.
    /// `program` must be a kuriiri binary.
    Process { program: PathBuf },
    /// A thread of the test binary
    #[cfg(test)]
    Thread,
}

impl SandboxHost {
    /// Re-execute the running binary
    pub fn current_exe() -> Self {
        SandboxHost::Process {
            program: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("kuriiri")),
        }
    }
}

impl Default for SandboxHost {
    fn default() -> Self {
        #[cfg(test)]
        return SandboxHost::Thread;
        #[cfg(not(test))]
        SandboxHost::current_exe()
    }
}

/// An `http.*` call issued by a script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    pub method: String,
    pub url: String,
    pub headers: HeaderList,
    pub body: Option<String>,
}

/// Performs the network calls scripts ask for
#[async_trait]
pub trait ScriptHttp: Send + Sync {
    async fn request(&self, call: ScriptCall) -> Result<ResponseSnapshot>;
}

/// What a script is allowed to reach on the host
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub console: &'a dyn ConsoleSink,
    pub http: &'a dyn ScriptHttp,
}

/// How a script execution ended
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// Finished normally; carries the context with the script's changes
    Succeeded(ExecutionContext),
    /// Threw, or could not be started
    Failed(String),
    /// Ran past the wall-clock budget
    TimedOut,
}

impl ScriptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScriptOutcome::Succeeded(_))
    }

    /// Convert to the pipeline error taxonomy
    pub fn into_result(self, stage: ScriptStage, timeout: Duration) -> Result<ExecutionContext> {
        match self {
            ScriptOutcome::Succeeded(context) => Ok(context),
            ScriptOutcome::Failed(reason) => Err(Error::script_failure(stage, reason)),
            ScriptOutcome::TimedOut => {
                Err(Error::script_timeout(stage, timeout.as_millis() as u64))
            }
        }
    }
}

/// Releases the sandbox however the execution ends
struct SandboxGuard {
    abort: Arc<AtomicBool>,
    inbox: mpsc::UnboundedSender<HostMessage>,
    process: Option<Child>,
}

impl SandboxGuard {
    fn reply(&self, message: HostMessage) {
        // The sandbox may already be gone
        let _ = self.inbox.send(message);
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::SeqCst);
        if let Some(mut child) = self.process.take() {
            // A finished child has already exited
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "Sandbox process already gone");
            }
        }
    }
}

enum Finish {
    Complete {
        request: RequestSnapshot,
        response: Option<ResponseSnapshot>,
    },
    Error(String),
    TimedOut,
}

/// Runs user scripts in isolated sandboxes
#[derive(Debug, Clone, Default)]
pub struct ScriptRuntime {
    config: ScriptRuntimeConfig,
}

impl ScriptRuntime {
    pub fn new(config: ScriptRuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScriptRuntimeConfig {
        &self.config
    }

    /// Execute `script` against `context`.
    ///
    /// Environment changes are applied to `environment` as the script makes
    /// them, so they survive a later throw or timeout. The returned context
    /// only carries a response if `context` had one.
    pub async fn execute(
        &self,
        stage: ScriptStage,
        script: &str,
        context: ExecutionContext,
        environment: &mut EnvironmentSnapshot,
        capabilities: Capabilities<'_>,
    ) -> ScriptOutcome {
        let started = Instant::now();
        let outcome = self
            .drive(stage, script, &context, environment, capabilities)
            .await;

        let outcome = match outcome {
            Ok(Finish::Complete { request, response }) => {
                let had_response = context.response.is_some();
                ScriptOutcome::Succeeded(ExecutionContext {
                    request,
                    response: if had_response {
                        response.or(context.response)
                    } else {
                        None
                    },
                })
            }
            Ok(Finish::Error(reason)) | Err(reason) => ScriptOutcome::Failed(reason),
            Ok(Finish::TimedOut) => ScriptOutcome::TimedOut,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            ScriptOutcome::Succeeded(_) => {
                debug!(%stage, elapsed_ms, "Script completed");
            }
            ScriptOutcome::Failed(reason) => {
                info!(%stage, elapsed_ms, %reason, "Script failed");
                capabilities.console.append(ConsoleEntry::error(
                    Error::script_failure(stage, reason.clone()).to_string(),
                    Some(stage),
                ));
            }
            ScriptOutcome::TimedOut => {
                let err = Error::script_timeout(stage, self.config.timeout.as_millis() as u64);
                warn!(%stage, elapsed_ms, "Script timed out");
                capabilities
                    .console
                    .append(ConsoleEntry::error(err.to_string(), Some(stage)));
            }
        }
        outcome
    }

    async fn drive(
        &self,
        stage: ScriptStage,
        script: &str,
        context: &ExecutionContext,
        environment: &mut EnvironmentSnapshot,
        capabilities: Capabilities<'_>,
    ) -> std::result::Result<Finish, String> {
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let job = SandboxJob {
            script: script.to_string(),
            context_json: serde_json::to_string(context).map_err(|e| e.to_string())?,
            environment_json: serde_json::to_string(&*environment).map_err(|e| e.to_string())?,
            limits: SandboxLimits {
                loop_iteration_limit: self.config.loop_iteration_limit,
                recursion_limit: self.config.recursion_limit,
            },
        };

        let (outbox_tx, mut outbox) = mpsc::unbounded_channel();
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let abort = Arc::new(AtomicBool::new(false));

        let process = match &self.config.host {
            SandboxHost::Process { program } => {
                process::spawn(program, &job, outbox_tx, inbox_rx).map(Some)
            }
            #[cfg(test)]
            SandboxHost::Thread => {
                super::sandbox::spawn_thread(job, outbox_tx, inbox_rx, abort.clone()).map(|_| None)
            }
        };
        let process = process.map_err(|e| Error::sandbox(e.to_string()).to_string())?;
        let guard = SandboxGuard {
            abort,
            inbox,
            process,
        };
        debug!(%stage, "Script sandbox started");

        let http = capabilities.http;
        let mut calls: FuturesUnordered<BoxFuture<'_, (String, Result<ResponseSnapshot>)>> =
            FuturesUnordered::new();

        let finish = loop {
            tokio::select! {
                biased;

                _ = tokio::time::sleep_until(deadline) => break Finish::TimedOut,

                message = outbox.recv() => match message {
                    Some(SandboxMessage::Log { level, text }) => {
                        capabilities
                            .console
                            .append(ConsoleEntry::script(level, text, Some(stage)));
                    }
                    Some(SandboxMessage::EnvSet { name, value }) => environment.set(name, value),
                    Some(SandboxMessage::EnvUnset { name }) => {
                        environment.unset(&name);
                    }
                    Some(SandboxMessage::HttpRequest { id, method, url, body, headers }) => {
                        debug!(%stage, call = %id, %method, %url, "Script issued request");
                        let call = ScriptCall { method, url, headers, body };
                        calls.push(Box::pin(async move { (id, http.request(call).await) }));
                    }
                    Some(SandboxMessage::ExecutionComplete { request, response }) => {
                        break Finish::Complete { request, response };
                    }
                    Some(SandboxMessage::ExecutionError { error }) => break Finish::Error(error),
                    None => break Finish::Error("script sandbox exited without a result".to_string()),
                },

                Some((id, result)) = calls.next(), if !calls.is_empty() => {
                    let reply = match result {
                        Ok(response) => HostMessage::HttpResponse { id, response },
                        Err(e) => HostMessage::HttpFailure { id, error: e.to_string() },
                    };
                    guard.reply(reply);
                }
            }
        };

        // Outstanding script calls are dropped with `calls`, the sandbox
        // with `guard`
        drop(calls);
        drop(guard);
        debug!(%stage, "Script sandbox torn down");
        Ok(finish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptLevel;
    use parking_lot::Mutex;

    /// Answers every call with a JSON echo of what was asked
    #[derive(Default)]
    struct EchoHttp {
        calls: Mutex<Vec<ScriptCall>>,
    }

    #[async_trait]
    impl ScriptHttp for EchoHttp {
        async fn request(&self, call: ScriptCall) -> Result<ResponseSnapshot> {
            let body = serde_json::json!({ "method": call.method, "url": call.url });
            self.calls.lock().push(call);
            Ok(ResponseSnapshot::new(200, vec![], body.to_string()))
        }
    }

    struct FailingHttp;

    #[async_trait]
    impl ScriptHttp for FailingHttp {
        async fn request(&self, call: ScriptCall) -> Result<ResponseSnapshot> {
            Err(Error::transport(call.url, "connection refused"))
        }
    }

    struct NeverHttp;

    #[async_trait]
    impl ScriptHttp for NeverHttp {
        async fn request(&self, _call: ScriptCall) -> Result<ResponseSnapshot> {
            futures::future::pending().await
        }
    }

    fn request() -> RequestSnapshot {
        RequestSnapshot {
            method: "GET".into(),
            url: "https://example.com/users".into(),
            ..Default::default()
        }
    }

    async fn run_with(
        runtime: &ScriptRuntime,
        script: &str,
        context: ExecutionContext,
        environment: &mut EnvironmentSnapshot,
        http: &dyn ScriptHttp,
    ) -> (ScriptOutcome, Vec<ConsoleEntry>) {
        let console = Mutex::new(Vec::new());
        let outcome = runtime
            .execute(
                ScriptStage::Standalone,
                script,
                context,
                environment,
                Capabilities {
                    console: &console,
                    http,
                },
            )
            .await;
        (outcome, console.into_inner())
    }

    async fn run(script: &str, environment: &mut EnvironmentSnapshot) -> (ScriptOutcome, Vec<ConsoleEntry>) {
        run_with(
            &ScriptRuntime::default(),
            script,
            ExecutionContext::pre(request()),
            environment,
            &EchoHttp::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_environment_capability() {
        let mut env: EnvironmentSnapshot = vec![("seed", "x"), ("gone", "y")].into_iter().collect();
        let (outcome, _) = run(
            r#"
            environment.set("a", "1");
            environment.set("b", environment.get("seed") + "!");
            environment.unset("gone");
            environment.set("n", 42);
            "#,
            &mut env,
        )
        .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(env.get("a"), Some("1"));
        assert_eq!(env.get("b"), Some("x!"));
        assert_eq!(env.get("n"), Some("42"));
        assert_eq!(env.get("gone"), None);
    }

    #[tokio::test]
    async fn test_partial_effects_survive_throw() {
        let mut env = EnvironmentSnapshot::new();
        let (outcome, console) = run(
            r#"environment.set("x", "1"); throw new Error("boom");"#,
            &mut env,
        )
        .await;

        match outcome {
            ScriptOutcome::Failed(reason) => assert!(reason.contains("boom"), "{}", reason),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(env.get("x"), Some("1"));
        assert!(console.last().unwrap().is_error());
    }

    #[tokio::test]
    async fn test_request_mutation_returned() {
        let mut env = EnvironmentSnapshot::new();
        let (outcome, _) = run(
            r#"
            request.headers["X-Trace"] = "abc";
            request.url = request.url + "/42";
            response = { status: 500 };
            "#,
            &mut env,
        )
        .await;

        let ScriptOutcome::Succeeded(context) = outcome else {
            panic!("expected success");
        };
        assert_eq!(context.request.headers.get("x-trace"), Some("abc"));
        assert_eq!(context.request.url, "https://example.com/users/42");
        assert!(context.response.is_none());
    }

    #[tokio::test]
    async fn test_post_script_sees_response() {
        let mut env = EnvironmentSnapshot::new();
        let context = ExecutionContext::post(
            request(),
            ResponseSnapshot::new(200, vec![], r#"{"token":"t-1"}"#),
        );
        let (outcome, _) = run_with(
            &ScriptRuntime::default(),
            r#"
            environment.set("token", response.body.token);
            response.body.seen = true;
            "#,
            context,
            &mut env,
            &EchoHttp::default(),
        )
        .await;

        let ScriptOutcome::Succeeded(context) = outcome else {
            panic!("expected success");
        };
        assert_eq!(env.get("token"), Some("t-1"));
        assert_eq!(context.response.unwrap().body["seen"], true);
    }

    #[tokio::test]
    async fn test_console_stringify() {
        let mut env = EnvironmentSnapshot::new();
        let (outcome, console) = run(
            r#"
            console.log("a", 1, { b: 2 }, undefined);
            const c = {};
            c.self = c;
            console.error(c);
            console.warn("careful");
            "#,
            &mut env,
        )
        .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        let lines: Vec<_> = console
            .iter()
            .map(|e| match e {
                ConsoleEntry::ScriptMessage { level, text, .. } => (*level, text.clone()),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                (ScriptLevel::Log, r#"a 1 {"b":2} undefined"#.to_string()),
                (ScriptLevel::Error, "[object]".to_string()),
                (ScriptLevel::Error, "careful".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_http_capability() {
        let mut env = EnvironmentSnapshot::new();
        let http = EchoHttp::default();
        let (outcome, _) = run_with(
            &ScriptRuntime::default(),
            r#"
            const r = await http.post("https://example.com/login", { a: 1 }, { "X-A": 1 });
            environment.set("status", r.status);
            environment.set("method", r.body.method);
            "#,
            ExecutionContext::pre(request()),
            &mut env,
            &http,
        )
        .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(env.get("status"), Some("200"));
        assert_eq!(env.get("method"), Some("POST"));

        let calls = http.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://example.com/login");
        assert_eq!(calls[0].body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(calls[0].headers.get("x-a"), Some("1"));
    }

    #[tokio::test]
    async fn test_http_failure_rejects() {
        let mut env = EnvironmentSnapshot::new();
        let (outcome, _) = run_with(
            &ScriptRuntime::default(),
            r#"
            try {
                await http.get("https://down.example.com");
            } catch (e) {
                environment.set("error", e.message);
            }
            "#,
            ExecutionContext::pre(request()),
            &mut env,
            &FailingHttp,
        )
        .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        assert!(env.get("error").unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_timeout_covers_awaited_calls() {
        let runtime = ScriptRuntime::new(ScriptRuntimeConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        });
        let mut env = EnvironmentSnapshot::new();
        let (outcome, console) = run_with(
            &runtime,
            r#"
            environment.set("early", "1");
            await http.get("https://slow.example.com");
            environment.set("late", "1");
            "#,
            ExecutionContext::pre(request()),
            &mut env,
            &NeverHttp,
        )
        .await;

        assert_eq!(outcome, ScriptOutcome::TimedOut);
        assert_eq!(env.get("early"), Some("1"));
        assert_eq!(env.get("late"), None);
        let last = console.last().unwrap();
        assert!(last.text().unwrap().contains("exceeded time budget of 200ms"));

        let err = outcome
            .into_result(ScriptStage::RequestPre, runtime.config().timeout)
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_syntax_error_fails() {
        let mut env = EnvironmentSnapshot::new();
        let (outcome, _) = run("this is not javascript", &mut env).await;
        assert!(matches!(outcome, ScriptOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_no_ambient_host_access() {
        let mut env = EnvironmentSnapshot::new();
        let (outcome, _) = run(
            r#"environment.set("t", [typeof require, typeof process, typeof fetch].join(","));"#,
            &mut env,
        )
        .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(env.get("t"), Some("undefined,undefined,undefined"));
    }

    #[tokio::test]
    async fn test_busy_loop_is_stopped() {
        let runtime = ScriptRuntime::new(ScriptRuntimeConfig {
            timeout: Duration::from_secs(5),
            loop_iteration_limit: 10_000,
            ..Default::default()
        });
        let mut env = EnvironmentSnapshot::new();
        let (outcome, _) = run_with(
            &runtime,
            "while (true) {}",
            ExecutionContext::pre(request()),
            &mut env,
            &EchoHttp::default(),
        )
        .await;

        assert!(!outcome.is_success());
    }
}
