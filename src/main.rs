// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Kuriiri CLI - HTTP Request Runner
//!
//! Runs a request tab through the full pipeline, or a single script in the
//! sandbox.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use kuriiri::js::{serve_sandbox, SANDBOX_COMMAND};
use kuriiri::{
    Capabilities, ConsoleEntry, CorrelationId, Environment, EnvironmentSnapshot,
    EnvironmentStore, ExecutionContext, HttpTransport, MemoryEnvironmentStore, Orchestrator,
    RequestSnapshot, ResponseSnapshot, ScriptCall, ScriptHttp, ScriptOutcome, ScriptRuntime,
    ScriptStage, Settings, Tab, TabId, Transport, TransportRequest,
};

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kuriiri=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    // Sandbox processes block on stdin, so they stay outside the runtime
    if args.get(1).map(String::as_str) == Some(SANDBOX_COMMAND) {
        return match serve_sandbox() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Sandbox failed: {}", e);
                ExitCode::from(1)
            }
        };
    }

    cli(args)
}

#[tokio::main]
async fn cli(args: Vec<String>) -> ExitCode {
    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: kuriiri run <tab.json> [--settings <file>] [--env <file>]");
                return ExitCode::from(1);
            }
            let options = match Options::parse(&args[3..]) {
                Ok(o) => o,
                Err(e) => {
                    eprintln!("{:#}", e);
                    return ExitCode::from(1);
                }
            };
            run_tab(&args[2], options).await
        }
        "script" => {
            if args.len() < 3 {
                eprintln!("Usage: kuriiri script <file.js> [--settings <file>] [--env <file>]");
                return ExitCode::from(1);
            }
            let options = match Options::parse(&args[3..]) {
                Ok(o) => o,
                Err(e) => {
                    eprintln!("{:#}", e);
                    return ExitCode::from(1);
                }
            };
            run_script(&args[2], options).await
        }
        "--help" | "-h" | "help" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--version" | "-v" | "version" => {
            println!("kuriiri {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Kuriiri - HTTP Request Runner with Sandboxed Scripting

USAGE:
    kuriiri <COMMAND> [OPTIONS]

COMMANDS:
    run <tab.json>       Run a request tab through the full pipeline
    script <file.js>     Run a script in the sandbox against an empty request
    help                 Show this help message
    version              Show version information

OPTIONS:
    --settings <file>    Settings JSON (timeouts, default headers, cookies)
    --env <file>         Active environment JSON

ENVIRONMENT:
    RUST_LOG             Log filter, defaults to kuriiri=info

EXAMPLES:
    kuriiri run login.json --env dev.json
    kuriiri script seed.js --env dev.json
"#
    );
}

#[derive(Default)]
struct Options {
    settings: Settings,
    environment: Environment,
}

impl Options {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut options = Options::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let value = iter
                .next()
                .with_context(|| format!("Missing value for {}", flag))?;
            match flag.as_str() {
                "--settings" => options.settings = Settings::from_file(value)?,
                "--env" => options.environment = load_json(value)?,
                other => anyhow::bail!("Unknown option: {}", other),
            }
        }
        Ok(options)
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path))
}

fn print_entries(entries: &[ConsoleEntry]) {
    println!("\n=== Console ({} entries) ===", entries.len());
    for entry in entries {
        match serde_json::to_string(entry) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render entry: {}", e),
        }
    }
}

fn print_environment(variables: &EnvironmentSnapshot) {
    if variables.is_empty() {
        return;
    }
    println!("\n=== Environment ===");
    for variable in variables.variables() {
        println!("  {} = {}", variable.name, variable.value);
    }
}

async fn run_tab(path: &str, options: Options) -> ExitCode {
    let tab: Tab = match load_json(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to load tab: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let store = Arc::new(MemoryEnvironmentStore::new(options.environment));
    let orchestrator = match Orchestrator::from_settings(options.settings, store.clone()) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Failed to create runner: {}", e);
            return ExitCode::from(1);
        }
    };

    println!("Running: {} {}", tab.request.method, tab.request.url);
    let outcome = orchestrator.run(&tab).await;

    print_entries(&orchestrator.console_entries(&tab.id));
    print_environment(&store.active().variables);

    if let Some(ref response) = outcome.response {
        println!("\n=== Response [{}] ===", response.status);
        println!("{}", response.raw_body);
    }

    match outcome.error {
        None => ExitCode::SUCCESS,
        Some(e) => {
            eprintln!("\n[FAILED] {}", e);
            ExitCode::from(2)
        }
    }
}

/// Sends script calls straight through the transport
struct DirectHttp {
    transport: HttpTransport,
    tab: TabId,
}

#[async_trait]
impl ScriptHttp for DirectHttp {
    async fn request(&self, call: ScriptCall) -> kuriiri::Result<ResponseSnapshot> {
        let mut request = TransportRequest::new(&call.method, &call.url)?;
        request.headers = call.headers;
        if let Some(body) = call.body.filter(|_| request.allows_body()) {
            request = request.body(body);
        }
        let response = self
            .transport
            .send(&CorrelationId::new(&self.tab), request)
            .await?;
        Ok(response.to_snapshot())
    }
}

async fn run_script(path: &str, options: Options) -> ExitCode {
    let script = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            return ExitCode::from(1);
        }
    };

    let transport = match HttpTransport::with_config(options.settings.http_client()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to create transport: {}", e);
            return ExitCode::from(1);
        }
    };
    let http = DirectHttp {
        transport,
        tab: TabId::new("script"),
    };
    let console = Mutex::new(Vec::new());
    let runtime = ScriptRuntime::new(options.settings.script_runtime());
    let mut variables = options.environment.variables;

    let outcome = runtime
        .execute(
            ScriptStage::Standalone,
            &script,
            ExecutionContext::pre(RequestSnapshot {
                method: "GET".to_string(),
                ..Default::default()
            }),
            &mut variables,
            Capabilities {
                console: &console,
                http: &http,
            },
        )
        .await;

    print_entries(&console.into_inner());
    print_environment(&variables);

    match outcome {
        ScriptOutcome::Succeeded(_) => ExitCode::SUCCESS,
        ScriptOutcome::Failed(reason) => {
            eprintln!("\n[FAILED] {}", reason);
            ExitCode::from(2)
        }
        ScriptOutcome::TimedOut => {
            eprintln!("\n[TIMEOUT] script exceeded {:?}", runtime.config().timeout);
            ExitCode::from(2)
        }
    }
}
