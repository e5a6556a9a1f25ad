// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Kuriiri - HTTP Request Runner with Sandboxed Scripting
//!
//! Runs user-defined HTTP requests through a pipeline of collection and
//! request scripts. Scripts execute in an isolated boa_engine interpreter and
//! reach the host only through three capabilities: `console`, `environment`
//! and `http`.
//!
//! ## Features
//!
//! - Sandboxed scripts: one fresh interpreter per script in its own process,
//!   message passing only
//! - Hard wall-clock budget per script, awaited HTTP calls included
//! - Collection pre-request with data capture into environment variables
//! - `{path}` and `{{variable}}` placeholder resolution at every stage
//! - Cookie jar fed from `Set-Cookie` headers
//! - Per-tab console stream of HTTP calls and script output
//! - Per-tab cancellation of the main call and script-issued calls
//!
//! Sandbox processes re-execute the `kuriiri` binary with its `sandbox`
//! command. Programs embedding the library point
//! [`Settings::sandbox_program`] at that binary, or dispatch the command to
//! [`js::serve_sandbox`] themselves.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kuriiri::{MemoryEnvironmentStore, Orchestrator, RequestDefinition, Settings, Tab};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let environments = Arc::new(MemoryEnvironmentStore::default());
//!     let orchestrator = Orchestrator::from_settings(Settings::default(), environments)?;
//!
//!     let request = RequestDefinition::new("GET", "https://example.com")
//!         .pre_script("environment.set('started', Date.now());");
//!     let outcome = orchestrator.run(&Tab::new("tab-1", request)).await;
//!
//!     println!("fetched: {}", outcome.fetched);
//!     for entry in orchestrator.console_entries(&"tab-1".into()) {
//!         println!("{:?}", entry);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod console;
pub mod error;
pub mod http;
pub mod js;
pub mod model;
pub mod runner;
pub mod variables;

// Re-exports for convenience

// Errors
pub use error::{Error, ErrorContext, Result, ScriptStage};

// Model
pub use model::{
    Auth, CaptureRule, CaptureSource, Collection, Environment, EnvironmentSnapshot,
    EnvironmentStore, ExecutionContext, HeaderEntry, HeaderList, KeyValue,
    MemoryEnvironmentStore, PreRequest, RequestBody, RequestDefinition, RequestSnapshot,
    ResponseSnapshot, ScriptBody, Tab, TabId, Variable,
};

// Variables
pub use variables::Resolver;

// HTTP
pub use http::{
    Cookie, CookieJar, CorrelationId, HttpClientConfig, HttpTransport, Transport,
    TransportRequest, TransportResponse,
};

// Scripts
pub use js::{
    Capabilities, SandboxHost, ScriptCall, ScriptHttp, ScriptOutcome, ScriptRuntime,
    ScriptRuntimeConfig,
};

// Console
pub use console::{
    CallOrigin, CallOutcome, ConsoleEntry, ConsoleLog, ConsoleSink, HttpCallRecord, ScriptLevel,
};

// Runner
pub use runner::{Orchestrator, RequestOutcome, RunState, Settings};

/// Kuriiri version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
