// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Script sandbox using boa_engine
//!
//! Scripts run in a sandbox process with a fresh interpreter and talk to the
//! host only through JSON messages: console output, environment changes and
//! HTTP calls go out, HTTP results come back.

mod message;
mod process;
mod runtime;
mod sandbox;

pub use message::{HostMessage, SandboxMessage};
pub use process::{serve as serve_sandbox, SANDBOX_COMMAND};
pub use runtime::{
    Capabilities, SandboxHost, ScriptCall, ScriptHttp, ScriptOutcome, ScriptRuntime,
    ScriptRuntimeConfig,
};
