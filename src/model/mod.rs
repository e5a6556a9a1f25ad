// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-memory entities the request pipeline works on
//!
//! Request definitions and collections are authored by the user; the
//! execution context is what scripts observe and mutate.

mod collection;
mod context;
mod environment;
mod headers;
mod request;

pub use collection::{CaptureRule, CaptureSource, Collection, PreRequest};
pub use context::{ExecutionContext, RequestSnapshot, ResponseSnapshot, ScriptBody};
pub use environment::{
    Environment, EnvironmentSnapshot, EnvironmentStore, MemoryEnvironmentStore, Variable,
};
pub use headers::{HeaderEntry, HeaderList};
pub use request::{Auth, KeyValue, RequestBody, RequestDefinition, Tab, TabId};
