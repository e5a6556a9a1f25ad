// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request pipeline
//!
//! One run per tab: pre-scripts, pre-request, header composition, the main
//! call and post-scripts, with cancellation tracked per tab.

mod capture;
mod headers;
mod orchestrator;
mod registry;
mod settings;

pub use capture::{apply_captures, capture};
pub use headers::{compose, HeaderSources};
pub use orchestrator::{Orchestrator, RequestOutcome};
pub use registry::{RunHandle, RunRegistry, RunState, TrackedCall};
pub use settings::Settings;
