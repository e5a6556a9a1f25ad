// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Console log stream
//!
//! Ordered, append-only record of HTTP calls and script output per tab.
//! Clearable as a whole; never edited in place.

mod entry;
mod log;

pub use entry::{CallOrigin, CallOutcome, ConsoleEntry, HttpCallRecord, ScriptLevel};
pub use log::{ConsoleLog, TabConsole};

use parking_lot::Mutex;

/// Append-only consumer of console entries
pub trait ConsoleSink: Send + Sync {
    fn append(&self, entry: ConsoleEntry);
}

/// Collects entries in memory, mostly for standalone script runs
impl ConsoleSink for Mutex<Vec<ConsoleEntry>> {
    fn append(&self, entry: ConsoleEntry) {
        self.lock().push(entry);
    }
}
