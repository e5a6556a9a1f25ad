// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-tab run tracking and cancellation

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::http::{CorrelationId, Transport};
use crate::model::TabId;

/// Lifecycle of a tab's run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

/// One run of one tab
#[derive(Debug)]
pub struct RunHandle {
    cancel: watch::Sender<bool>,
    calls: Mutex<HashSet<CorrelationId>>,
    state: Mutex<RunState>,
}

impl RunHandle {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel,
            calls: Mutex::new(HashSet::new()),
            state: Mutex::new(RunState::Running),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Receiver that flips to `true` when the run is cancelled
    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    /// Register an in-flight call; it is forgotten when the guard drops
    pub fn track(&self, id: CorrelationId) -> TrackedCall<'_> {
        self.calls.lock().insert(id.clone());
        TrackedCall { run: self, id }
    }

    /// Number of calls currently tracked
    pub fn inflight(&self) -> usize {
        self.calls.lock().len()
    }

    /// Record how the run ended; a cancelled run stays cancelled
    pub(crate) fn finish(&self, state: RunState) {
        let mut current = self.state.lock();
        if *current == RunState::Running {
            *current = state;
        }
    }

    /// Cancel the run and every call it still has in flight.
    ///
    /// Returns `false` when the run had already ended.
    pub(crate) fn cancel(&self, transport: &dyn Transport) -> bool {
        {
            let mut state = self.state.lock();
            if *state != RunState::Running {
                return false;
            }
            *state = RunState::Cancelled;
        }
        self.cancel.send_replace(true);

        let calls: Vec<CorrelationId> = self.calls.lock().drain().collect();
        for id in &calls {
            debug!(call_id = %id, "Cancelling call");
            transport.cancel(id);
        }
        true
    }
}

/// Keeps a call id registered with its run while the call is in flight
pub struct TrackedCall<'a> {
    run: &'a RunHandle,
    id: CorrelationId,
}

impl TrackedCall<'_> {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }
}

impl Drop for TrackedCall<'_> {
    fn drop(&mut self) {
        self.run.calls.lock().remove(&self.id);
    }
}

/// Latest run of every tab
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<TabId, Arc<RunHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run for `tab`, cancelling the one it replaces
    pub fn begin(&self, tab: &TabId, transport: &dyn Transport) -> Arc<RunHandle> {
        let run = Arc::new(RunHandle::new());
        if let Some(previous) = self.runs.insert(tab.clone(), run.clone()) {
            if previous.cancel(transport) {
                debug!(%tab, "Cancelled previous run");
            }
        }
        run
    }

    /// Cancel the tab's current run; a no-op if it already ended
    pub fn cancel(&self, tab: &TabId, transport: &dyn Transport) -> bool {
        let Some(run) = self.runs.get(tab).map(|r| r.value().clone()) else {
            return false;
        };
        run.cancel(transport)
    }

    pub fn state(&self, tab: &TabId) -> RunState {
        self.runs
            .get(tab)
            .map(|r| r.state())
            .unwrap_or(RunState::Idle)
    }
}
