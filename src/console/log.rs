// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-tab append-only console store

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::entry::ConsoleEntry;
use super::ConsoleSink;
use crate::model::TabId;

/// Capacity of the live subscription channel
const SUBSCRIBER_CAPACITY: usize = 256;

/// Console entries of every tab, in append order per tab
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    entries: Arc<DashMap<TabId, Vec<ConsoleEntry>>>,
    live: broadcast::Sender<(TabId, ConsoleEntry)>,
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLog {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            entries: Arc::new(DashMap::new()),
            live,
        }
    }

    /// Append an entry to a tab's stream
    pub fn append(&self, tab: &TabId, entry: ConsoleEntry) {
        self.entries
            .entry(tab.clone())
            .or_default()
            .push(entry.clone());
        // No receivers is fine
        let _ = self.live.send((tab.clone(), entry));
    }

    /// Snapshot of a tab's entries
    pub fn entries(&self, tab: &TabId) -> Vec<ConsoleEntry> {
        self.entries
            .get(tab)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn len(&self, tab: &TabId) -> usize {
        self.entries.get(tab).map(|e| e.len()).unwrap_or(0)
    }

    /// Drop a tab's entries
    pub fn clear(&self, tab: &TabId) {
        self.entries.remove(tab);
    }

    pub fn clear_all(&self) {
        self.entries.clear();
    }

    /// Live feed of entries appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<(TabId, ConsoleEntry)> {
        self.live.subscribe()
    }

    /// Sink writing into one tab's stream
    pub fn sink(&self, tab: &TabId) -> TabConsole {
        TabConsole {
            log: self.clone(),
            tab: tab.clone(),
        }
    }
}

/// A [`ConsoleLog`] bound to one tab
#[derive(Debug, Clone)]
pub struct TabConsole {
    log: ConsoleLog,
    tab: TabId,
}

impl ConsoleSink for TabConsole {
    fn append(&self, entry: ConsoleEntry) {
        self.log.append(&self.tab, entry);
    }
}
