//! Progress event channels between the engine and the TUI.
//!
//! Two unbounded channels: one carrying the name of each package as its
//! lookup starts, one carrying a unit per finished lookup. Sends never
//! block and are dropped when the consumer is gone, so a slow TUI can
//! never stall resolution.

use std::sync::mpsc::{channel, Receiver, Sender};

/// Write side handed to the resolution engine.
#[derive(Clone)]
pub struct ProgressSender {
    names: Option<Sender<String>>,
    done: Option<Sender<()>>,
}

/// Read side polled by the progress UI.
pub struct ProgressReceiver {
    /// Package names, in lookup-start order.
    pub names: Receiver<String>,
    /// One unit per completed lookup.
    pub done: Receiver<()>,
}

/// Creates a connected progress channel pair.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (names_tx, names_rx) = channel();
    let (done_tx, done_rx) = channel();
    (
        ProgressSender {
            names: Some(names_tx),
            done: Some(done_tx),
        },
        ProgressReceiver {
            names: names_rx,
            done: done_rx,
        },
    )
}

impl ProgressSender {
    /// A sender with no consumer, for non-interactive runs.
    pub fn disabled() -> Self {
        Self {
            names: None,
            done: None,
        }
    }

    /// Reports that a package lookup has started.
    pub fn started(&self, name: &str) {
        if let Some(ref tx) = self.names {
            let _ = tx.send(name.to_string());
        }
    }

    /// Reports that a package lookup has finished, regardless of outcome.
    pub fn finished(&self) {
        if let Some(ref tx) = self.done {
            let _ = tx.send(());
        }
    }
}
