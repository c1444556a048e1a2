//! Progress reporting for restore and import.
//!
//! Events are emitted strictly after the corresponding unit of work has been persisted.
//! [`ChannelProgress`] forwards them in order to a single consumer task.

use tokio::sync::mpsc;
use tracing::debug;

use crate::library::FolderId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A folder was created and persisted
    FolderCreated { id: FolderId, name: String },
    /// A saved item was created and persisted. `count` is the running total.
    ItemImported { count: usize, title: String },
    /// A record was skipped
    ItemSkipped { location: String },
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Sends events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            debug!("progress receiver dropped");
        }
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for &T {
    fn report(&self, event: ProgressEvent) {
        (**self).report(event);
    }
}
