//! Cooperative cancellation for restore and import.
//!
//! The caller keeps the sender half and sends [`CancelToken::Requested`] (the cli
//! forwards Ctrl-C and SIGTERM). Long-running work holds the [`CancelState`] and
//! calls [`CancelState::check`] at each per-folder and per-item boundary.

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::{Result, error::BackupError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelToken {
    Requested,
}

/// Receiving side of a cancel channel
#[derive(Debug)]
pub struct CancelState {
    receiver: mpsc::UnboundedReceiver<CancelToken>,
    requested: bool,
}

impl CancelState {
    fn new(receiver: mpsc::UnboundedReceiver<CancelToken>) -> Self {
        Self {
            receiver,
            requested: false,
        }
    }

    /// A state that is never cancelled
    pub fn never() -> Self {
        let (_sender, state) = new_cancel_channel();
        state
    }

    /// True once a cancel request has been observed
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Returns `Err(Cancelled)` if cancellation has been requested.
    /// Once observed, the request sticks.
    pub fn check(&mut self) -> Result<()> {
        if !self.requested {
            match self.receiver.try_recv() {
                Ok(CancelToken::Requested) => self.requested = true,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
            }
        }
        if self.requested {
            return Err(BackupError::Cancelled);
        }
        Ok(())
    }
}

pub fn new_cancel_channel() -> (mpsc::UnboundedSender<CancelToken>, CancelState) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (sender, CancelState::new(receiver))
}
