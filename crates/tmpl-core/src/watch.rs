//! Watcher collaborator contract
//!
//! A model node that can tell when its template source changed implements [`Watch`].
//! The compiler calls [`Watch::spawn`] once per discovered watcher when a
//! [`Template`](crate::Template) is first compiled, and recompiles whenever a
//! [`Signal`] fires. How the watcher notices changes is its own business.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryIter, TryRecvError};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Starts a background watch that calls [`Signal::notify`] on every change.
///
/// Implementations must return promptly and stop once [`Signal::is_closed`]
/// reports true or `notify` returns `false`.
pub trait Watch: Send + Sync {
    fn spawn(&self, signal: Signal);
}

/// Change notification handle given to a watcher.
#[derive(Debug, Clone)]
pub struct Signal {
    tx: Sender<()>,
    listener: Weak<()>,
}

/// Receiving end of a [`Signal`]. Dropping it closes every clone of the signal.
#[derive(Debug)]
pub struct Listener {
    rx: Receiver<()>,
    _alive: Arc<()>,
}

impl Signal {
    pub fn channel() -> (Signal, Listener) {
        let (tx, rx) = mpsc::channel();
        let alive = Arc::new(());
        let signal = Signal {
            tx,
            listener: Arc::downgrade(&alive),
        };
        (signal, Listener { rx, _alive: alive })
    }

    /// Reports a change. Returns `false` once nobody listens anymore, which is the
    /// watcher's cue to stop.
    pub fn notify(&self) -> bool {
        !self.is_closed() && self.tx.send(()).is_ok()
    }

    /// Whether the listener is gone. Watchers check this between polls so they
    /// stop without waiting for a change.
    pub fn is_closed(&self) -> bool {
        self.listener.strong_count() == 0
    }
}

impl Listener {
    pub fn recv(&self) -> Result<(), mpsc::RecvError> {
        self.rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<(), RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<(), TryRecvError> {
        self.rx.try_recv()
    }

    pub fn try_iter(&self) -> TryIter<'_, ()> {
        self.rx.try_iter()
    }
}
