//! Connection readiness gate.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

type Waiter = oneshot::Sender<std::result::Result<(), String>>;

#[derive(Default)]
struct State {
    connected: bool,
    closed: Option<String>,
    waiters: VecDeque<Waiter>,
}

/// Lets callers wait until the connection is usable.
///
/// Waiters queue while disconnected and are resolved in arrival order on the
/// next connect, or rejected in arrival order once the lifecycle gives up.
#[derive(Clone, Default)]
pub struct Readiness {
    inner: Arc<Mutex<State>>,
}

impl Readiness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until connected.
    ///
    /// Returns immediately when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if the connection failed definitively.
    pub async fn wait(&self) -> Result<()> {
        let rx = {
            let mut state = self.inner.lock();
            if state.connected {
                return Ok(());
            }
            if let Some(reason) = &state.closed {
                return Err(Error::NotReady(reason.clone()));
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(Error::NotReady(reason)),
            Err(_) => Err(Error::ChannelClosed("readiness")),
        }
    }

    /// Mark connected and release every queued waiter.
    pub fn set_connected(&self) {
        let waiters = {
            let mut state = self.inner.lock();
            state.connected = true;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            // Waiter gave up; nothing to do
            let _ = waiter.send(Ok(()));
        }
    }

    pub fn set_disconnected(&self) {
        self.inner.lock().connected = false;
    }

    /// Reject every queued and future waiter.
    pub fn close(&self, reason: &str) {
        let waiters = {
            let mut state = self.inner.lock();
            state.connected = false;
            state.closed = Some(reason.to_string());
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(reason.to_string()));
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Number of callers currently queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().waiters.len()
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Readiness")
            .field("connected", &state.connected)
            .field("closed", &state.closed)
            .field("pending", &state.waiters.len())
            .finish()
    }
}
