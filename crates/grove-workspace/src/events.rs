use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_channel::{Receiver, Sender};
use grove_core::Diagnostic;

/// Events published by a [`crate::Workspace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// The published diagnostic set of `file` changed. An empty list clears it.
    DiagnosticsUpdated {
        file: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },
    ClasspathResolved {
        project: PathBuf,
        from_cache: bool,
    },
    ScopeEvicted {
        project: PathBuf,
    },
}

const SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;

#[derive(Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<WorkspaceEvent>>>,
}

impl EventBus {
    #[track_caller]
    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Sender<WorkspaceEvent>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(err) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    target: "grove.workspace",
                    file = loc.file(),
                    line = loc.line(),
                    column = loc.column(),
                    error = %err,
                    "mutex poisoned; continuing with recovered guard"
                );
                err.into_inner()
            }
        }
    }

    /// Bounded so a stalled subscriber cannot grow memory; events for it are dropped instead.
    pub(crate) fn subscribe(&self) -> Receiver<WorkspaceEvent> {
        let (tx, rx) = async_channel::bounded(SUBSCRIBER_QUEUE_CAPACITY);
        self.lock_subscribers().push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: WorkspaceEvent) {
        let mut subs = self.lock_subscribers();
        subs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(async_channel::TrySendError::Full(_)) => true,
            Err(async_channel::TrySendError::Closed(_)) => false,
        });
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }
}
