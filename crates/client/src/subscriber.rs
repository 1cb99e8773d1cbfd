//! Live-query subscription: feeds listen events into the page store and
//! coalesces bursts into a single debounced result refetch.
//!
//! One subscription exists per (page IDs, filter/order) dependency set;
//! the owner drops the handle and spawns a fresh one whenever that set
//! changes. Dropping the handle aborts the task.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use audiofast_core::events::{EventBus, ListenEvent};

use crate::error::ClientError;
use crate::source::DocumentStore;
use crate::store::PageStore;

/// Quiescence window: a refetch runs only after the subscription has
/// been silent this long.
pub const DEBOUNCE: Duration = Duration::from_secs(1);

pub struct LiveSubscription {
    task: JoinHandle<()>,
}

impl LiveSubscription {
    /// Drive the page store from a listen-event stream. Every event is
    /// also republished on `bus` so indicators and toasts can observe
    /// the channel without a second subscription.
    pub fn spawn<S>(
        store: Arc<PageStore<S>>,
        bus: EventBus,
        events: impl Stream<Item = Result<ListenEvent, ClientError>> + Send + 'static,
        debounce: Duration,
    ) -> Self
    where
        S: DocumentStore + Send + Sync + 'static + ?Sized,
    {
        let task = tokio::spawn(async move {
            let mut events = Box::pin(events);
            let mut dirty = false;
            loop {
                tokio::select! {
                    next = events.next() => match next {
                        Some(Ok(event)) => {
                            if let ListenEvent::Mutation(mutation) = &event {
                                store.note_change(mutation.base_id());
                                dirty = true;
                            }
                            let disconnect = matches!(event, ListenEvent::Disconnect);
                            // A send error only means nobody is watching.
                            let _ = bus.publish(event);
                            if disconnect {
                                break;
                            }
                        }
                        None => break,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "listen stream error");
                        }
                    },
                    // Recreated every iteration, so any event resets the
                    // quiescence timer.
                    _ = tokio::time::sleep(debounce), if dirty => {
                        dirty = false;
                        if let Err(e) = store.refresh_results().await {
                            tracing::warn!(error = %e, "debounced refetch failed");
                        }
                    }
                }
            }
            if dirty {
                if let Err(e) = store.refresh_results().await {
                    tracing::warn!(error = %e, "final refetch failed");
                }
            }
        });
        Self { task }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
