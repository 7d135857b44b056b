use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::{sync::broadcast, task::JoinHandle};

use super::{EditorEvent, EditorEvents, EventSource};

/// Asynchronous reaction to one editor event.
pub type EventHandler = Arc<dyn Fn(EditorEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// A live registration of one handler on one event source.
///
/// The handler runs on a forwarding task that lives exactly as long as this
/// value: dropping the subscription aborts the task.
#[derive(Debug)]
#[must_use = "Subscription must be kept, otherwise it is disposed immediately"]
pub struct Subscription {
    source: EventSource,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn spawn(events: &EditorEvents, source: EventSource, handler: EventHandler) -> Self {
        // Subscribe before spawning so nothing emitted after this call is missed.
        let mut receiver = events.subscribe(source);

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => handler(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%source, skipped, "Subscription lagged behind its event source");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!(%source, "Subscription loop finished");
        });

        Self { source, task }
    }

    pub fn source(&self) -> EventSource {
        self.source
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Every subscription belonging to one active period of the session.
///
/// The set is always rebuilt wholesale: `start` disposes whatever was there
/// before registering the new handlers.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<I>(&mut self, events: &EditorEvents, routes: I)
    where
        I: IntoIterator<Item = (EventSource, EventHandler)>,
    {
        self.stop();

        for (source, handler) in routes {
            if self.contains(source) {
                tracing::warn!(%source, "Ignoring duplicate subscription for event source");
                continue;
            }
            self.subscriptions
                .push(Subscription::spawn(events, source, handler));
        }
        tracing::debug!(count = self.subscriptions.len(), "Editor subscriptions started");
    }

    /// Disposes every subscription. Safe to call on an empty set.
    /// Returns how many subscriptions were disposed.
    pub fn stop(&mut self) -> usize {
        let disposed = self.subscriptions.len();
        self.subscriptions.clear();
        if disposed > 0 {
            tracing::debug!(count = disposed, "Editor subscriptions disposed");
        }
        disposed
    }

    pub fn contains(&self, source: EventSource) -> bool {
        self.subscriptions.iter().any(|s| s.source() == source)
    }

    pub fn sources(&self) -> Vec<EventSource> {
        self.subscriptions.iter().map(Subscription::source).collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(count: &Arc<AtomicUsize>) -> EventHandler {
        let count = Arc::clone(count);
        Arc::new(move |_event| {
            count.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(()).boxed()
        })
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn restart_never_duplicates_a_source() {
        let events = EditorEvents::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut set = SubscriptionSet::new();

        set.start(&events, [(EventSource::Selection, counting_handler(&count))]);
        set.start(
            &events,
            [
                (EventSource::Selection, counting_handler(&count)),
                (EventSource::Selection, counting_handler(&count)),
            ],
        );
        assert_eq!(set.sources(), vec![EventSource::Selection]);

        settle().await;
        events.emit(EditorEvent::SelectionChanged);
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_disposes_everything_and_is_idempotent() {
        let events = EditorEvents::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut set = SubscriptionSet::new();

        set.start(
            &events,
            [
                (EventSource::Selection, counting_handler(&count)),
                (EventSource::TextDocument, counting_handler(&count)),
            ],
        );
        assert_eq!(set.len(), 2);

        assert_eq!(set.stop(), 2);
        assert_eq!(set.stop(), 0);
        assert!(set.is_empty());

        settle().await;
        events.emit(EditorEvent::SelectionChanged);
        events.emit(EditorEvent::TextDocumentChanged);
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(events.listener_count(EventSource::Selection), 0);
    }
}
