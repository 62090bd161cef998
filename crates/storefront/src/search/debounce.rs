//! Debounced search driver.
//!
//! [`Debouncer`] is the clock-agnostic core: it holds at most one pending
//! value and its deadline, and callers pass the current instant in. Scheduling
//! a new value replaces (cancels) the pending one, so at most one filter pass
//! runs per quiet period no matter how fast input arrives.
//!
//! [`DebouncedSearch`] wraps it in a background task fed by a channel and
//! publishes each pass on a `watch` channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace, warn};

use super::{SearchIndex, SearchState};

/// Single-flight delay: one pending value, restarted on every schedule.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Schedule `value` to fire one quiet period after `now`.
    ///
    /// Returns the value this call superseded, if one was pending.
    pub fn schedule(&mut self, value: T, now: Instant) -> Option<T> {
        self.pending
            .replace((value, now + self.quiet))
            .map(|(superseded, _)| superseded)
    }

    /// Drop the pending value without firing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((_, deadline)) if deadline <= now => self.cancel(),
            _ => None,
        }
    }
}

enum Input {
    Query(String),
    Clear,
}

/// Search box handler.
///
/// Feed it every keystroke with [`set_query`](Self::set_query) and observe
/// settled results through [`subscribe`](Self::subscribe). Must be created
/// inside a Tokio runtime. Dropping it stops the background task.
pub struct DebouncedSearch {
    input: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<SearchState>,
    task: JoinHandle<()>,
}

impl DebouncedSearch {
    /// Start the background task.
    #[must_use]
    pub fn spawn(index: SearchIndex, quiet: Duration) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SearchState::default());
        let task = tokio::spawn(run(index, quiet, input_rx, state_tx));
        Self {
            input: input_tx,
            state: state_rx,
            task,
        }
    }

    /// Record new query text, restarting the quiet period.
    pub fn set_query(&self, query: impl Into<String>) {
        self.send(Input::Query(query.into()));
    }

    /// Cancel any pending pass and clear results immediately.
    pub fn clear(&self) {
        self.send(Input::Clear);
    }

    /// Receiver of every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.clone()
    }

    /// The last published state.
    #[must_use]
    pub fn current(&self) -> SearchState {
        self.state.borrow().clone()
    }

    fn send(&self, input: Input) {
        if self.input.send(input).is_err() {
            warn!("Search task is no longer running");
        }
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    index: SearchIndex,
    quiet: Duration,
    mut input: mpsc::UnboundedReceiver<Input>,
    state: watch::Sender<SearchState>,
) {
    let mut debouncer = Debouncer::new(quiet);

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            biased;

            message = input.recv() => match message {
                Some(Input::Query(query)) => {
                    if debouncer.schedule(query, Instant::now()).is_some() {
                        trace!("Pending search superseded");
                    }
                }
                Some(Input::Clear) => {
                    debouncer.cancel();
                    publish(&state, SearchState::default());
                }
                None => break,
            },

            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(query) = debouncer.take_due(Instant::now()) {
                    publish(&state, index.search(&query));
                }
            }
        }
    }

    debug!("Search task stopped");
}

fn publish(state: &watch::Sender<SearchState>, mut next: SearchState) {
    state.send_modify(|current| {
        next.revision = current.revision + 1;
        *current = next;
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kreg_core::{Product, ProductId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::catalog::Catalog;

    const QUIET: Duration = Duration::from_millis(300);

    fn index() -> SearchIndex {
        let catalog = Catalog::new();
        catalog.replace(
            ["Apple", "Apricot", "Banana"]
                .into_iter()
                .enumerate()
                .map(|(i, name)| Product {
                    id: ProductId::new(i.to_string()),
                    name: name.to_string(),
                    description: String::new(),
                    category: "Produce".to_string(),
                    subcategory: None,
                    price: Decimal::ONE,
                    old_price: None,
                    image: String::new(),
                    out_of_stock: false,
                })
                .collect(),
        );
        SearchIndex::new(catalog)
    }

    #[test]
    fn test_debouncer_schedule_replaces_pending() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        assert_eq!(debouncer.schedule("a", now), None);
        assert_eq!(
            debouncer.schedule("ap", now + Duration::from_millis(100)),
            Some("a")
        );
        assert_eq!(
            debouncer.deadline(),
            Some(now + Duration::from_millis(400))
        );
    }

    #[test]
    fn test_debouncer_take_due_respects_deadline() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.schedule("app", now);

        assert_eq!(debouncer.take_due(now + Duration::from_millis(299)), None);
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.take_due(now + QUIET), Some("app"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.take_due(now + QUIET), None);
    }

    #[test]
    fn test_debouncer_cancel_drops_pending() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.schedule(1, now);
        assert_eq!(debouncer.cancel(), Some(1));
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.take_due(now + QUIET), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_queries_trigger_one_pass() {
        let search = DebouncedSearch::spawn(index(), QUIET);
        let mut rx = search.subscribe();

        search.set_query("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        search.set_query("ap");
        tokio::time::sleep(Duration::from_millis(100)).await;
        search.set_query("app");

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.revision, 1);
        assert_eq!(state.query, "app");
        assert_eq!(state.results.len(), 1);

        // No second pass for the superseded inputs
        let more = tokio::time::timeout(Duration::from_secs(5), rx.changed()).await;
        assert!(more.is_err());
        assert_eq!(search.current().revision, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_waits_for_quiet_period() {
        let search = DebouncedSearch::spawn(index(), QUIET);

        search.set_query("ap");
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(search.current().revision, 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let state = search.current();
        assert_eq!(state.revision, 1);
        assert_eq!(state.results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_pass() {
        let search = DebouncedSearch::spawn(index(), QUIET);
        let mut rx = search.subscribe();

        search.set_query("banana");
        tokio::time::sleep(Duration::from_millis(100)).await;
        search.clear();

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.active);
        assert!(state.results.is_empty());

        let more = tokio::time::timeout(Duration::from_secs(5), rx.changed()).await;
        assert!(more.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_query_settles_to_inactive() {
        let search = DebouncedSearch::spawn(index(), QUIET);
        let mut rx = search.subscribe();

        search.set_query("apple");
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().active);

        search.set_query("   ");
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.active);
        assert!(state.results.is_empty());
        assert_eq!(state.revision, 2);
    }
}
