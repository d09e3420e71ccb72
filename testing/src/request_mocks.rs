//! Request wrapper that counts lifecycle calls across retries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use publisher_core::{
    ArgumentSource, Held, Object, Publication, Request, Response, Result, Value,
};

use crate::mocks::CallLog;

/// Close counts per retry generation, shared by a request and its retries.
///
/// Generation 0 is the request handed to the loop, generation 1 its first
/// retry, and so on.
#[derive(Debug, Clone, Default)]
pub struct CloseTracker {
    closes: Arc<Mutex<BTreeMap<usize, usize>>>,
}

impl CloseTracker {
    #[allow(clippy::unwrap_used)] // Test infrastructure
    fn record(&self, generation: usize) {
        *self.closes.lock().unwrap().entry(generation).or_default() += 1;
    }

    /// How often the request of `generation` was closed.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test infrastructure
    pub fn count(&self, generation: usize) -> usize {
        self.closes
            .lock()
            .unwrap()
            .get(&generation)
            .copied()
            .unwrap_or_default()
    }

    /// Close counts by generation.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test infrastructure
    pub fn snapshot(&self) -> BTreeMap<usize, usize> {
        self.closes.lock().unwrap().clone()
    }
}

/// Wraps a request, logging `process_inputs`, `retry` and `close:{generation}`
/// and scripting [`Request::supports_retry`].
///
/// `supports_retry` answers `true` as many times as the retry budget allows,
/// across all generations, then `false`.
pub struct CountingRequest<R> {
    inner: R,
    generation: usize,
    log: CallLog,
    closes: CloseTracker,
    retry_budget: Arc<AtomicUsize>,
}

impl<R: Request> CountingRequest<R> {
    /// Wrap `inner` with no retry budget.
    #[must_use]
    pub fn new(inner: R, log: &CallLog) -> Self {
        Self {
            inner,
            generation: 0,
            log: log.clone(),
            closes: CloseTracker::default(),
            retry_budget: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Let `supports_retry` answer `true` this many times.
    #[must_use]
    pub fn with_retry_budget(self, budget: usize) -> Self {
        self.retry_budget.store(budget, Ordering::SeqCst);
        self
    }

    /// Handle on the shared close counts
    #[must_use]
    pub fn close_tracker(&self) -> CloseTracker {
        self.closes.clone()
    }

    /// Retry generation of this request
    #[must_use]
    pub const fn generation(&self) -> usize {
        self.generation
    }

    /// The wrapped request
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: fmt::Debug> fmt::Debug for CountingRequest<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingRequest")
            .field("generation", &self.generation)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<R: Request> Request for CountingRequest<R> {
    fn process_inputs(&mut self) -> Result<()> {
        self.log.record("process_inputs");
        self.inner.process_inputs()
    }

    fn response(&self) -> &dyn Response {
        self.inner.response()
    }

    fn response_mut(&mut self) -> &mut dyn Response {
        self.inner.response_mut()
    }

    fn traverse(&mut self, root: Object) -> Result<Object> {
        self.inner.traverse(root)
    }

    fn traversal_stack(&self) -> Vec<String> {
        self.inner.traversal_stack()
    }

    fn set_traversal_stack(&mut self, stack: Vec<String>) {
        self.inner.set_traversal_stack(stack);
    }

    fn positional_arguments(&self) -> &[Value] {
        self.inner.positional_arguments()
    }

    fn principal(&self) -> Option<&str> {
        self.inner.principal()
    }

    fn set_principal(&mut self, principal: Option<String>) {
        self.inner.set_principal(principal);
    }

    fn supports_retry(&self) -> bool {
        self.retry_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn retry(&self) -> Result<Self> {
        self.log.record("retry");
        Ok(Self {
            inner: self.inner.retry()?,
            generation: self.generation + 1,
            log: self.log.clone(),
            closes: self.closes.clone(),
            retry_budget: Arc::clone(&self.retry_budget),
        })
    }

    fn close(&mut self) {
        self.log.record(format!("close:{}", self.generation));
        self.closes.record(self.generation);
        self.inner.close();
    }

    fn hold(&mut self, held: Box<dyn Held>) {
        self.inner.hold(held);
    }

    fn publication(&self) -> Option<Arc<dyn Publication>> {
        self.inner.publication()
    }

    fn set_publication(&mut self, publication: Arc<dyn Publication>) {
        self.inner.set_publication(publication);
    }

    fn as_argument_source(&self) -> &dyn ArgumentSource {
        self.inner.as_argument_source()
    }
}
