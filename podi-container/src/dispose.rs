//! Disposal bookkeeping.
//!
//! Unregistering and disposing first detach resolvers synchronously, then
//! run their disposers concurrently. [`settle`] drives one such batch and
//! folds the outcomes into a [`DisposalReport`].

use futures::future::join_all;
use tracing::warn;

use crate::error::{PodiError, Result};
use crate::resolver::{DisposeFuture, ResolverId};

/// What happened to one detached resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// The disposer ran and succeeded.
    Disposed,
    /// The resolver has no disposer.
    Skipped,
}

/// Aggregate outcome of an unregister or dispose call.
///
/// ```
/// use podi_container::dispose::DisposalReport;
///
/// let report = DisposalReport::default();
/// assert!(report.is_noop());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DisposalReport {
    /// Resolvers detached from the container.
    pub removed: usize,
    /// Disposers that ran to success.
    pub disposed: usize,
}

impl DisposalReport {
    /// True if nothing was registered, so nothing was removed.
    pub fn is_noop(&self) -> bool {
        self.removed == 0
    }

    /// Removed resolvers whose disposer did not run.
    pub fn skipped(&self) -> usize {
        self.removed.saturating_sub(self.disposed)
    }

    pub(crate) fn record(&mut self, disposal: Disposal) {
        self.removed += 1;
        if disposal == Disposal::Disposed {
            self.disposed += 1;
        }
    }
}

/// A detached resolver whose disposer may still have to run.
pub(crate) struct PendingDisposal {
    pub resolver: ResolverId,
    pub future: Option<DisposeFuture>,
}

impl PendingDisposal {
    async fn run(self) -> (ResolverId, Result<Disposal>) {
        let outcome = match self.future {
            None => Ok(Disposal::Skipped),
            Some(future) => future
                .await
                .map(|()| Disposal::Disposed)
                .map_err(|source| PodiError::DisposerFailed {
                    resolver: self.resolver,
                    source,
                }),
        };
        (self.resolver, outcome)
    }
}

/// Runs every pending disposer concurrently and waits for all of them.
///
/// # Errors
/// Returns the first [`PodiError::DisposerFailed`] in batch order. The
/// remaining disposers are not cancelled; they all settle before this
/// returns.
pub(crate) async fn settle(pending: Vec<PendingDisposal>) -> Result<DisposalReport> {
    let outcomes = join_all(pending.into_iter().map(PendingDisposal::run)).await;

    let mut report = DisposalReport::default();
    let mut first_error = None;

    for (resolver, outcome) in outcomes {
        match outcome {
            Ok(disposal) => report.record(disposal),
            Err(err) => {
                warn!(resolver = %resolver, error = %err, "Disposer failed");
                report.removed += 1;
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use futures::future::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ok_future(counter: &Arc<AtomicU32>) -> Option<DisposeFuture> {
        let counter = counter.clone();
        Some(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
            .boxed(),
        )
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let report = settle(vec![]).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(report, DisposalReport::default());
    }

    #[tokio::test]
    async fn counts_disposed_and_skipped() {
        let counter = Arc::new(AtomicU32::new(0));
        let report = settle(vec![
            PendingDisposal { resolver: ResolverId::next(), future: ok_future(&counter) },
            PendingDisposal { resolver: ResolverId::next(), future: None },
            PendingDisposal { resolver: ResolverId::next(), future: ok_future(&counter) },
        ])
        .await
        .unwrap();

        assert_eq!(report.removed, 3);
        assert_eq!(report.disposed, 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_does_not_cancel_siblings() {
        let counter = Arc::new(AtomicU32::new(0));
        let failing = ResolverId::next();
        let result = settle(vec![
            PendingDisposal {
                resolver: failing,
                future: Some(async { Err::<(), BoxError>("boom".into()) }.boxed()),
            },
            PendingDisposal { resolver: ResolverId::next(), future: ok_future(&counter) },
            PendingDisposal { resolver: ResolverId::next(), future: ok_future(&counter) },
        ])
        .await;

        match result {
            Err(PodiError::DisposerFailed { resolver, source }) => {
                assert_eq!(resolver, failing);
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("Expected DisposerFailed, got: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn skipped_counts_undisposed() {
        let report = DisposalReport { removed: 5, disposed: 4 };
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_noop());
    }

    #[test]
    fn skipped_never_underflows() {
        let report = DisposalReport { removed: 1, disposed: 3 };
        assert_eq!(report.skipped(), 0);
    }
}
