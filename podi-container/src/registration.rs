//! Per-token registrations.
//!
//! A [`Registration`] holds every resolver registered against one token in
//! one container. Entries are kept sorted by `(weight, timestamp)`, so the
//! last entry is the one single-value resolution picks ("last registered
//! wins" among equal weights).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use podi_support::clock::MonotonicClock;

use crate::container::Container;
use crate::dispose::PendingDisposal;
use crate::resolver::{ErasedResolver, ResolverId};

static CLOCK: MonotonicClock = MonotonicClock::new();

/// A resolver as stored in a registration: the resolver itself, the
/// timestamp it was registered at and the identity it was registered as.
#[derive(Clone)]
pub(crate) struct RegisteredResolver {
    pub resolver: Arc<dyn ErasedResolver>,
    pub timestamp: u64,
    pub origin: ResolverId,
}

impl RegisteredResolver {
    fn new(resolver: Arc<dyn ErasedResolver>) -> Self {
        Self {
            origin: resolver.id(),
            timestamp: CLOCK.next(),
            resolver,
        }
    }

    #[inline]
    fn sort_key(&self) -> (i32, u64) {
        (self.resolver.weight(), self.timestamp)
    }

    pub fn dispose(&self, container: &Container) -> PendingDisposal {
        PendingDisposal {
            resolver: self.origin,
            future: self.resolver.dispose(container),
        }
    }
}

impl fmt::Debug for RegisteredResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredResolver")
            .field("origin", &self.origin)
            .field("weight", &self.resolver.weight())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Sorts by weight, then by registration time.
pub(crate) fn sort_entries(entries: &mut [RegisteredResolver]) {
    entries.sort_by_key(RegisteredResolver::sort_key);
}

/// All resolvers registered for one token in one container.
#[derive(Debug, Default)]
pub(crate) struct Registration {
    entries: RwLock<Vec<RegisteredResolver>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resolver. Returns false if it is already registered here.
    pub fn set(&self, resolver: Arc<dyn ErasedResolver>) -> bool {
        let mut entries = self.entries.write();
        let id = resolver.id();
        if entries.iter().any(|e| e.origin == id) {
            trace!(resolver = %id, "Resolver already registered, skipping");
            return false;
        }

        entries.push(RegisteredResolver::new(resolver));
        sort_entries(&mut entries);
        true
    }

    /// Resolves the last entry.
    pub fn get(&self, container: &Container) -> Option<Box<dyn Any + Send + Sync>> {
        // clone out so no lock is held while the resolver runs
        let last = self.entries.read().last().cloned()?;
        Some(last.resolver.resolve_any(container))
    }

    /// Resolves every entry, in order.
    pub fn get_all(&self, container: &Container) -> Vec<Box<dyn Any + Send + Sync>> {
        self.entries()
            .iter()
            .map(|e| e.resolver.resolve_any(container))
            .collect()
    }

    /// Snapshot of the sorted entries.
    pub fn entries(&self) -> Vec<RegisteredResolver> {
        self.entries.read().clone()
    }

    /// Detaches the resolver registered as `id` and starts its disposer.
    ///
    /// `None` if no such resolver is registered here.
    pub fn delete(&self, id: ResolverId, container: &Container) -> Option<PendingDisposal> {
        let removed = {
            let mut entries = self.entries.write();
            let index = entries.iter().position(|e| e.origin == id)?;
            entries.remove(index)
        };
        Some(removed.dispose(container))
    }

    /// Detaches every resolver and starts all disposers.
    pub fn clear(&self, container: &Container) -> Vec<PendingDisposal> {
        let drained = std::mem::take(&mut *self.entries.write());
        drained.iter().map(|e| e.dispose(container)).collect()
    }

    /// True if any held resolver has been resolved at least once.
    pub fn has_resolved(&self) -> bool {
        self.entries.read().iter().any(|e| e.resolver.has_resolved())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Resolver, ResolverOptions, as_function, as_value};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn value(v: &'static str, weight: i32) -> Resolver<&'static str> {
        as_value(v, ResolverOptions::new().weight(weight))
    }

    fn resolved(reg: &Registration, c: &Container) -> Vec<&'static str> {
        reg.get_all(c)
            .into_iter()
            .map(|b| *b.downcast::<&'static str>().unwrap())
            .collect()
    }

    #[test]
    fn empty_registration() {
        let c = Container::new();
        let reg = Registration::new();
        assert!(reg.is_empty());
        assert!(reg.get(&c).is_none());
        assert!(reg.get_all(&c).is_empty());
        assert!(!reg.has_resolved());
    }

    #[test]
    fn last_registered_wins_on_equal_weight() {
        let c = Container::new();
        let reg = Registration::new();
        reg.set(value("a", 0).erased());
        reg.set(value("b", 0).erased());
        reg.set(value("c", 0).erased());

        let last = reg.get(&c).unwrap();
        assert_eq!(*last.downcast::<&'static str>().unwrap(), "c");
        assert_eq!(resolved(&reg, &c), vec!["a", "b", "c"]);
    }

    #[test]
    fn sorted_by_weight() {
        let c = Container::new();
        let reg = Registration::new();
        reg.set(value("w11", 11).erased());
        reg.set(value("w3", 3).erased());
        reg.set(value("w10", 10).erased());

        assert_eq!(resolved(&reg, &c), vec!["w3", "w10", "w11"]);
        let last = reg.get(&c).unwrap();
        assert_eq!(*last.downcast::<&'static str>().unwrap(), "w11");
    }

    #[test]
    fn timestamps_strictly_increase() {
        let reg = Registration::new();
        for _ in 0..50 {
            reg.set(value("x", 0).erased());
        }
        let entries = reg.entries();
        assert!(entries.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn same_resolver_is_deduplicated() {
        let reg = Registration::new();
        let r = value("a", 0);
        assert!(reg.set(r.erased()));
        assert!(!reg.set(r.clone().erased()));
        assert_eq!(reg.entries().len(), 1);
    }

    #[test]
    fn has_resolved_tracks_any_entry() {
        let c = Container::new();
        let reg = Registration::new();
        let first = value("a", 0);
        reg.set(first.erased());
        reg.set(value("b", 0).erased());
        assert!(!reg.has_resolved());

        first.resolve(&c);
        assert!(reg.has_resolved());
    }

    #[tokio::test]
    async fn delete_by_identity_runs_disposer() {
        let c = Container::new();
        let disposed = Arc::new(AtomicU32::new(0));
        let reg = Registration::new();

        let target = as_value(
            "a",
            ResolverOptions::new().disposer({
                let disposed = disposed.clone();
                move |_, _| {
                    disposed.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                }
            }),
        );
        let other = value("b", 0);
        reg.set(target.erased());
        reg.set(other.erased());

        let pending = reg.delete(target.id(), &c).unwrap();
        assert_eq!(reg.entries().len(), 1);
        crate::dispose::settle(vec![pending]).await.unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        // gone now
        assert!(reg.delete(target.id(), &c).is_none());
        assert_eq!(resolved(&reg, &c), vec!["b"]);
    }

    #[tokio::test]
    async fn clear_disposes_everything() {
        let c = Container::new();
        let disposed = Arc::new(AtomicU32::new(0));
        let reg = Registration::new();

        for _ in 0..3 {
            let r = as_function(
                || 1u8,
                ResolverOptions::new().disposer({
                    let disposed = disposed.clone();
                    move |_, _| {
                        disposed.fetch_add(1, Ordering::SeqCst);
                        async { Ok(()) }
                    }
                }),
            );
            r.resolve(&c);
            reg.set(r.erased());
        }

        let pending = reg.clear(&c);
        assert!(reg.is_empty());
        let report = crate::dispose::settle(pending).await.unwrap();
        assert_eq!(report.removed, 3);
        assert_eq!(report.disposed, 3);
        assert_eq!(disposed.load(Ordering::SeqCst), 3);
    }
}
