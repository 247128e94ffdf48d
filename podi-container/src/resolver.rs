//! Resolvers — lazy producers of values.
//!
//! A [`Resolver<R>`] knows how to produce an `R` and carries the metadata
//! the container needs to order and release it: weight, root flag,
//! lifetime and an optional disposer.
//!
//! Three variants exist, built by the factory functions in this module:
//!
//! | factory                         | kind     | produces                       |
//! |---------------------------------|----------|--------------------------------|
//! | [`as_value`]                    | Value    | clone of a precomputed value   |
//! | [`as_function`] / [`as_function_with`] | Function | result of a closure     |
//! | [`as_class`] / [`as_class_with`] | Class   | `Arc<C>` built by [`Construct`] |
//!
//! Nothing is produced until the first [`Resolver::resolve`].
//!
//! # Examples
//! ```
//! use podi_container::container::Container;
//! use podi_container::lifetime::Lifetime;
//! use podi_container::resolver::{as_function, ResolverOptions};
//!
//! let container = Container::new();
//! let counter = std::sync::atomic::AtomicU32::new(0);
//! let next_id = as_function(
//!     move || counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst),
//!     ResolverOptions::new().lifetime(Lifetime::Transient),
//! );
//!
//! assert_eq!(next_id.resolve(&container), 0);
//! assert_eq!(next_id.resolve(&container), 1);
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::trace;

use podi_support::rendering::short_type_name;

use crate::container::Container;
use crate::error::BoxError;
use crate::lifetime::Lifetime;

static NEXT_RESOLVER: AtomicU64 = AtomicU64::new(1);

/// Future returned by a disposer.
pub type DisposeFuture = BoxFuture<'static, std::result::Result<(), BoxError>>;

/// Releases a produced value. Receives the value and the container that
/// owns the registration.
pub type Disposer<R> = Arc<dyn Fn(R, Container) -> DisposeFuture + Send + Sync>;

type Make<R> = Arc<dyn Fn(&Container) -> R + Send + Sync>;

/// Process-unique identity of a resolver.
///
/// Clones of a [`Resolver`] share the id; this is what
/// [`Container::unregister_resolver`] matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolverId(u64);

impl ResolverId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOLVER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which factory built a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    Value,
    Function,
    Class,
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverKind::Value => write!(f, "value"),
            ResolverKind::Function => write!(f, "function"),
            ResolverKind::Class => write!(f, "class"),
        }
    }
}

/// A type that can be instantiated by a Class resolver.
///
/// `Args` is what the injector has to supply; use `()` for types that
/// need nothing.
///
/// ```
/// use podi_container::resolver::Construct;
///
/// struct Greeter { name: String }
///
/// impl Construct for Greeter {
///     type Args = String;
///     fn construct(name: String) -> Self { Greeter { name } }
/// }
/// ```
pub trait Construct: Sized + Send + Sync + 'static {
    type Args;

    fn construct(args: Self::Args) -> Self;
}

/// Options shared by every resolver factory.
///
/// ```
/// use podi_container::resolver::ResolverOptions;
///
/// let opts = ResolverOptions::<u32>::new().weight(10).root().transient();
/// ```
pub struct ResolverOptions<R> {
    weight: i32,
    root: bool,
    lifetime: Lifetime,
    disposer: Option<Disposer<R>>,
}

impl<R> Default for ResolverOptions<R> {
    fn default() -> Self {
        Self {
            weight: 0,
            root: false,
            lifetime: Lifetime::default(),
            disposer: None,
        }
    }
}

impl<R> ResolverOptions<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordering key for multi-value resolution; lower sorts first.
    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Register into the outermost ancestor container regardless of
    /// which scope `register` is called on.
    pub fn root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Ignored by Value resolvers.
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn transient(self) -> Self {
        self.lifetime(Lifetime::Transient)
    }

    /// Sets the cleanup callback run when the resolver is unregistered
    /// or its container disposed.
    pub fn disposer<F, Fut>(mut self, disposer: F) -> Self
    where
        F: Fn(R, Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        self.disposer = Some(Arc::new(move |value: R, container: Container| {
            disposer(value, container).boxed()
        }));
        self
    }
}

impl<R> fmt::Debug for ResolverOptions<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverOptions")
            .field("weight", &self.weight)
            .field("root", &self.root)
            .field("lifetime", &self.lifetime)
            .field("disposer", &self.disposer.is_some())
            .finish()
    }
}

enum Producer<R> {
    Value(R),
    Singleton { make: Make<R>, instance: OnceCell<R> },
    Transient { make: Make<R>, last: Mutex<Option<R>> },
}

struct Inner<R> {
    id: ResolverId,
    kind: ResolverKind,
    weight: i32,
    root: bool,
    disposer: Option<Disposer<R>>,
    producer: Producer<R>,
    resolved: AtomicBool,
}

impl<R: Clone + Send + Sync + 'static> Inner<R> {
    fn resolve(&self, container: &Container) -> R {
        self.resolved.store(true, Ordering::Release);
        trace!(resolver = %self.id, kind = %self.kind, "Resolving");

        match &self.producer {
            Producer::Value(value) => value.clone(),
            Producer::Singleton { make, instance } => {
                instance.get_or_init(|| make(container)).clone()
            }
            Producer::Transient { make, last } => {
                let value = make(container);
                *last.lock() = Some(value.clone());
                value
            }
        }
    }

    /// The value a disposer should release: the last one produced, or a
    /// fresh one if the resolver never ran.
    fn disposable(&self, container: &Container) -> R {
        match &self.producer {
            Producer::Value(value) => value.clone(),
            Producer::Singleton { make, instance } => {
                instance.get_or_init(|| make(container)).clone()
            }
            Producer::Transient { make, last } => {
                let produced = last.lock().clone();
                produced.unwrap_or_else(|| make(container))
            }
        }
    }

    fn lifetime(&self) -> Option<Lifetime> {
        match &self.producer {
            Producer::Value(_) => None,
            Producer::Singleton { .. } => Some(Lifetime::Singleton),
            Producer::Transient { .. } => Some(Lifetime::Transient),
        }
    }
}

/// A lazy producer of `R` values. Cheap to clone; clones share state.
pub struct Resolver<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Resolver<R> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<R: Clone + Send + Sync + 'static> Resolver<R> {
    fn build(kind: ResolverKind, producer: Producer<R>, options: ResolverOptions<R>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: ResolverId::next(),
                kind,
                weight: options.weight,
                root: options.root,
                disposer: options.disposer,
                producer,
                resolved: AtomicBool::new(false),
            }),
        }
    }

    fn factory(kind: ResolverKind, make: Make<R>, options: ResolverOptions<R>) -> Self {
        let producer = match options.lifetime {
            Lifetime::Singleton => Producer::Singleton { make, instance: OnceCell::new() },
            Lifetime::Transient => Producer::Transient { make, last: Mutex::new(None) },
        };
        Self::build(kind, producer, options)
    }

    #[inline]
    pub fn id(&self) -> ResolverId {
        self.inner.id
    }

    #[inline]
    pub fn kind(&self) -> ResolverKind {
        self.inner.kind
    }

    #[inline]
    pub fn weight(&self) -> i32 {
        self.inner.weight
    }

    /// True if registrations are redirected to the root container.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.inner.root
    }

    /// `None` for Value resolvers.
    #[inline]
    pub fn lifetime(&self) -> Option<Lifetime> {
        self.inner.lifetime()
    }

    #[inline]
    pub fn has_disposer(&self) -> bool {
        self.inner.disposer.is_some()
    }

    /// True once [`resolve`](Self::resolve) has been called. Never resets.
    #[inline]
    pub fn has_resolved(&self) -> bool {
        self.inner.resolved.load(Ordering::Acquire)
    }

    /// Produces a value, honoring the lifetime.
    ///
    /// `container` is handed to the injector, if any.
    pub fn resolve(&self, container: &Container) -> R {
        self.inner.resolve(container)
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedResolver> {
        self.inner.clone()
    }
}

impl<R> fmt::Debug for Resolver<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!("Resolver<{}>", short_type_name::<R>()))
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("weight", &self.inner.weight)
            .field("root", &self.inner.root)
            .field("resolved", &self.inner.resolved.load(Ordering::Acquire))
            .finish()
    }
}

/// Type-erased view of a resolver, as stored in registrations.
pub(crate) trait ErasedResolver: Send + Sync {
    fn id(&self) -> ResolverId;
    fn weight(&self) -> i32;
    fn has_resolved(&self) -> bool;
    fn resolve_any(&self, container: &Container) -> Box<dyn Any + Send + Sync>;

    /// Starts the disposer on the last produced value, producing one first
    /// if the resolver never ran.
    ///
    /// `None` when there is no disposer.
    fn dispose(&self, container: &Container) -> Option<DisposeFuture>;
}

impl<R: Clone + Send + Sync + 'static> ErasedResolver for Inner<R> {
    fn id(&self) -> ResolverId {
        self.id
    }

    fn weight(&self) -> i32 {
        self.weight
    }

    fn has_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    fn resolve_any(&self, container: &Container) -> Box<dyn Any + Send + Sync> {
        Box::new(self.resolve(container))
    }

    fn dispose(&self, container: &Container) -> Option<DisposeFuture> {
        let disposer = self.disposer.as_ref()?;
        let value = self.disposable(container);
        trace!(resolver = %self.id, "Running disposer");
        Some(disposer(value, container.clone()))
    }
}

// ── Factories ──

/// Wraps a precomputed value. Every resolve returns a clone of it;
/// wrap it in `Arc` to share one instance.
pub fn as_value<R>(value: R, options: ResolverOptions<R>) -> Resolver<R>
where
    R: Clone + Send + Sync + 'static,
{
    Resolver::build(ResolverKind::Value, Producer::Value(value), options)
}

/// Wraps a closure that needs no arguments.
pub fn as_function<R, F>(f: F, options: ResolverOptions<R>) -> Resolver<R>
where
    R: Clone + Send + Sync + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    Resolver::factory(ResolverKind::Function, Arc::new(move |_: &Container| f()), options)
}

/// Wraps a closure whose argument is supplied by `injector`.
///
/// ```
/// use podi_container::container::Container;
/// use podi_container::resolver::{as_function_with, ResolverOptions};
///
/// let add = as_function_with(|(a, b): (u32, u32)| a + b, |_| (3, 5), ResolverOptions::new());
/// assert_eq!(add.resolve(&Container::new()), 8);
/// ```
pub fn as_function_with<A, R, F, I>(f: F, injector: I, options: ResolverOptions<R>) -> Resolver<R>
where
    R: Clone + Send + Sync + 'static,
    F: Fn(A) -> R + Send + Sync + 'static,
    I: Fn(&Container) -> A + Send + Sync + 'static,
{
    Resolver::factory(
        ResolverKind::Function,
        Arc::new(move |container: &Container| f(injector(container))),
        options,
    )
}

/// Instantiates `C` with no arguments.
pub fn as_class<C>(options: ResolverOptions<Arc<C>>) -> Resolver<Arc<C>>
where
    C: Construct<Args = ()>,
{
    Resolver::factory(
        ResolverKind::Class,
        Arc::new(|_: &Container| Arc::new(C::construct(()))),
        options,
    )
}

/// Instantiates `C` with arguments supplied by `injector`.
pub fn as_class_with<C, I>(injector: I, options: ResolverOptions<Arc<C>>) -> Resolver<Arc<C>>
where
    C: Construct,
    I: Fn(&Container) -> C::Args + Send + Sync + 'static,
{
    Resolver::factory(
        ResolverKind::Class,
        Arc::new(move |container: &Container| Arc::new(C::construct(injector(container)))),
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct Repo;

    impl Repo {
        fn stuff(&self) -> &'static str {
            "stuff"
        }
    }

    impl Construct for Repo {
        type Args = ();
        fn construct(_: ()) -> Self {
            Repo
        }
    }

    struct Person {
        name: String,
    }

    impl Person {
        fn speak(&self) -> String {
            format!("I am {}.", self.name)
        }
    }

    impl Construct for Person {
        type Args = String;
        fn construct(name: String) -> Self {
            Person { name }
        }
    }

    #[test]
    fn value_resolver_returns_value() {
        let c = Container::new();
        let r = as_value("hello", ResolverOptions::new());
        assert_eq!(r.kind(), ResolverKind::Value);
        assert!(!r.has_resolved());
        assert_eq!(r.resolve(&c), "hello");
        assert!(r.has_resolved());
        assert_eq!(r.lifetime(), None);
    }

    #[test]
    fn value_resolver_shares_arc() {
        let c = Container::new();
        let shared = Arc::new(vec![1, 2, 3]);
        let r = as_value(shared.clone(), ResolverOptions::new());
        assert!(Arc::ptr_eq(&r.resolve(&c), &shared));
        assert!(Arc::ptr_eq(&r.resolve(&c), &shared));
    }

    #[test]
    fn function_without_arguments() {
        let c = Container::new();
        let r = as_function(|| 6, ResolverOptions::new());
        assert_eq!(r.kind(), ResolverKind::Function);
        assert!(!r.has_resolved());
        assert_eq!(r.resolve(&c), 6);
        assert!(r.has_resolved());
    }

    #[test]
    fn function_with_injected_arguments() {
        let c = Container::new();
        let r = as_function_with(|(a, b): (i32, i32)| a + b, |_| (3, 5), ResolverOptions::new());
        assert_eq!(r.resolve(&c), 8);
    }

    #[test]
    fn singleton_function_called_once() {
        let c = Container::new();
        let calls = Arc::new(AtomicU32::new(0));
        let r = as_function(
            {
                let calls = calls.clone();
                move || Arc::new(calls.fetch_add(1, Ordering::SeqCst))
            },
            ResolverOptions::new(),
        );

        let a = r.resolve(&c);
        let b = r.resolve(&c);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.lifetime(), Some(Lifetime::Singleton));
    }

    #[test]
    fn transient_function_called_every_time() {
        let c = Container::new();
        let calls = Arc::new(AtomicU32::new(0));
        let r = as_function(
            {
                let calls = calls.clone();
                move || calls.fetch_add(1, Ordering::SeqCst)
            },
            ResolverOptions::new().transient(),
        );

        assert_eq!(r.resolve(&c), 0);
        assert_eq!(r.resolve(&c), 1);
        assert_eq!(r.resolve(&c), 2);
        assert_eq!(r.lifetime(), Some(Lifetime::Transient));
    }

    #[test]
    fn class_without_arguments() {
        let c = Container::new();
        let r = as_class::<Repo>(ResolverOptions::new());
        assert_eq!(r.kind(), ResolverKind::Class);
        assert!(!r.has_resolved());
        assert_eq!(r.resolve(&c).stuff(), "stuff");
        assert!(r.has_resolved());
    }

    #[test]
    fn class_with_arguments() {
        let c = Container::new();
        let r = as_class_with::<Person, _>(|_| "Jack".to_string(), ResolverOptions::new());
        assert_eq!(r.resolve(&c).speak(), "I am Jack.");
    }

    #[test]
    fn class_singleton_and_transient_identity() {
        let c = Container::new();

        let single = as_class_with::<Person, _>(|_| "Jack".into(), ResolverOptions::new());
        assert!(Arc::ptr_eq(&single.resolve(&c), &single.resolve(&c)));

        let transient =
            as_class_with::<Person, _>(|_| "Jack".into(), ResolverOptions::new().transient());
        assert!(!Arc::ptr_eq(&transient.resolve(&c), &transient.resolve(&c)));

        let transient_repo = as_class::<Repo>(ResolverOptions::new().transient());
        assert!(!Arc::ptr_eq(&transient_repo.resolve(&c), &transient_repo.resolve(&c)));
    }

    #[test]
    fn options_are_carried() {
        let r = as_value(1u8, ResolverOptions::new().weight(-4).root());
        assert_eq!(r.weight(), -4);
        assert!(r.is_root());
        assert!(!r.has_disposer());

        let d = as_value(
            1u8,
            ResolverOptions::new().disposer(|_, _| async { Ok(()) }),
        );
        assert!(d.has_disposer());
        assert!(!d.is_root());
        assert_eq!(d.weight(), 0);
    }

    #[test]
    fn clones_share_identity_and_state() {
        let c = Container::new();
        let r = as_value(1u8, ResolverOptions::new());
        let clone = r.clone();
        assert_eq!(r.id(), clone.id());
        clone.resolve(&c);
        assert!(r.has_resolved());

        let other = as_value(1u8, ResolverOptions::new());
        assert_ne!(r.id(), other.id());
    }

    #[test]
    fn erased_dispose_without_disposer_is_none() {
        let c = Container::new();
        let r = as_function(|| 1u8, ResolverOptions::new());
        r.resolve(&c);
        assert!(r.erased().dispose(&c).is_none());
    }

    #[tokio::test]
    async fn disposer_runs_once_on_unproduced_singleton() {
        let c = Container::new();
        let made = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(AtomicU32::new(0));
        let r = as_function(
            {
                let made = made.clone();
                move || made.fetch_add(1, Ordering::SeqCst) + 40
            },
            ResolverOptions::new().disposer({
                let seen = seen.clone();
                move |value, _| {
                    seen.fetch_add(value, Ordering::SeqCst);
                    async { Ok(()) }
                }
            }),
        );

        r.erased().dispose(&c).unwrap().await.unwrap();
        assert_eq!(made.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 40);

        // the produced instance is the cached singleton
        assert_eq!(r.resolve(&c), 40);
        assert_eq!(made.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disposer_runs_once_on_unproduced_transient() {
        let c = Container::new();
        let calls = Arc::new(AtomicU32::new(0));
        let r = as_class::<Repo>(ResolverOptions::new().transient().disposer({
            let calls = calls.clone();
            move |repo: Arc<Repo>, _| {
                assert_eq!(repo.stuff(), "stuff");
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }
        }));

        r.erased().dispose(&c).unwrap().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disposer_receives_last_transient_value() {
        let c = Container::new();
        let seen = Arc::new(AtomicU32::new(0));
        let counter = AtomicU32::new(10);
        let r = as_function(
            move || counter.fetch_add(1, Ordering::SeqCst),
            ResolverOptions::new().transient().disposer({
                let seen = seen.clone();
                move |value, _| {
                    seen.store(value, Ordering::SeqCst);
                    async { Ok(()) }
                }
            }),
        );

        r.resolve(&c);
        r.resolve(&c);
        r.erased().dispose(&c).unwrap().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn injector_receives_container() {
        use crate::token::{TokenOptions, TokenRegistry};

        let tokens = TokenRegistry::new();
        let name = tokens.create::<String>("name", TokenOptions::default()).unwrap();
        let c = Container::new();
        c.register(&name, as_value("Bob".to_string(), ResolverOptions::new()));

        let person = as_class_with::<Person, _>(
            {
                let name = name.clone();
                move |c: &Container| c.resolve(&name).unwrap_or_default()
            },
            ResolverOptions::new(),
        );
        assert_eq!(person.resolve(&c).speak(), "I am Bob.");
    }

    #[test]
    fn debug_output() {
        let r = as_value(1u8, ResolverOptions::new().weight(2));
        let debug = format!("{r:?}");
        assert!(debug.contains("Resolver<u8>"));
        assert!(debug.contains("weight: 2"));
    }
}
