//! # The Container — heart of Podi
//!
//! A container maps tokens to registrations and resolves them. Containers
//! form a tree of scopes: a scope sees its own registrations first and
//! falls back to its ancestors.
//!
//! # Architecture
//! ```text
//!              root Container
//!              /            \
//!      create_scope()   create_scope()
//!            │                │
//!          scope            scope
//!            │
//!      create_scope()
//!            │
//!          scope
//! ```
//!
//! Lookup rules:
//! - `resolve`: nearest scope with a registration wins; inside it the
//!   newest registration among the highest weight wins.
//! - `resolve_all`: merges the whole chain and sorts by
//!   `(weight, registration time)`, so weight beats scope depth.
//! - `root` resolvers are always registered in the root container.
//!
//! # Examples
//! ```rust
//! use podi_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Database { url: String }
//!
//! struct UserService { db: Arc<Database> }
//!
//! impl Construct for UserService {
//!     type Args = Arc<Database>;
//!     fn construct(db: Arc<Database>) -> Self { UserService { db } }
//! }
//!
//! let tokens = TokenRegistry::new();
//! let db = tokens.create::<Arc<Database>>("db", TokenOptions::default()).unwrap();
//! let users = tokens.create::<Arc<UserService>>("users", TokenOptions::default()).unwrap();
//!
//! let container = Container::new();
//! container.register(&db, as_value(
//!     Arc::new(Database { url: "postgres://localhost".into() }),
//!     ResolverOptions::new(),
//! ));
//! container.register(&users, as_class_with::<UserService, _>(
//!     {
//!         let db = db.clone();
//!         move |c: &Container| c.resolve(&db).expect("database registered")
//!     },
//!     ResolverOptions::new(),
//! ));
//!
//! let scope = container.create_scope();
//! let service = scope.resolve(&users).unwrap();
//! assert_eq!(service.db.url, "postgres://localhost");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace};

use podi_support::rendering::render_path;

use crate::config::{ContainerConfig, UnregisterPolicy};
use crate::dispose::{DisposalReport, PendingDisposal, settle};
use crate::error::Result;
use crate::provider::Provider;
use crate::registration::{RegisteredResolver, Registration, sort_entries};
use crate::resolver::{Resolver, ResolverId};
use crate::token::{Token, TokenKey};

static NEXT_CONTAINER: AtomicU64 = AtomicU64::new(0);

/// Future returned by [`Container::unregister`], [`Container::unregister_resolver`]
/// and [`Container::dispose`].
///
/// Resolvers are detached as soon as the method is called; awaiting the
/// future waits for their disposers.
pub type Disposing = BoxFuture<'static, Result<DisposalReport>>;

/// Lookup options for `*_with` methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Only look at the container the call is made on.
    pub scoped: bool,
}

impl ResolveOptions {
    pub fn scoped() -> Self {
        Self { scoped: true }
    }
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Builds a [`Container`] with non-default configuration.
///
/// ```rust
/// use podi_container::prelude::*;
///
/// let container = Container::builder()
///     .unregister_policy(UnregisterPolicy::CascadeRoot)
///     .build();
/// assert_eq!(container.config().unregister_policy, UnregisterPolicy::CascadeRoot);
/// ```
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    parent: Option<Container>,
}

impl ContainerBuilder {
    pub fn unregister_policy(mut self, policy: UnregisterPolicy) -> Self {
        self.config.unregister_policy = policy;
        self
    }

    /// Makes the built container a scope of `parent`.
    pub fn parent(mut self, parent: &Container) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn build(self) -> Container {
        Container::from_parts(self.parent, self.config)
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

struct ContainerInner {
    id: u64,
    parent: Option<Container>,
    config: ContainerConfig,
    registrations: RwLock<HashMap<TokenKey, Arc<Registration>>>,
}

/// A node in the scope tree.
///
/// Cloning is cheap and yields a handle to the same container; equality
/// is identity.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Creates a root container with default configuration.
    pub fn new() -> Self {
        Self::from_parts(None, ContainerConfig::default())
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    fn from_parts(parent: Option<Container>, config: ContainerConfig) -> Self {
        let id = NEXT_CONTAINER.fetch_add(1, Ordering::Relaxed);
        debug!(
            container = id,
            parent = parent.as_ref().map(Container::id),
            policy = %config.unregister_policy,
            "Created container"
        );
        Self {
            inner: Arc::new(ContainerInner {
                id,
                parent,
                config,
                registrations: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Process-unique id, used in logs.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    #[inline]
    pub fn parent_container(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// The outermost ancestor (or `self` for a root).
    pub fn root_container(&self) -> Container {
        let mut current = self;
        while let Some(parent) = current.parent_container() {
            current = parent;
        }
        current.clone()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Number of ancestors; `0` for a root.
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// Creates a child scope inheriting this container's configuration.
    pub fn create_scope(&self) -> Container {
        Self::from_parts(Some(self.clone()), self.inner.config)
    }

    /// Number of tokens registered locally.
    pub fn len(&self) -> usize {
        self.inner.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registrations.read().is_empty()
    }

    // ── Registration ──

    /// The container `register` will put `resolver` into: the root for
    /// `root` resolvers, `self` otherwise.
    pub fn registration_target<R>(&self, resolver: &Resolver<R>) -> Container
    where
        R: Clone + Send + Sync + 'static,
    {
        if resolver.is_root() {
            self.root_container()
        } else {
            self.clone()
        }
    }

    /// Registers `resolver` for `token`.
    ///
    /// Registering the same resolver twice in one container is a no-op.
    /// Multiple different resolvers per token are always accepted; the
    /// token's `multiton` flag is advisory.
    pub fn register<T>(&self, token: &Token<T>, resolver: Resolver<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let target = self.registration_target(&resolver);
        if target != *self {
            debug!(
                token = %token,
                from = self.id(),
                to = target.id(),
                "Redirecting root resolver"
            );
        }
        target.register_local(token.key(), &resolver);
        debug!(
            token = %token,
            container = target.id(),
            resolver = %resolver.id(),
            kind = %resolver.kind(),
            weight = resolver.weight(),
            "Registered resolver"
        );
    }

    fn register_local<R>(&self, key: &TokenKey, resolver: &Resolver<R>)
    where
        R: Clone + Send + Sync + 'static,
    {
        let mut registrations = self.inner.registrations.write();
        registrations
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Registration::new()))
            .set(resolver.erased());
    }

    /// Adds every registration of `provider`.
    pub fn add_provider(&self, provider: &dyn Provider) -> &Self {
        debug!(provider = provider.name(), container = self.id(), "Adding provider");
        provider.register(self);
        self
    }

    // ── Unregistration ──

    /// Removes every local registration of `token` and disposes them.
    ///
    /// Ancestors and scopes are untouched. If nothing was registered the
    /// report is a no-op (`removed == 0`).
    pub fn unregister<T>(&self, token: &Token<T>) -> Disposing {
        let removed = self.inner.registrations.write().remove(token.key());

        let Some(registration) = removed else {
            trace!(token = %token, container = self.id(), "Nothing to unregister");
            return settle(Vec::new()).boxed();
        };

        let pending = registration.clear(self);
        debug!(
            token = %token,
            container = self.id(),
            resolvers = pending.len(),
            "Unregistered token"
        );
        settle(pending).boxed()
    }

    /// Removes one resolver (by identity) and runs its disposer.
    ///
    /// Strictly local under [`UnregisterPolicy::Local`]. Under
    /// [`UnregisterPolicy::CascadeRoot`] a `root` resolver is also removed
    /// from the ancestors.
    pub fn unregister_resolver<T>(&self, token: &Token<T>, resolver: &Resolver<T>) -> Disposing
    where
        T: Clone + Send + Sync + 'static,
    {
        let cascade = resolver.is_root()
            && self.inner.config.unregister_policy == UnregisterPolicy::CascadeRoot;

        let pending: Vec<PendingDisposal> = if cascade {
            self.ancestors()
                .filter_map(|c| c.detach(token.key(), resolver.id()))
                .collect()
        } else {
            self.detach(token.key(), resolver.id()).into_iter().collect()
        };

        debug!(
            token = %token,
            container = self.id(),
            resolver = %resolver.id(),
            cascade,
            removed = pending.len(),
            "Unregistered resolver"
        );
        settle(pending).boxed()
    }

    /// Removes one resolver from the local registration, pruning the
    /// registration once it is empty.
    fn detach(&self, key: &TokenKey, id: ResolverId) -> Option<PendingDisposal> {
        let registration = self.local(key)?;
        let pending = registration.delete(id, self);

        if registration.is_empty() {
            let mut registrations = self.inner.registrations.write();
            let still_ours = registrations
                .get(key)
                .is_some_and(|r| Arc::ptr_eq(r, &registration));
            if still_ours && registration.is_empty() {
                registrations.remove(key);
            }
        }
        pending
    }

    // ── Resolution ──

    /// Resolves `token`, falling back to ancestors.
    ///
    /// `None` if no container in the chain has a registration.
    pub fn resolve<T>(&self, token: &Token<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.resolve_with(token, ResolveOptions::default())
    }

    /// Resolves `token`; with `scoped` set only this container is consulted.
    ///
    /// `scoped` is not passed on: once a lookup moves to the parent, the
    /// parent applies its own normal fallback.
    pub fn resolve_with<T>(&self, token: &Token<T>, options: ResolveOptions) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        trace!(token = %token, container = self.id(), scoped = options.scoped, "Resolving");

        if let Some(registration) = self.local(token.key()) {
            return registration.get(self).and_then(downcast::<T>);
        }
        if options.scoped {
            return None;
        }
        self.parent_container()?.resolve(token)
    }

    /// Resolves every registration of `token` across the scope chain,
    /// ordered by `(weight, registration time)`.
    pub fn resolve_all<T>(&self, token: &Token<T>) -> Vec<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.resolve_all_with(token, ResolveOptions::default())
    }

    /// Like [`resolve_all`](Self::resolve_all); with `scoped` set only the
    /// local registrations are resolved.
    pub fn resolve_all_with<T>(&self, token: &Token<T>, options: ResolveOptions) -> Vec<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        trace!(token = %token, container = self.id(), scoped = options.scoped, "Resolving all");

        if options.scoped || self.is_root() {
            return self
                .local(token.key())
                .map(|r| r.get_all(self))
                .unwrap_or_default()
                .into_iter()
                .filter_map(downcast::<T>)
                .collect();
        }

        let mut entries: Vec<RegisteredResolver> = self
            .ancestors()
            .filter_map(|c| c.local(token.key()))
            .flat_map(|r| r.entries())
            .collect();
        sort_entries(&mut entries);

        entries
            .iter()
            .filter_map(|e| downcast::<T>(e.resolver.resolve_any(self)))
            .collect()
    }

    pub fn has_registration<T>(&self, token: &Token<T>) -> bool {
        self.has_registration_with(token, ResolveOptions::default())
    }

    /// True if `token` is registered here, or, unless `scoped`, in an
    /// ancestor.
    pub fn has_registration_with<T>(&self, token: &Token<T>, options: ResolveOptions) -> bool {
        if self.inner.registrations.read().contains_key(token.key()) {
            return true;
        }
        if options.scoped {
            return false;
        }
        self.parent_container()
            .is_some_and(|parent| parent.has_registration(token))
    }

    pub fn has_resolved<T>(&self, token: &Token<T>) -> bool {
        self.has_resolved_with(token, ResolveOptions::default())
    }

    /// True if a registration of `token` has been resolved at least once,
    /// here or, unless `scoped`, in an ancestor.
    pub fn has_resolved_with<T>(&self, token: &Token<T>, options: ResolveOptions) -> bool {
        if self.local(token.key()).is_some_and(|r| r.has_resolved()) {
            return true;
        }
        if options.scoped {
            return false;
        }
        self.parent_container()
            .is_some_and(|parent| parent.has_resolved(token))
    }

    // ── Disposal ──

    /// Clears every local registration and runs all disposers concurrently.
    ///
    /// The map is emptied before any disposer starts, so lookups made while
    /// disposal is in flight see nothing registered here. Scopes and
    /// ancestors are untouched.
    #[instrument(skip(self), fields(container = self.id()), name = "container_dispose")]
    pub fn dispose(&self) -> Disposing {
        let drained = std::mem::take(&mut *self.inner.registrations.write());
        info!(tokens = drained.len(), "Disposing container");

        let pending: Vec<PendingDisposal> = drained
            .into_values()
            .flat_map(|registration| registration.clear(self))
            .collect();
        settle(pending).boxed()
    }

    // ── Internal ──

    fn local(&self, key: &TokenKey) -> Option<Arc<Registration>> {
        self.inner.registrations.read().get(key).cloned()
    }

    /// `self`, then each parent up to the root.
    fn ancestors(&self) -> impl Iterator<Item = &Container> {
        std::iter::successors(Some(self), |c| c.parent_container())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id())
            .field("depth", &self.depth())
            .field("registered", &self.len())
            .finish()
    }
}

/// Renders the scope path from the root, e.g. `#0 → #3 → #7`.
impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path: Vec<String> = self.ancestors().map(|c| format!("#{}", c.id())).collect();
        path.reverse();
        write!(f, "{}", render_path(&path))
    }
}

/// Creates a root container, or a scope of `parent`.
pub fn create_container(parent: Option<&Container>) -> Container {
    match parent {
        Some(parent) => parent.create_scope(),
        None => Container::new(),
    }
}

fn downcast<T: 'static>(value: Box<dyn Any + Send + Sync>) -> Option<T> {
    value.downcast::<T>().map(|boxed| *boxed).ok()
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, Disposing, ResolveOptions, create_container};
    pub use crate::config::{ContainerConfig, UnregisterPolicy};
    pub use crate::dispose::{Disposal, DisposalReport};
    pub use crate::error::{BoxError, PodiError, Result};
    pub use crate::global::global;
    pub use crate::lifetime::Lifetime;
    pub use crate::provider::Provider;
    pub use crate::resolver::{
        Construct, Resolver, ResolverId, ResolverKind, ResolverOptions, as_class, as_class_with,
        as_function, as_function_with, as_value,
    };
    pub use crate::token::{Token, TokenOptions, TokenRegistry, create_token};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
