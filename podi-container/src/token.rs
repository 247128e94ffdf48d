//! Typed registration tokens.
//!
//! A [`Token<T>`] names a registration slot whose resolvers produce `T`.
//! Tokens come in two flavours:
//!
//! - **canonical** — the identity is derived from the name (and `T`), so
//!   independently created tokens with the same name address the same
//!   slot. A [`TokenRegistry`] makes sure each canonical name is claimed
//!   only once.
//! - **unique** — every construction mints a fresh identity; the name is
//!   only a label.

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::trace;

use podi_support::rendering::short_type_name;

use crate::error::{DuplicateTokenNameError, PodiError, Result};

static NEXT_UNIQUE: AtomicU64 = AtomicU64::new(1);

static GLOBAL_TOKENS: Lazy<TokenRegistry> = Lazy::new(TokenRegistry::new);

/// Identity of a token, used as the key of a container's registration map.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenKey(Identity);

#[derive(Clone, PartialEq, Eq, Hash)]
enum Identity {
    Canonical { name: Arc<str>, type_id: TypeId },
    Unique(u64),
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Identity::Canonical { name, .. } => write!(f, "TokenKey({name:?})"),
            Identity::Unique(id) => write!(f, "TokenKey(#{id})"),
        }
    }
}

/// Options accepted by [`TokenRegistry::create`].
///
/// ```
/// use podi_container::token::TokenOptions;
///
/// let opts = TokenOptions::default().unique().multiton();
/// assert!(opts.unique && opts.multiton);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenOptions {
    /// Mint a fresh identity instead of deriving one from the name.
    pub unique: bool,
    /// The token is expected to carry more than one registration.
    ///
    /// Advisory only; containers never enforce it.
    pub multiton: bool,
}

impl TokenOptions {
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn multiton(mut self) -> Self {
        self.multiton = true;
        self
    }
}

/// A typed key for registering and resolving values of type `T`.
///
/// Cloning is cheap and clones compare equal.
pub struct Token<T> {
    key: TokenKey,
    name: Arc<str>,
    multiton: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Token<T> {
    fn canonical(name: &str, multiton: bool) -> Self {
        let name: Arc<str> = Arc::from(name);
        Self {
            key: TokenKey(Identity::Canonical {
                name: name.clone(),
                type_id: TypeId::of::<T>(),
            }),
            name,
            multiton,
            _marker: PhantomData,
        }
    }

    fn unique(name: &str, multiton: bool) -> Self {
        let id = NEXT_UNIQUE.fetch_add(1, Ordering::Relaxed);
        Self {
            key: TokenKey(Identity::Unique(id)),
            name: Arc::from(name),
            multiton,
            _marker: PhantomData,
        }
    }
}

impl<T> Token<T> {
    /// The identity used as registration-map key.
    #[inline]
    pub fn key(&self) -> &TokenKey {
        &self.key
    }

    /// The name the token was created with.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_multiton(&self) -> bool {
        self.multiton
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        matches!(self.key.0, Identity::Unique(_))
    }
}

impl<T> Clone for Token<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            name: self.name.clone(),
            multiton: self.multiton,
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Token<T> {}

impl<T> Hash for Token<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token<{}>({:?})", short_type_name::<T>(), self.name)
    }
}

impl<T> fmt::Display for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key.0 {
            Identity::Canonical { .. } => write!(f, "{}", self.name),
            Identity::Unique(id) => write!(f, "{}#{id}", self.name),
        }
    }
}

/// Tracks which canonical token names have been claimed.
///
/// Most applications use the process-wide [`TokenRegistry::global`]
/// through [`create_token`]. Tests create their own registry so that
/// name claims do not leak between them.
///
/// # Examples
/// ```
/// use podi_container::token::{TokenOptions, TokenRegistry};
///
/// let tokens = TokenRegistry::new();
/// let db = tokens.create::<String>("database", TokenOptions::default()).unwrap();
/// assert_eq!(db.name(), "database");
///
/// // Second canonical claim of the same name fails...
/// assert!(tokens.create::<String>("database", TokenOptions::default()).is_err());
/// // ...but unique tokens never collide.
/// assert!(tokens.create::<String>("database", TokenOptions::default().unique()).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct TokenRegistry {
    names: Mutex<HashSet<String>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry. Lives for the whole process and is never
    /// reset implicitly.
    pub fn global() -> &'static TokenRegistry {
        &GLOBAL_TOKENS
    }

    /// Creates a token named `name`.
    ///
    /// # Errors
    /// Returns [`PodiError::DuplicateTokenName`] if `options.unique` is false
    /// and `name` was already claimed in this registry.
    pub fn create<T: 'static>(&self, name: &str, options: TokenOptions) -> Result<Token<T>> {
        if options.unique {
            let token = Token::unique(name, options.multiton);
            trace!(token = %token, "Created unique token");
            return Ok(token);
        }

        let mut names = self.names.lock();
        if names.contains(name) {
            return Err(PodiError::DuplicateTokenName(DuplicateTokenNameError {
                name: name.to_owned(),
            }));
        }
        names.insert(name.to_owned());

        trace!(token = name, "Created canonical token");
        Ok(Token::canonical(name, options.multiton))
    }

    /// Returns true if `name` has been claimed by a canonical token.
    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    /// Number of claimed canonical names.
    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }

    /// Forgets every claimed name. Meant for test isolation.
    pub fn reset(&self) {
        self.names.lock().clear();
    }
}

/// Creates a token in the [global registry](TokenRegistry::global).
///
/// ```
/// use podi_container::token::{create_token, TokenOptions};
///
/// let token = create_token::<u16>("http_port_doc", TokenOptions::default()).unwrap();
/// assert!(!token.is_unique());
/// ```
pub fn create_token<T: 'static>(name: &str, options: TokenOptions) -> Result<Token<T>> {
    TokenRegistry::global().create(name, options)
}
