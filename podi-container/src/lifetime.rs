//! Resolver lifetimes.
//!
//! The lifetime decides whether a Function or Class resolver caches
//! what it produces:
//! - [`Lifetime::Singleton`] — produce once, hand out the same value after
//! - [`Lifetime::Transient`] — produce a fresh value on every resolve
//!
//! Value resolvers ignore the lifetime; their value already exists.
use std::fmt;

/// How long a produced value is reused.
///
/// # Examples
/// ```
/// use podi_container::lifetime::Lifetime;
///
/// assert_eq!(Lifetime::default(), Lifetime::Singleton);
/// assert!(Lifetime::Singleton.is_cached());
/// assert!(!Lifetime::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// The first produced value is cached inside the resolver.
    ///
    /// Combined with a `root` resolver this gives one instance for every
    /// scope of the container tree.
    #[default]
    Singleton,

    /// A new value on every resolve call. Never cached.
    Transient,
}

impl Lifetime {
    /// Returns `true` if produced values are reused.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}
