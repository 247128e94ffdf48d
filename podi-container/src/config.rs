//! Container configuration.
//!
//! Set once through [`Container::builder()`](crate::container::Container::builder)
//! and inherited by every scope created from that container.

use std::fmt;

/// How far `unregister_resolver` reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UnregisterPolicy {
    /// Only the container the call is made on.
    #[default]
    Local,

    /// Like `Local`, but a `root` resolver is also removed from every
    /// ancestor, which is where root resolvers are registered.
    CascadeRoot,
}

impl fmt::Display for UnregisterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnregisterPolicy::Local => write!(f, "local"),
            UnregisterPolicy::CascadeRoot => write!(f, "cascade-root"),
        }
    }
}

/// Settings shared by a container and its scopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    pub unregister_policy: UnregisterPolicy,
}
