//! Provider trait — a module of related registrations.
//!
//! Providers group registrations by concern so that the composition root
//! stays readable:
//!
//! ```rust
//! use podi_container::prelude::*;
//!
//! struct SettingsProvider {
//!     port: Token<u16>,
//! }
//!
//! impl Provider for SettingsProvider {
//!     fn register(&self, container: &Container) {
//!         container.register(&self.port, as_value(8080, ResolverOptions::new()));
//!     }
//! }
//!
//! let tokens = TokenRegistry::new();
//! let port = tokens.create::<u16>("port", TokenOptions::default()).unwrap();
//!
//! let container = Container::new();
//! container.add_provider(&SettingsProvider { port: port.clone() });
//! assert_eq!(container.resolve(&port), Some(8080));
//! ```

use crate::container::Container;

/// A module that registers related resolvers into a container.
pub trait Provider: Send + Sync {
    /// Registers this provider's resolvers.
    fn register(&self, container: &Container);

    /// Human-readable name, used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
