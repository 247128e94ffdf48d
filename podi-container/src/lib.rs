//! Core container implementation for Podi DI.

pub mod config;
pub mod container;
pub mod dispose;
pub mod error;
pub mod global;
pub mod lifetime;
pub mod provider;
pub(crate) mod registration;
pub mod resolver;
pub mod token;

pub use config::{ContainerConfig, UnregisterPolicy};
pub use container::{Container, ResolveOptions, create_container, prelude};
pub use error::{PodiError, Result};
pub use global::global;
pub use resolver::Resolver;
pub use token::{Token, TokenRegistry, create_token};
