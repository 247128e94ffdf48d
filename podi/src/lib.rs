//! # Podi — hierarchical dependency injection for Rust
//!
//! Typed [`Token`]s name dependencies, [`Resolver`]s produce them and
//! [`Container`]s wire the two together in a tree of scopes.
//!
//! ```rust
//! use podi::prelude::*;
//!
//! let tokens = TokenRegistry::new();
//! let greeting = tokens.create::<String>("greeting", TokenOptions::default()).unwrap();
//!
//! let root = Container::new();
//! root.register(&greeting, as_value("hello".to_string(), ResolverOptions::new()));
//!
//! let request = root.create_scope();
//! request.register(&greeting, as_value("hi".to_string(), ResolverOptions::new()));
//!
//! assert_eq!(request.resolve(&greeting).as_deref(), Some("hi"));
//! assert_eq!(request.resolve_all(&greeting), vec!["hello", "hi"]);
//! ```

pub use podi_container::*;
pub use podi_support::*;
