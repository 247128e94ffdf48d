//! Process-wide default container.
//!
//! Convenient for applications with a single composition root. Libraries
//! and tests should create their own [`Container`] instead.

use once_cell::sync::Lazy;

use crate::container::Container;

static GLOBAL: Lazy<Container> = Lazy::new(Container::new);

/// The process-wide root container, created on first access.
///
/// ```
/// use podi_container::prelude::*;
///
/// assert!(global().is_root());
/// assert_eq!(global(), global());
/// ```
pub fn global() -> &'static Container {
    &GLOBAL
}
