//! Error types for Podi container operations.
//!
//! Only two things can go wrong in this layer: claiming a token name
//! twice, and a disposer failing. A missing registration is not an
//! error, resolves return `None` (or an empty `Vec`) instead.

use std::fmt;

use crate::resolver::ResolverId;

/// Boxed error returned by disposers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Podi operations.
#[derive(Debug, thiserror::Error)]
pub enum PodiError {
    /// A non-unique token name was claimed twice in the same registry.
    #[error("{}", .0)]
    DuplicateTokenName(DuplicateTokenNameError),

    /// A disposer returned an error while releasing a resolved value.
    ///
    /// Other disposers of the same batch still ran to completion.
    #[error("Disposer of resolver {resolver} failed: {source}")]
    DisposerFailed {
        resolver: ResolverId,
        #[source]
        source: BoxError,
    },
}

/// Error when a non-unique token name is already taken.
#[derive(Debug)]
pub struct DuplicateTokenNameError {
    /// The name that was requested again
    pub name: String,
}

impl fmt::Display for DuplicateTokenNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token name {:?} is already in use", self.name)?;
        write!(
            f,
            "\n  Hint: pick another name, or pass TokenOptions::default().unique()"
        )
    }
}

/// Convenient Result type for Podi operations.
pub type Result<T> = std::result::Result<T, PodiError>;
