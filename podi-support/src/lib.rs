//! # Podi Support
//!
//! Shared utilities for the Podi DI crates.
//!
//! This crate provides:
//! - A monotonic clock used to order registrations
//! - Text rendering for diagnostics

pub mod clock;
pub mod rendering;
