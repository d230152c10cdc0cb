//! mantis core: credential, observation, and error types shared by the
//! instrumentation middleware and its delivery client.
//!
//! This crate carries no runtime or HTTP dependencies so the same types can
//! be used by the middleware, by standalone clients, and by tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Every fallible path surfaces as `MantisError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod auth;
pub mod error;
pub mod observation;

/// Shared result type.
pub use error::{MantisError, Result};
