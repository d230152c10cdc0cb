//! Top-level facade crate for mantis.
//!
//! Re-exports the core types and the middleware library so users can depend
//! on a single crate.

pub mod core {
    pub use mantis_core::*;
}

pub mod middleware {
    pub use mantis_middleware::*;
}
