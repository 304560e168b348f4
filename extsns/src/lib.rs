//! # extsns
//!
//! Subscribes functions to externally owned topics declared as `externalSNS` events, and
//! compiles the permissions those topics need to invoke them.

#![deny(missing_docs)]

pub use extsns_core::*;

#[cfg(feature = "in-memory")]
/// In-memory platform for tests and local development.
pub mod mem {
    //! Contains the in-memory platform transport and status sink.
    pub use extsns_mem::*;
}

pub mod prelude {
    //! The prelude module for the `extsns` crate.
    pub use extsns_core::prelude::*;

    #[cfg(feature = "in-memory")]
    pub use super::mem::*;
}
