//! # extsns memory platform
//!
//! In-memory implementations of the platform transport and the status sink, primarily for
//! testing.
//!
//! ```ignore
//! use extsns_core::prelude::*;
//! use extsns_mem::{InMemoryPlatform, InMemoryStatusSink};
//!
//! let platform = InMemoryPlatform::new("us-east-1", "123456789012");
//! platform.add_function("svc-dev-worker").await;
//! platform.add_topic("orders").await;
//!
//! let reconciler = Reconciler::new(platform.clone(), InMemoryStatusSink::new(), DeploymentContext::new());
//! reconciler.subscribe(&FunctionDefinition::new("svc-dev-worker"), &"orders".into()).await?;
//! assert_eq!(platform.write_count().await, 1);
//! ```

#![deny(missing_docs)]

mod platform;
mod status;

pub use platform::*;
pub use status::*;
