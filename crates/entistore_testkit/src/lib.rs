//! # EntiStore Testkit
//!
//! Test utilities for EntiStore.
//!
//! This crate provides:
//! - Test fixtures: a sample entity model and ready-made stores over the
//!   memory and log adapters
//! - Property-based test generators using proptest
//! - A conformance suite every storage adapter must pass
//! - Concurrent stress runs checking that no update is lost
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entistore_testkit::prelude::*;
//!
//! #[test]
//! fn my_adapter_conforms() {
//!     let store = TestStore::log();
//!     conformance::run_all(&store);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
