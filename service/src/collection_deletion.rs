//! Emptying a collection in bounded batches.
//!
//! The work runs as a pipeline of steps over a `DeletionContext`:
//! validate settings, connect to the store (unless one was injected) and
//! drain the collection. The drain loop itself lives in `drain` and can be
//! used directly with any `DocumentStoreOps`.

pub mod context;
pub mod drain;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod steps;
