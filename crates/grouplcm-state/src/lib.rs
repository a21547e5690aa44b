//! grouplcm-state: object store for the grouplcm controller.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for every object the controller reads or writes: `Group`
//! manifests and the placement rules, policies and bindings derived from
//! them.
//!
//! # Architecture
//!
//! Objects are JSON-serialized `Resource` envelopes stored under composite
//! keys (`{kind}/{namespace}/{name}`). The store assigns a uid on first
//! write. Deleting an object garbage-collects, transitively, every object
//! whose owner references carry its uid.
//!
//! Writes publish `ResourceEvent`s on a broadcast channel so a controller
//! can watch for changes.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Consumers that only need the
//! get/create boundary depend on the `ResourceStore` trait instead.

pub mod client;
pub mod error;
pub mod events;
pub mod store;
pub mod tables;

pub use client::{ResourceStore, set_controller_reference};
pub use error::{StateError, StateResult};
pub use events::{EventKind, ResourceEvent};
pub use store::StateStore;
