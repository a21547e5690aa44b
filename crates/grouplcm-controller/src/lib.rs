//! grouplcm-controller: keeps groups reconciled as the store changes.
//!
//! Watches store change events, maps each event to the group that should be
//! reconciled and feeds the key to a pool of workers through a
//! deduplicating work queue. Failed passes are retried with exponential
//! backoff; a successful pass clears the group's failure count.
//!
//! # Architecture
//!
//! ```text
//! StateStore ── events ──▶ Controller ──▶ WorkQueue ──▶ worker × N
//!     ▲                                                    │
//!     └──────────── Reconciler (get / create) ◀────────────┘
//! ```

pub mod error;
pub mod queue;
pub mod runner;

pub use error::{ControllerError, ControllerResult};
pub use queue::WorkQueue;
pub use runner::{Controller, group_for_event};
