//! grouplcmd: the grouplcm daemon and its offline tools.
//!
//! - **`commands::run`**: open the store, load manifests, run the controller
//! - **`commands::plan`**: dry-run a group manifest and print what it derives
//! - **`commands::list`**: dump stored objects
//! - **`manifests`**: load `*.json` manifests from a directory tree
//! - **`telemetry`**: tracing subscriber setup from `[log]`

pub mod commands;
pub mod manifests;
pub mod telemetry;
