//! grouplcm-core: shared object model for the grouplcm controller.
//!
//! # Components
//!
//! - **`object`**: Generic resource envelope (`Resource`, `ObjectMeta`,
//!   `OwnerReference`, `ObjectKey`) and the API group/kind constants
//! - **`types`**: Desired-state kinds (`Group`, `Site`)
//! - **`names`**: RFC 1123 name validation
//! - **`config`**: `grouplcm.toml` parsing

pub mod config;
pub mod names;
pub mod object;
pub mod types;

pub use config::LcmConfig;
pub use names::NameError;
pub use object::*;
pub use types::*;
