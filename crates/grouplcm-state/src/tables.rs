//! redb table definitions for the grouplcm object store.

use redb::TableDefinition;

/// Objects keyed by `{kind}/{namespace}/{name}`, JSON-serialized `Resource` values.
pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");

/// Store counters keyed by name.
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter key for uid allocation.
pub const UID_COUNTER: &str = "uid";
