//! redb table definitions for the Shoal snapshot store.
//!
//! Keys are application ids (`app_<ulid>`); values are JSON-serialized
//! [`Application`](crate::Application) snapshots.

use redb::TableDefinition;

/// Application snapshots keyed by `{app_id}`.
pub const APPLICATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("applications");
