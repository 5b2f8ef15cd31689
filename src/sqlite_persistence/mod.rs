mod versioned_schema;

pub use versioned_schema::{Column, SqlType, Table, VersionedSchema};

/// Offset added to schema versions stored in `PRAGMA user_version`, so that a
/// database created by an unrelated tool is never mistaken for ours.
pub const BASE_DB_VERSION: usize = 7000;
