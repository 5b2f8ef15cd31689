//! SQLite schema for the sibling-keeping key-value backend.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// Per-namespace properties (only allow_multi for now).
const BUCKET_PROPERTIES_TABLE_V1: Table = Table {
    name: "bucket_properties",
    columns: &[
        sqlite_column!("namespace", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "allow_multi",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[],
};

/// One row per stored version. Several rows for the same (namespace, key)
/// are siblings.
const SIBLINGS_TABLE_V1: Table = Table {
    name: "siblings",
    columns: &[
        sqlite_column!(
            "version",
            &SqlType::Integer,
            is_primary_key = true,
            autoincrement = true
        ),
        sqlite_column!("namespace", &SqlType::Text, non_null = true),
        sqlite_column!("key", &SqlType::Text, non_null = true),
        sqlite_column!("value", &SqlType::Blob, non_null = true),
        sqlite_column!(
            "written_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("(cast(strftime('%s','now') as int))")
        ),
    ],
    indices: &[("idx_siblings_namespace_key", "namespace, key")],
};

pub const KV_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[BUCKET_PROPERTIES_TABLE_V1, SIBLINGS_TABLE_V1],
    migration: None,
}];
