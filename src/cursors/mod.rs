//! Per-user read cursors (last-seen watermarks)

mod store;

pub use store::{is_valid_cursor_name, CursorObject, CursorStore, DEFAULT_CURSOR, NAMESPACE};
