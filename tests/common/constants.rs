//! Shared constants for end-to-end tests

/// User whose feed the tests write to
pub const TEST_USER: &str = "testuser";

/// User that never gets a feed
#[allow(dead_code)]
pub const UNKNOWN_USER: &str = "nobody";

/// Notification category used by the tests
#[allow(dead_code)]
pub const TEST_CATEGORY: &str = "new-follower";

/// Maximum time to wait for the server to answer /ping
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness polls
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Per-request timeout for the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
