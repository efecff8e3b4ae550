//! Shared constants for integration tests

/// User every test center is bound to
pub const TEST_USER: &str = "tenant-42";

/// Deployment tag of the test collection
pub const TEST_ENVIRONMENT: &str = "test";

/// Retention cap used by test stores
pub const TEST_RETENTION_CAP: usize = 100;
