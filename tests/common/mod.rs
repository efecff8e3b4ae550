//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{local_store, remote_center, TestServer};
//!
//! #[tokio::test]
//! async fn test_save_over_http() {
//!     let server = TestServer::spawn().await;
//!     let remote = Arc::new(HttpRemoteStore::new(&server.base_url, TIMEOUT).unwrap());
//!     let center = remote_center(local_store(), remote);
//!     // ...
//! }
//! ```

#![allow(dead_code, unused_imports)]

mod constants;
mod fixtures;
mod server;

pub use constants::*;
pub use fixtures::{
    local_center, local_store, remote_center, settle, wait_until, RecordingSink,
};
pub use server::TestServer;
