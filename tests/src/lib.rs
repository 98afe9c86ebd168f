//! # Shiro Client Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures/         # Test infrastructure
//! │   ├── gateway.rs    # axum JSON-RPC gateway stub
//! │   └── ledger.rs     # In-memory substrate hosting a batch phylum
//! │
//! └── integration/      # End-to-end flows
//!     ├── rpc_client.rs
//!     ├── mock_client.rs
//!     ├── batch_driver.rs
//!     └── health.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p shiro-tests
//!
//! # By flow
//! cargo test -p shiro-tests integration::rpc_client::
//! cargo test -p shiro-tests integration::batch_driver::
//! ```

#![allow(dead_code)]

pub mod fixtures;
