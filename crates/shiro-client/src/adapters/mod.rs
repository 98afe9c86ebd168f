//! Adapters implementing the client API.
//!
//! - `rpc`: JSON-RPC gateway over HTTP
//! - `mock`: in-process substrate hosting a mock ledger
//! - `sync`: decorator serializing every operation on a client

pub mod mock;
pub mod rpc;
pub mod sync;

pub use mock::{flatten, MockClient, MockOptions, DEFAULT_MOCK_PHYLUM};
pub use rpc::RpcClient;
pub use sync::SyncClient;
