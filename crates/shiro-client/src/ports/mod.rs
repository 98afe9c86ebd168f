//! Ports for the shiro client.
//!
//! - Inbound: the API callers drive ([`ShiroClient`] and its optional
//!   capabilities).
//! - Outbound: the in-process substrate the mock adapter drives.

pub mod inbound;
pub mod outbound;

pub use inbound::{HealthChecker, MockShiroClient, ShiroClient};
pub use outbound::{
    ConcreteRequestOptions, Substrate, SubstrateBlock, SubstrateError, SubstrateResponse,
    SubstrateTransaction,
};
