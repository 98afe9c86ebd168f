//! Shared test infrastructure.

pub mod gateway;
pub mod ledger;

use std::sync::Arc;

use parking_lot::Mutex;
use shiro_client::{Config, MockClient, MockOptions};

pub use gateway::GatewayStub;
pub use ledger::BatchLedger;

/// Settable "now" handed to clients through a timestamp generator.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<String>>,
}

impl TestClock {
    pub fn new(start: &str) -> Self {
        Self {
            now: Arc::new(Mutex::new(start.to_string())),
        }
    }

    pub fn set(&self, now: &str) {
        *self.now.lock() = now.to_string();
    }

    pub fn config(&self) -> Config {
        let now = self.now.clone();
        Config::timestamp_generator(move || now.lock().clone())
    }
}

/// Mock client on a fresh [`BatchLedger`], phylum already installed.
pub async fn mock_client(base_configs: Vec<Config>) -> (Arc<BatchLedger>, MockClient) {
    shiro_telemetry::init_test_logging();
    let ledger = Arc::new(BatchLedger::new());
    let client = MockClient::new(ledger.clone(), base_configs, MockOptions::default())
        .await
        .expect("mock client");
    shiro_client::ShiroClient::init(
        &client,
        &shiro_client::encode_phylum_bytes(b"(batch-phylum)"),
        &[],
    )
    .await
    .expect("install phylum");
    (ledger, client)
}
