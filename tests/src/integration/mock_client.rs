//! # Mock Client Against the In-Memory Ledger
//!
//! Exercises `MockClient` end to end: option flattening, phylum failures,
//! ledger queries and the mock lifecycle (creator, snapshot, close).

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::{json, Value};
    use shiro_client::{
        Config, MockClient, MockOptions, MockShiroClient, ShiroClient, ShiroError, SyncClient,
    };
    use tokio_test::{assert_err, assert_ok};

    use crate::fixtures::{mock_client, BatchLedger, TestClock};

    const TS001: &str = "2000-01-01T00:00:00-08:00";

    #[tokio::test]
    async fn test_call_flattens_options() {
        let clock = TestClock::new(TS001);
        let (ledger, client) = mock_client(vec![clock.config()]).await;

        let resp = client
            .call(
                "schedule_request_now",
                &[
                    Config::params(json!(["orders", "ping"])),
                    Config::transient_data("k", b"v".to_vec()),
                    Config::creator("Org1MSP"),
                    Config::DisableWritePolling(true),
                ],
            )
            .await
            .unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.transaction_id(), "tx-0002");

        let (method, cro) = ledger.calls().pop().unwrap();
        assert_eq!(method, "schedule_request_now");
        assert_eq!(cro.timestamp, TS001);
        assert_eq!(cro.params, br#"["orders","ping"]"#);
        assert_eq!(cro.transient["k"], b"v");
        assert_eq!(cro.creator, "Org1MSP");
        assert!(cro.disable_write_polling);
    }

    #[tokio::test]
    async fn test_default_timestamp_is_utc_now() {
        let (ledger, client) = mock_client(Vec::new()).await;
        assert_ok!(client.call("get_recent_input", &[]).await);

        let (_, cro) = ledger.calls().pop().unwrap();
        assert!(cro.timestamp.ends_with('Z'), "{}", cro.timestamp);
        let parsed = chrono::DateTime::parse_from_rfc3339(&cro.timestamp).unwrap();
        let age = chrono::Utc::now().signed_duration_since(parsed);
        assert!(age.num_seconds().abs() < 60);
    }

    #[tokio::test]
    async fn test_phylum_failure_is_a_response() {
        let (_, client) = mock_client(Vec::new()).await;
        let resp = client
            .call("fail", &[Config::params(json!([42, "no such order"]))])
            .await
            .unwrap();
        let err = resp.error().unwrap();
        assert_eq!(err.code, 42);
        assert_eq!(err.message, "no such order");
        assert_eq!(
            serde_json::from_slice::<Value>(err.data_json()).unwrap(),
            json!({"method": "fail"})
        );
    }

    #[tokio::test]
    async fn test_seed_is_unsupported_and_phylum_name_is_reported() {
        let (_, client) = mock_client(Vec::new()).await;
        let err = assert_err!(client.seed("v1", &[]).await);
        assert!(matches!(err, ShiroError::Unsupported { op: "Seed" }));
        assert_eq!(client.shiro_phylum(&[]).await.unwrap(), "test");
    }

    #[tokio::test]
    async fn test_query_info_and_block() {
        let (_, client) = mock_client(Vec::new()).await;
        client
            .call(
                "schedule_request_now",
                &[Config::params(json!(["orders", "ping"]))],
            )
            .await
            .unwrap();

        let height = client.query_info(&[]).await.unwrap();
        assert_eq!(height, 2);

        let block = client.query_block(height, &[]).await.unwrap();
        assert_eq!(block.hash, "hash-0002");
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].id, "tx-0002");
        assert_eq!(block.transactions[0].event, br#"{"block":2}"#);

        let err = client.query_block(99, &[]).await.unwrap_err();
        assert!(matches!(err, ShiroError::Substrate(_)));
    }

    #[tokio::test]
    async fn test_creator_snapshot_and_close() {
        let clock = TestClock::new(TS001);
        let (ledger, client) = mock_client(vec![clock.config()]).await;

        let mut attributes = BTreeMap::new();
        attributes.insert("role".to_string(), "auditor".to_string());
        client
            .set_creator_with_attributes("alice", &attributes)
            .await
            .unwrap();
        assert_eq!(
            ledger.creator(client.tag()),
            Some(("alice".to_string(), attributes))
        );

        client
            .call(
                "schedule_request",
                &[Config::params(json!([
                    "orders",
                    "later",
                    "2000-01-05T00:00:00Z"
                ]))],
            )
            .await
            .unwrap();

        let mut snapshot = Vec::new();
        client.snapshot(&mut snapshot).await.unwrap();
        assert!(!snapshot.is_empty());

        client.close().await.unwrap();
        assert!(!ledger.is_open(client.tag()));
        assert!(client.call("get_recent_input", &[]).await.is_err());

        // the restored ledger still holds the pending request
        let options = MockOptions::default()
            .with_snapshot_reader(snapshot.as_slice())
            .await
            .unwrap();
        let restored = MockClient::new(ledger.clone(), vec![clock.config()], options)
            .await
            .unwrap();
        assert_ne!(restored.tag(), client.tag());
        clock.set("2000-01-06T00:00:00Z");
        let pending = restored
            .call("batch_get_requests", &[Config::params(json!(["orders"]))])
            .await
            .unwrap();
        let pending: Vec<Value> = pending.decode().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["message"], "later");
    }

    #[tokio::test]
    async fn test_sync_client_wraps_mock() {
        let (_, client) = mock_client(Vec::new()).await;
        let client = Arc::new(SyncClient::new(client));

        let mut handles = Vec::new();
        for i in 0..4 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client
                    .call(
                        "schedule_request_now",
                        &[Config::params(json!(["orders", format!("ping{}", i)]))],
                    )
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_success());
        }
        assert_eq!(client.query_info(&[]).await.unwrap(), 5);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_substrate_health_probe_mismatch_is_rejected() {
        struct BadEcho(BatchLedger);

        #[async_trait::async_trait]
        impl shiro_client::Substrate for BadEcho {
            async fn health_check(
                &self,
                nonce: u64,
            ) -> Result<u64, shiro_client::ports::SubstrateError> {
                Ok(nonce.wrapping_add(1))
            }
            async fn new_mock_from(
                &self,
                name: &str,
                version: &str,
                snapshot: &[u8],
            ) -> Result<String, shiro_client::ports::SubstrateError> {
                self.0.new_mock_from(name, version, snapshot).await
            }
            async fn set_creator_with_attributes_mock(
                &self,
                tag: &str,
                creator: &str,
                attributes: &BTreeMap<String, String>,
            ) -> Result<(), shiro_client::ports::SubstrateError> {
                self.0
                    .set_creator_with_attributes_mock(tag, creator, attributes)
                    .await
            }
            async fn snapshot_mock(
                &self,
                tag: &str,
            ) -> Result<Vec<u8>, shiro_client::ports::SubstrateError> {
                self.0.snapshot_mock(tag).await
            }
            async fn close_mock(&self, tag: &str) -> Result<(), shiro_client::ports::SubstrateError> {
                self.0.close_mock(tag).await
            }
            async fn init(
                &self,
                tag: &str,
                phylum: &str,
                options: &shiro_client::ports::ConcreteRequestOptions,
            ) -> Result<(), shiro_client::ports::SubstrateError> {
                self.0.init(tag, phylum, options).await
            }
            async fn call(
                &self,
                tag: &str,
                method: &str,
                options: &shiro_client::ports::ConcreteRequestOptions,
            ) -> Result<shiro_client::ports::SubstrateResponse, shiro_client::ports::SubstrateError>
            {
                self.0.call(tag, method, options).await
            }
            async fn query_info(
                &self,
                tag: &str,
                options: &shiro_client::ports::ConcreteRequestOptions,
            ) -> Result<u64, shiro_client::ports::SubstrateError> {
                self.0.query_info(tag, options).await
            }
            async fn query_block(
                &self,
                tag: &str,
                block_number: u64,
                options: &shiro_client::ports::ConcreteRequestOptions,
            ) -> Result<shiro_client::ports::SubstrateBlock, shiro_client::ports::SubstrateError>
            {
                self.0.query_block(tag, block_number, options).await
            }
        }

        let result = MockClient::new(
            Arc::new(BadEcho(BatchLedger::new())),
            Vec::new(),
            MockOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(ShiroError::Substrate(_))));
    }
}
