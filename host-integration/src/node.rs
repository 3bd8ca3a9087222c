use crate::app::{
    InMemoryMempool, JsonCodec, RecordingPeerMonitor, StaticFeeMatcher, StubVerifier,
    TestChainDatabase, TestHandlerRegistry, TestWalletManager,
};
use crate::config::HostProcessorConfig;
use admission_processor::{spawn_processor, Collaborators, FinishedJobResult, ProcessorHandle};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A fully wired processor over in-memory collaborators. Tests script the
/// collaborators directly and drive the processor through `handle`.
pub struct TestNode {
    pub handle: ProcessorHandle,
    pub mempool: Arc<InMemoryMempool>,
    pub wallets: Arc<TestWalletManager>,
    pub database: Arc<TestChainDatabase>,
    pub handlers: Arc<TestHandlerRegistry>,
    pub fees: Arc<StaticFeeMatcher>,
    pub peers: Arc<RecordingPeerMonitor>,
    pub codec: Arc<JsonCodec>,
    pub verifier: Arc<StubVerifier>,
}

impl TestNode {
    pub async fn new(config: HostProcessorConfig) -> Self {
        let mempool = InMemoryMempool::new();
        let wallets = TestWalletManager::new(config.wallet_balance);
        let database = TestChainDatabase::new();
        let handlers = TestHandlerRegistry::new();
        let fees = StaticFeeMatcher::new();
        let peers = RecordingPeerMonitor::new();
        let codec = JsonCodec::new();
        let verifier = StubVerifier::new();

        let collaborators = Collaborators {
            mempool: mempool.clone(),
            wallets: wallets.clone(),
            database: database.clone(),
            handlers: handlers.clone(),
            fees: fees.clone(),
            peers: peers.clone(),
            codec: codec.clone(),
            verifier: verifier.clone(),
        };

        let handle = spawn_processor(
            collaborators,
            config.processor,
            tracing::Span::current(),
        )
        .await
        .unwrap();

        Self {
            handle,
            mempool,
            wallets,
            database,
            handlers,
            fees,
            peers,
            codec,
            verifier,
        }
    }

    /// Polls until the ticket is processed; panics after five seconds.
    pub async fn wait_processed(&self, ticket_id: Uuid) -> FinishedJobResult {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = self.handle.processed_ticket(ticket_id).await.unwrap() {
                return result;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "ticket {ticket_id} was never processed"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Polls until the ticket leaves the pending set; panics after five seconds.
    pub async fn wait_not_pending(&self, ticket_id: Uuid) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.handle.has_pending(ticket_id).await.unwrap() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "ticket {ticket_id} is still pending"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
