pub mod error;
pub mod pipeline;
pub mod processor;
pub mod types;
pub mod worker;

pub use error::{ErrorKind, ProcessorError, TxError};
pub use processor::{spawn_processor, Processor, ProcessorConfig, ProcessorHandle, ProcessorMsg};
pub use types::job::{FinishedJobResult, PendingJobResult, ValidTx, VerifiedBatch, VerifierBatch};
pub use types::tx::{ParsedTx, PublicKey, RawTx, TxId, Wallet};

use ractor::async_trait;
use std::sync::Arc;

pub type ActorResult<T> = Result<T, ractor::ActorProcessingErr>;

// Failure type surfaced by collaborators; the processor classifies these into
// per-transaction error records instead of propagating them.
pub type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Dynamic-fee classification for a single transaction. The two flags are
/// independent: a transaction may be gossiped without entering the pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DynamicFeeMatch {
    pub enter_pool: bool,
    pub broadcast: bool,
}

/// Outcome of a batched pool insertion. Everything not listed was stored.
#[derive(Debug, Default)]
pub struct AddTransactionsOutcome {
    pub not_added: Vec<PoolRejection>,
}

/// A single transaction the pool refused, with the pool's own classification.
#[derive(Clone, Debug)]
pub struct PoolRejection {
    pub id: TxId,
    pub kind: ErrorKind,
    pub message: String,
}

#[async_trait]
pub trait Mempool: Send + Sync + 'static {
    /// Whether the pool already holds a transaction with this id.
    async fn has(&self, id: &TxId) -> AppResult<bool>;

    /// Stores a batch of transactions, reporting the ones it refused.
    async fn add_transactions(&self, txs: Vec<ParsedTx>) -> AppResult<AddTransactionsOutcome>;
}

#[async_trait]
pub trait WalletManager: Send + Sync + 'static {
    /// Snapshot of the sender wallet; creates an empty wallet for unknown keys.
    fn find_by_public_key(&self, public_key: &PublicKey) -> Wallet;

    /// Tests nonce ordering, balance sufficiency and sender invariants against
    /// the live wallet state.
    async fn throw_if_cannot_be_applied(&self, tx: &ParsedTx) -> AppResult<()>;
}

#[async_trait]
pub trait ChainDatabase: Send + Sync + 'static {
    /// Returns the subset of `ids` already included in an on-chain block.
    async fn get_forged_transaction_ids(&self, ids: Vec<TxId>) -> AppResult<Vec<TxId>>;
}

#[async_trait]
pub trait TransactionHandler: Send + Sync + 'static {
    /// Per-type admission predicate. A declining handler classifies silently;
    /// the processor records nothing for it.
    async fn can_enter_pool(&self, tx: &ParsedTx, mempool: &dyn Mempool) -> AppResult<bool>;
}

pub trait HandlerRegistry: Send + Sync + 'static {
    fn get(&self, type_id: u32, type_group: u32) -> AppResult<Arc<dyn TransactionHandler>>;
}

pub trait FeeMatcher: Send + Sync + 'static {
    fn match_fee(&self, tx: &ParsedTx) -> DynamicFeeMatch;
}

#[async_trait]
pub trait PeerMonitor: Send + Sync + 'static {
    /// Fire-and-forget gossip handoff.
    async fn broadcast_transactions(&self, txs: Vec<ParsedTx>);
}

pub trait TransactionCodec: Send + Sync + 'static {
    /// Recovers a typed transaction from its serialised form without
    /// re-checking signatures.
    fn decode_unchecked(&self, raw: &RawTx) -> AppResult<ParsedTx>;
}

#[async_trait]
pub trait BatchVerifier: Send + Sync + 'static {
    /// Cryptographically verifies a batch and reports the split outcome.
    async fn verify_batch(&self, batch: &VerifierBatch) -> AppResult<VerifiedBatch>;
}

/// Everything the processor talks to, bundled for spawning.
#[derive(Clone)]
pub struct Collaborators {
    pub mempool: Arc<dyn Mempool>,
    pub wallets: Arc<dyn WalletManager>,
    pub database: Arc<dyn ChainDatabase>,
    pub handlers: Arc<dyn HandlerRegistry>,
    pub fees: Arc<dyn FeeMatcher>,
    pub peers: Arc<dyn PeerMonitor>,
    pub codec: Arc<dyn TransactionCodec>,
    pub verifier: Arc<dyn BatchVerifier>,
}
