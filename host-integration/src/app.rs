use crate::error::AppError;
use admission_processor::{
    AddTransactionsOutcome, AppResult, BatchVerifier, ChainDatabase, DynamicFeeMatch, ErrorKind,
    FeeMatcher, HandlerRegistry, Mempool, ParsedTx, PeerMonitor, PoolRejection, PublicKey, RawTx,
    TransactionCodec, TransactionHandler, TxError, TxId, ValidTx, VerifiedBatch, VerifierBatch,
    Wallet, WalletManager,
};

use bytes::Bytes;
use parking_lot::Mutex;
use ractor::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

/// Wire form understood by the test codec.
#[derive(Serialize, Deserialize)]
struct TxEnvelope {
    id: String,
    sender_public_key: String,
    type_id: u32,
    type_group: u32,
    fee: u64,
}

/// Builds a transfer-shaped test transaction with a JSON wire form.
pub fn make_tx(id: &str, sender: &str) -> ParsedTx {
    make_typed_tx(id, sender, 0, 1, 1_000)
}

pub fn make_typed_tx(id: &str, sender: &str, type_id: u32, type_group: u32, fee: u64) -> ParsedTx {
    let envelope = TxEnvelope {
        id: id.to_string(),
        sender_public_key: sender.to_string(),
        type_id,
        type_group,
        fee,
    };
    let raw = RawTx(Bytes::from(serde_json::to_vec(&envelope).unwrap()));
    ParsedTx {
        id: TxId::from(id),
        sender_public_key: PublicKey::from(sender),
        type_id,
        type_group,
        fee,
        raw,
    }
}

/// Codec over the JSON wire form; decode failures are scripted per id.
#[derive(Default)]
pub struct JsonCodec {
    fail: Mutex<HashSet<TxId>>,
}

impl JsonCodec {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_decode(&self, id: &str) {
        self.fail.lock().insert(TxId::from(id));
    }
}

impl TransactionCodec for JsonCodec {
    fn decode_unchecked(&self, raw: &RawTx) -> AppResult<ParsedTx> {
        let envelope: TxEnvelope = serde_json::from_slice(&raw.0)?;
        if self.fail.lock().contains(&TxId::from(envelope.id.as_str())) {
            return Err(
                AppError::deserialization_failed(format!("Malformed payload {}", envelope.id))
                    .into(),
            );
        }
        Ok(ParsedTx {
            id: TxId::from(envelope.id.as_str()),
            sender_public_key: PublicKey::from(envelope.sender_public_key.as_str()),
            type_id: envelope.type_id,
            type_group: envelope.type_group,
            fee: envelope.fee,
            raw: raw.clone(),
        })
    }
}

#[derive(Default)]
struct PoolInner {
    stored: HashSet<TxId>,
    rejections: HashMap<TxId, (ErrorKind, String)>,
}

/// In-memory pool; insertion rejections are scripted per id.
#[derive(Default)]
pub struct InMemoryMempool {
    inner: Mutex<PoolInner>,
}

impl InMemoryMempool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pretends the pool already holds this id.
    pub fn seed(&self, id: &str) {
        self.inner.lock().stored.insert(TxId::from(id));
    }

    pub fn reject_with(&self, id: &str, kind: ErrorKind, message: &str) {
        self.inner
            .lock()
            .rejections
            .insert(TxId::from(id), (kind, message.to_string()));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().stored.contains(&TxId::from(id))
    }
}

#[async_trait]
impl Mempool for InMemoryMempool {
    async fn has(&self, id: &TxId) -> AppResult<bool> {
        Ok(self.inner.lock().stored.contains(id))
    }

    async fn add_transactions(&self, txs: Vec<ParsedTx>) -> AppResult<AddTransactionsOutcome> {
        let mut inner = self.inner.lock();
        let mut not_added = Vec::new();
        for tx in txs {
            if let Some((kind, message)) = inner.rejections.get(&tx.id) {
                not_added.push(PoolRejection {
                    id: tx.id.clone(),
                    kind: kind.clone(),
                    message: message.clone(),
                });
            } else {
                inner.stored.insert(tx.id);
            }
        }
        Ok(AddTransactionsOutcome { not_added })
    }
}

/// Wallet manager that creates funded wallets on first sight; apply failures
/// are scripted per transaction id.
pub struct TestWalletManager {
    wallets: Mutex<HashMap<PublicKey, Wallet>>,
    apply_failures: Mutex<HashMap<TxId, String>>,
    default_balance: u64,
}

impl TestWalletManager {
    pub fn new(default_balance: u64) -> Arc<Self> {
        Arc::new(Self {
            wallets: Mutex::new(HashMap::new()),
            apply_failures: Mutex::new(HashMap::new()),
            default_balance,
        })
    }

    pub fn fail_apply(&self, id: &str, reason: &str) {
        self.apply_failures
            .lock()
            .insert(TxId::from(id), reason.to_string());
    }
}

#[async_trait]
impl WalletManager for TestWalletManager {
    fn find_by_public_key(&self, public_key: &PublicKey) -> Wallet {
        self.wallets
            .lock()
            .entry(public_key.clone())
            .or_insert_with(|| Wallet {
                public_key: public_key.clone(),
                nonce: 0,
                balance: self.default_balance,
            })
            .clone()
    }

    async fn throw_if_cannot_be_applied(&self, tx: &ParsedTx) -> AppResult<()> {
        if let Some(reason) = self.apply_failures.lock().get(&tx.id) {
            return Err(AppError::cannot_apply(reason.clone()).into());
        }
        Ok(())
    }
}

/// Chain database with a scripted forged set; can be made unavailable to
/// exercise the pipeline fault path.
#[derive(Default)]
pub struct TestChainDatabase {
    forged: Mutex<HashSet<TxId>>,
    unavailable: Mutex<bool>,
}

impl TestChainDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_forged(&self, id: &str) {
        self.forged.lock().insert(TxId::from(id));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }
}

#[async_trait]
impl ChainDatabase for TestChainDatabase {
    async fn get_forged_transaction_ids(&self, ids: Vec<TxId>) -> AppResult<Vec<TxId>> {
        if *self.unavailable.lock() {
            return Err(AppError::unavailable("chain database unavailable").into());
        }
        let forged = self.forged.lock();
        Ok(ids.into_iter().filter(|id| forged.contains(id)).collect())
    }
}

/// Registry whose single handler admits everything except scripted ids;
/// whole type/group pairs can be made unknown.
#[derive(Default)]
pub struct TestHandlerRegistry {
    denied: Arc<Mutex<HashSet<TxId>>>,
    unknown_types: Mutex<HashSet<(u32, u32)>>,
}

impl TestHandlerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deny(&self, id: &str) {
        self.denied.lock().insert(TxId::from(id));
    }

    pub fn forget_type(&self, type_id: u32, type_group: u32) {
        self.unknown_types.lock().insert((type_id, type_group));
    }
}

impl HandlerRegistry for TestHandlerRegistry {
    fn get(&self, type_id: u32, type_group: u32) -> AppResult<Arc<dyn TransactionHandler>> {
        if self.unknown_types.lock().contains(&(type_id, type_group)) {
            return Err(AppError::unsupported_type(type_id, type_group).into());
        }
        Ok(Arc::new(ScriptedHandler {
            denied: self.denied.clone(),
        }))
    }
}

struct ScriptedHandler {
    denied: Arc<Mutex<HashSet<TxId>>>,
}

#[async_trait]
impl TransactionHandler for ScriptedHandler {
    async fn can_enter_pool(&self, tx: &ParsedTx, _mempool: &dyn Mempool) -> AppResult<bool> {
        Ok(!self.denied.lock().contains(&tx.id))
    }
}

/// Fee matcher with a per-id override table over a configurable default.
pub struct StaticFeeMatcher {
    default: Mutex<DynamicFeeMatch>,
    overrides: Mutex<HashMap<TxId, DynamicFeeMatch>>,
}

impl StaticFeeMatcher {
    /// Defaults to admitting and gossiping everything.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            default: Mutex::new(DynamicFeeMatch {
                enter_pool: true,
                broadcast: true,
            }),
            overrides: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_default(&self, matched: DynamicFeeMatch) {
        *self.default.lock() = matched;
    }

    pub fn override_for(&self, id: &str, matched: DynamicFeeMatch) {
        self.overrides.lock().insert(TxId::from(id), matched);
    }
}

impl FeeMatcher for StaticFeeMatcher {
    fn match_fee(&self, tx: &ParsedTx) -> DynamicFeeMatch {
        self.overrides
            .lock()
            .get(&tx.id)
            .copied()
            .unwrap_or(*self.default.lock())
    }
}

/// Peer monitor that records every handoff instead of gossiping.
#[derive(Default)]
pub struct RecordingPeerMonitor {
    broadcasts: Mutex<Vec<Vec<TxId>>>,
}

impl RecordingPeerMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every recorded batch, ids sorted within each batch.
    pub fn broadcasts(&self) -> Vec<Vec<TxId>> {
        self.broadcasts.lock().clone()
    }
}

#[async_trait]
impl PeerMonitor for RecordingPeerMonitor {
    async fn broadcast_transactions(&self, txs: Vec<ParsedTx>) {
        let mut ids: Vec<TxId> = txs.into_iter().map(|tx| tx.id).collect();
        ids.sort();
        self.broadcasts.lock().push(ids);
    }
}

/// Deterministic stand-in for the out-of-band cryptographic verifier.
/// Rejections, per-sender excess and whole-batch failures are scripted;
/// an optional delay keeps tickets in flight long enough to observe.
#[derive(Default)]
pub struct StubVerifier {
    invalid: Mutex<HashMap<TxId, String>>,
    excess: Mutex<HashSet<TxId>>,
    delay: Mutex<Option<Duration>>,
    fail: Mutex<bool>,
}

impl StubVerifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject(&self, id: &str, reason: &str) {
        self.invalid
            .lock()
            .insert(TxId::from(id), reason.to_string());
    }

    pub fn mark_excess(&self, id: &str) {
        self.excess.lock().insert(TxId::from(id));
    }

    pub fn delay_for(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn fail_batches(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl BatchVerifier for StubVerifier {
    async fn verify_batch(&self, batch: &VerifierBatch) -> AppResult<VerifiedBatch> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.lock() {
            return Err(AppError::unavailable("verifier crashed").into());
        }

        let mut outcome = VerifiedBatch::default();
        let invalid = self.invalid.lock();
        let excess = self.excess.lock();
        for tx in &batch.transactions {
            if let Some(reason) = invalid.get(&tx.id) {
                outcome
                    .invalid
                    .insert(tx.id.clone(), TxError::new(ErrorKind::Unknown, reason.clone()));
            } else if excess.contains(&tx.id) {
                outcome.excess.insert(
                    tx.id.clone(),
                    TxError::new(ErrorKind::Unknown, "Exceeded per-sender limit"),
                );
            } else {
                outcome.valid.push(ValidTx {
                    id: tx.id.clone(),
                    raw: tx.raw.clone(),
                });
            }
        }
        Ok(outcome)
    }
}
