use crate::error::{ErrorKind, TxError};
use crate::types::tx::{ParsedTx, PublicKey, RawTx, TxId, Wallet};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// A signature-verified payload awaiting the post-verification checks.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidTx {
    pub id: TxId,
    pub raw: RawTx,
}

/// Mutable per-ticket accumulator, held from submission through completion.
///
/// The five buckets are keyed by transaction id and are pairwise disjoint
/// once the post-verification pipeline has run.
#[derive(Clone, Debug)]
pub struct PendingJobResult {
    pub ticket_id: Uuid,
    pub invalid: HashMap<TxId, TxError>,
    pub excess: HashMap<TxId, TxError>,
    pub errors: HashMap<TxId, TxError>,
    pub accept: HashMap<TxId, ParsedTx>,
    pub broadcast: HashMap<TxId, ParsedTx>,
    /// Filled by the verifier, in submission order with duplicates dropped.
    pub valid_transactions: Vec<ValidTx>,
}

impl PendingJobResult {
    pub fn new(ticket_id: Uuid) -> Self {
        Self {
            ticket_id,
            invalid: HashMap::new(),
            excess: HashMap::new(),
            errors: HashMap::new(),
            accept: HashMap::new(),
            broadcast: HashMap::new(),
            valid_transactions: Vec::new(),
        }
    }

    /// Records a rejection for one transaction. Last writer wins when the
    /// same id is classified twice.
    pub fn push_error<S: Into<String>>(&mut self, id: &TxId, kind: ErrorKind, message: S) {
        self.errors.insert(id.clone(), TxError::new(kind, message));
    }

    /// Every transaction id this job references, across all buckets.
    pub fn tx_ids(&self) -> Vec<TxId> {
        let mut ids: BTreeSet<TxId> = BTreeSet::new();
        ids.extend(self.invalid.keys().cloned());
        ids.extend(self.excess.keys().cloned());
        ids.extend(self.errors.keys().cloned());
        ids.extend(self.accept.keys().cloned());
        ids.extend(self.broadcast.keys().cloned());
        ids.extend(self.valid_transactions.iter().map(|v| v.id.clone()));
        ids.into_iter().collect()
    }
}

/// Immutable per-ticket outcome, the only shape observable by callers.
/// Carries id lists rather than full transactions; `errors` is omitted from
/// the wire when empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinishedJobResult {
    pub ticket_id: Uuid,
    pub accept: Vec<TxId>,
    pub broadcast: Vec<TxId>,
    pub invalid: Vec<TxId>,
    pub excess: Vec<TxId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<TxId, TxError>>,
}

/// One unit of work handed to the out-of-band verifier.
#[derive(Clone, Debug)]
pub struct VerifierBatch {
    pub ticket_id: Uuid,
    pub transactions: Vec<ParsedTx>,
    pub sender_wallets: HashMap<PublicKey, Wallet>,
}

/// What the verifier reports back for a batch.
#[derive(Clone, Debug, Default)]
pub struct VerifiedBatch {
    /// Signature-verified payloads, ordered as submitted.
    pub valid: Vec<ValidTx>,
    /// Cryptographically rejected ids.
    pub invalid: HashMap<TxId, TxError>,
    /// Ids rejected for per-sender count or weight limits.
    pub excess: HashMap<TxId, TxError>,
    /// Verifier-side failures that fit no other bucket.
    pub errors: HashMap<TxId, TxError>,
}
