use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Content-derived transaction identifier. Identity of a transaction across
/// the processor is this id alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxId {
    fn from(id: &str) -> Self {
        TxId(id.to_string())
    }
}

impl From<String> for TxId {
    fn from(id: String) -> Self {
        TxId(id)
    }
}

/// Sender public key in its wire encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey(pub String);

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PublicKey {
    fn from(key: &str) -> Self {
        PublicKey(key.to_string())
    }
}

/// Serialised transaction payload, recoverable into a `ParsedTx` by the codec.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RawTx(pub Bytes);

impl RawTx {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// A typed transaction as recovered from its serialised form. The processor
/// never constructs these; it only routes them.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedTx {
    pub id: TxId,
    pub sender_public_key: PublicKey,
    pub type_id: u32,
    pub type_group: u32,
    pub fee: u64,
    pub raw: RawTx,
}

/// Sender wallet snapshot taken on the submit path and shipped to the
/// verifier alongside the batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Wallet {
    pub public_key: PublicKey,
    pub nonce: u64,
    pub balance: u64,
}
