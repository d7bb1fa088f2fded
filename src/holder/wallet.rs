use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Key types a holder DID may be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "bls12381g2")]
    Bls12381G2,
    #[serde(rename = "p256")]
    P256,
}

/// A DID the holder controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidInfo {
    pub did: String,
    pub verkey: String,
    pub key_type: KeyType,
}

/// Access to the holder's key material.
#[async_trait]
pub trait Wallet: Debug + Send + Sync {
    /// Look up a DID the holder controls. `Ok(None)` when the DID is not local.
    async fn get_local_did(&self, did: &str) -> Result<Option<DidInfo>>;

    /// The verification method id used in proofs made with `did`.
    async fn get_verification_method_id(&self, did: &str) -> Result<String>;
}

/// A wallet keeping DIDs in memory. Not for production use!
///
/// Verification methods are derived as `did#key-1`.
#[derive(Debug, Clone, Default)]
pub struct MemoryWallet {
    dids: Arc<Mutex<BTreeMap<String, DidInfo>>>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, info: DidInfo) {
        self.dids.lock().await.insert(info.did.clone(), info);
    }
}

#[async_trait]
impl Wallet for MemoryWallet {
    async fn get_local_did(&self, did: &str) -> Result<Option<DidInfo>> {
        Ok(self.dids.lock().await.get(did).cloned())
    }

    async fn get_verification_method_id(&self, did: &str) -> Result<String> {
        if self.dids.lock().await.contains_key(did) {
            return Ok(format!("{did}#key-1"));
        }
        bail!("DID `{did}` is not in the wallet")
    }
}
