use std::{
    collections::HashMap,
    sync::Arc,
};

use alloy::{
    eips::BlockNumberOrTag,
    primitives::Address,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    client::ConfidentialClient,
    error::Result,
    prepare::CallMemo,
};

/// Hands out nonces for an account on a chain.
#[async_trait]
pub trait NonceManager: Send + Sync {
    async fn consume(
        &self,
        address: Address,
        chain_id: u64,
        client: &ConfidentialClient,
    ) -> Result<u64>;
}

pub type SharedNonceManager = Arc<dyn NonceManager>;

/// Tracks the last nonce handed out per `(address, chain)` so back-to-back
/// preparations do not reuse a nonce before the first transaction is pending.
#[derive(Debug, Default)]
pub struct LocalNonceManager {
    last: Mutex<HashMap<(Address, u64), u64>>,
}

impl LocalNonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the local counter, e.g. after a dropped transaction.
    pub fn reset(&self, address: Address, chain_id: u64) {
        self.last.lock().remove(&(address, chain_id));
    }
}

#[async_trait]
impl NonceManager for LocalNonceManager {
    async fn consume(
        &self,
        address: Address,
        chain_id: u64,
        client: &ConfidentialClient,
    ) -> Result<u64> {
        let pending = client
            .transaction_count(address, BlockNumberOrTag::Pending)
            .await?;

        let mut last = self.last.lock();
        let next = match last.get(&(address, chain_id)) {
            Some(previous) => pending.max(previous + 1),
            None => pending,
        };
        last.insert((address, chain_id), next);
        Ok(next)
    }
}

/// The injected manager if any, otherwise the pending transaction count.
pub async fn resolve_nonce(
    memo: &CallMemo<'_>,
    address: Address,
    manager: Option<&SharedNonceManager>,
) -> Result<u64> {
    let nonce = match manager {
        Some(manager) => {
            let chain_id = memo.chain_id().await?;
            manager.consume(address, chain_id, memo.client()).await?
        }
        None => {
            memo.client()
                .transaction_count(address, BlockNumberOrTag::Pending)
                .await?
        }
    };
    debug!(target: "confidential_client::nonce", %address, nonce, "Resolved nonce");
    Ok(nonce)
}
