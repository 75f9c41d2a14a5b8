//! Transaction preparation.
//!
//! ```text
//! account -> seal data -> [blobs | chain id] -> nonce -> type -> fees -> gas -> validate
//! ```
//!
//! Each step only runs when its [`PrepareParameter`] is requested and the
//! caller left the field empty. The latest block and the chain id are fetched
//! at most once per call through [`CallMemo`].

use std::fmt;

use alloy::{
    eips::BlockNumberOrTag,
    rpc::types::Block,
};
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::{
    debug,
    instrument,
};

use crate::{
    blobs::{
        SharedKzg,
        build_commitment_set,
    },
    chain::Chain,
    client::ConfidentialClient,
    encryption,
    error::Result,
    estimate::{
        EstimateGasArgs,
        estimate_gas,
    },
    fees::{
        resolve_fees,
        resolve_type,
    },
    nonce::{
        SharedNonceManager,
        resolve_nonce,
    },
    prepared::{
        PreparedTransaction,
        validate_request,
    },
    types::{
        Account,
        ParameterSet,
        PrepareParameter,
        TransactionRequest,
    },
};

#[derive(Clone, Default)]
pub struct PrepareTransactionArgs {
    pub request: TransactionRequest,
    /// Falls back to the client's account.
    pub account: Option<Account>,
    /// Falls back to the client's chain.
    pub chain: Option<Chain>,
    pub kzg: Option<SharedKzg>,
    pub nonce_manager: Option<SharedNonceManager>,
    pub parameters: ParameterSet,
}

impl PrepareTransactionArgs {
    pub fn new(request: TransactionRequest) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_kzg(mut self, kzg: SharedKzg) -> Self {
        self.kzg = Some(kzg);
        self
    }

    pub fn with_nonce_manager(mut self, nonce_manager: SharedNonceManager) -> Self {
        self.nonce_manager = Some(nonce_manager);
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }
}

impl fmt::Debug for PrepareTransactionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrepareTransactionArgs")
            .field("request", &self.request)
            .field("account", &self.account)
            .field("chain", &self.chain.as_ref().map(|chain| chain.id))
            .field("kzg", &self.kzg.is_some())
            .field("nonce_manager", &self.nonce_manager.is_some())
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Whether the pipeline seals `data` itself. Estimation runs on plaintext and
/// leaves sealing to the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSealing {
    Seal,
    Plaintext,
}

/// Lookups shared by the steps of one preparation.
pub struct CallMemo<'a> {
    client: &'a ConfidentialClient,
    chain: Option<&'a Chain>,
    caller_chain_id: Option<u64>,
    block: OnceCell<Block>,
    chain_id: OnceCell<u64>,
}

impl<'a> CallMemo<'a> {
    pub fn new(
        client: &'a ConfidentialClient,
        chain: Option<&'a Chain>,
        caller_chain_id: Option<u64>,
    ) -> Self {
        Self {
            client,
            chain,
            caller_chain_id,
            block: OnceCell::new(),
            chain_id: OnceCell::new(),
        }
    }

    pub fn client(&self) -> &'a ConfidentialClient {
        self.client
    }

    pub fn chain(&self) -> Option<&'a Chain> {
        self.chain
    }

    pub async fn latest_block(&self) -> Result<&Block> {
        self.block
            .get_or_try_init(|| self.client.block(BlockNumberOrTag::Latest))
            .await
    }

    /// The chain's id, else the caller's `chainId`, else `eth_chainId`.
    pub async fn chain_id(&self) -> Result<u64> {
        if let Some(chain) = self.chain {
            return Ok(chain.id);
        }
        if let Some(chain_id) = self.caller_chain_id {
            return Ok(chain_id);
        }
        self.chain_id
            .get_or_try_init(|| self.client.chain_id())
            .await
            .copied()
    }
}

/// Fills the request and checks the final shape.
#[instrument(
    level = "debug",
    skip_all,
    target = "confidential_client::prepare",
    fields(parameters = ?args.parameters)
)]
pub async fn prepare_transaction_request(
    client: &ConfidentialClient,
    args: PrepareTransactionArgs,
) -> Result<PreparedTransaction> {
    let request = prepare_request(client, args, DataSealing::Seal).await?;
    PreparedTransaction::try_from(request)
}

/// The pipeline itself. Boxed because gas estimation re-enters it.
pub(crate) fn prepare_request(
    client: &ConfidentialClient,
    args: PrepareTransactionArgs,
    sealing: DataSealing,
) -> BoxFuture<'_, Result<TransactionRequest>> {
    Box::pin(async move {
        let PrepareTransactionArgs {
            mut request,
            account,
            chain,
            kzg,
            nonce_manager,
            parameters,
        } = args;

        let account = account.or_else(|| client.account().copied());
        if let Some(account) = account {
            request.from = Some(account.address);
        }

        let plaintext = request.data.clone();
        let caller_type = request.transaction_type;
        let caller_nonce = request.nonce;
        let caller_gas = request.gas;

        if sealing == DataSealing::Seal && request.is_contract_call() {
            if let Some(data) = &request.data {
                let node_key = client.node_public_key().await?;
                let envelope = encryption::seal(&node_key, data)?;
                debug!(
                    target: "confidential_client::prepare",
                    sealed_len = envelope.ciphertext.len(),
                    "Sealed call data"
                );
                request.data = Some(envelope.ciphertext);
            }
        }

        let memo = CallMemo::new(
            client,
            chain.as_ref().or_else(|| client.chain()),
            request.chain_id,
        );

        let want_hashes = parameters.contains(PrepareParameter::BlobVersionedHashes);
        let want_sidecars = parameters.contains(PrepareParameter::Sidecars);
        let blob_step = async {
            match (&request.blobs, &kzg) {
                (Some(blobs), Some(kzg)) if want_hashes || want_sidecars => {
                    build_commitment_set(blobs, kzg.as_ref(), want_hashes, want_sidecars).map(Some)
                }
                _ => Ok(None),
            }
        };
        let chain_id_step = async {
            if parameters.contains(PrepareParameter::ChainId) {
                memo.chain_id().await.map(Some)
            } else {
                Ok(None)
            }
        };
        let (commitments, chain_id) = futures::try_join!(blob_step, chain_id_step)?;

        if let Some(set) = commitments {
            if let Some(hashes) = set.versioned_hashes {
                request.blob_versioned_hashes = Some(hashes);
            }
            if let Some(sidecars) = set.sidecars {
                request.sidecars = Some(sidecars);
            }
        }
        if let Some(chain_id) = chain_id {
            request.chain_id = Some(chain_id);
        }

        if parameters.contains(PrepareParameter::Nonce) && caller_nonce.is_none() {
            if let Some(account) = account {
                let nonce = resolve_nonce(&memo, account.address, nonce_manager.as_ref()).await?;
                request.nonce = Some(nonce);
            }
        }

        if (parameters.contains(PrepareParameter::Fees)
            || parameters.contains(PrepareParameter::Type))
            && caller_type.is_none()
        {
            request.transaction_type = Some(resolve_type(&memo, &request).await?);
        }

        if parameters.contains(PrepareParameter::Fees) {
            if let Some(ty) = request.transaction_type {
                resolve_fees(&memo, &mut request, ty).await?;
            }
        }

        if parameters.contains(PrepareParameter::Gas) && caller_gas.is_none() {
            let mut estimate_request = request.clone();
            estimate_request.data = plaintext;
            let gas = estimate_gas(
                client,
                EstimateGasArgs {
                    request: estimate_request,
                    account: account.map(|account| Account::json_rpc(account.address)),
                    block: None,
                    kzg: kzg.clone(),
                },
            )
            .await?;
            request.gas = Some(gas);
        }

        validate_request(&request)?;
        debug!(
            target: "confidential_client::prepare",
            ty = ?request.transaction_type,
            nonce = ?request.nonce,
            gas = ?request.gas,
            "Prepared request"
        );
        Ok(request)
    })
}
