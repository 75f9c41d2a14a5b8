use std::sync::Arc;

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{
        Address,
        B256,
        Bytes,
        U64,
        U256,
    },
    rpc::types::Block,
};
use serde::de::DeserializeOwned;
use serde_json::{
    Value,
    json,
};
use tracing::{
    debug,
    info,
    instrument,
};

use crate::{
    chain::{
        Chain,
        format_request,
    },
    config::ClientConfig,
    encryption::NodePublicKey,
    error::{
        Error,
        Result,
        TransportError,
    },
    estimate::{
        EstimateGasArgs,
        estimate_gas,
    },
    interceptor::{
        EncryptionInterceptor,
        Next,
        RpcRequest,
        SharedInterceptor,
    },
    node_key::{
        RpcNodeKeySource,
        SharedNodeKeySource,
        StaticNodeKeySource,
    },
    prepare::{
        PrepareTransactionArgs,
        prepare_transaction_request,
    },
    prepared::{
        PreparedTransaction,
        validate_request,
    },
    transport::{
        HttpTransport,
        SharedTransport,
    },
    types::{
        Account,
        TransactionRequest,
    },
};

/// Arguments for [`ConfidentialClient::call`].
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub request: TransactionRequest,
    pub account: Option<Account>,
    /// Defaults to `latest`.
    pub block: Option<BlockNumberOrTag>,
}

impl CallArgs {
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

    pub fn with_block(mut self, block: BlockNumberOrTag) -> Self {
        self.block = Some(block);
        self
    }
}

struct ClientInner {
    transport: SharedTransport,
    interceptors: Vec<SharedInterceptor>,
    key_source: SharedNodeKeySource,
    chain: Option<Chain>,
    account: Option<Account>,
}

/// JSON-RPC client for a confidential node.
///
/// Cheap to clone. All requests go through the interceptor chain, which always
/// ends with an [`EncryptionInterceptor`].
#[derive(Clone)]
pub struct ConfidentialClient {
    inner: Arc<ClientInner>,
}

pub struct ConfidentialClientBuilder {
    transport: SharedTransport,
    interceptors: Vec<SharedInterceptor>,
    key_source: Option<SharedNodeKeySource>,
    chain: Option<Chain>,
    account: Option<Account>,
}

impl ConfidentialClientBuilder {
    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    /// Adds an interceptor in front of the encryption step.
    pub fn with_interceptor(mut self, interceptor: SharedInterceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_node_key_source(mut self, key_source: SharedNodeKeySource) -> Self {
        self.key_source = Some(key_source);
        self
    }

    pub fn build(self) -> ConfidentialClient {
        let key_source = self
            .key_source
            .unwrap_or_else(|| Arc::new(RpcNodeKeySource::new(self.transport.clone())));

        let mut interceptors = self.interceptors;
        interceptors.push(Arc::new(EncryptionInterceptor::new(key_source.clone())));

        ConfidentialClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                interceptors,
                key_source,
                chain: self.chain,
                account: self.account,
            }),
        }
    }
}

impl ConfidentialClient {
    pub fn builder(transport: SharedTransport) -> ConfidentialClientBuilder {
        ConfidentialClientBuilder {
            transport,
            interceptors: vec![],
            key_source: None,
            chain: None,
            account: None,
        }
    }

    /// HTTP client for a validated configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.rpc_url.clone())?;
        let mut builder = Self::builder(Arc::new(transport));
        if let Some(chain) = config.chain() {
            info!(
                target: "confidential_client::client",
                chain = %chain.name,
                id = chain.id,
                rpc_url = %config.rpc_url,
                "Pinned chain"
            );
            builder = builder.with_chain(chain);
        }
        if let Some(key) = config.node_public_key {
            builder = builder.with_node_key_source(Arc::new(StaticNodeKeySource(key)));
        }
        Ok(builder.build())
    }

    pub fn chain(&self) -> Option<&Chain> {
        self.inner.chain.as_ref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.inner.account.as_ref()
    }

    /// Dispatches through the interceptor chain.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        debug!(target: "confidential_client::client", %method, "RPC request");
        Next::new(self.inner.transport.as_ref(), &self.inner.interceptors)
            .run(RpcRequest::new(method, params))
            .await
    }

    pub async fn request_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.request_as("eth_chainId", json!([])).await?;
        Ok(id.to())
    }

    /// Header and transaction hashes of `block`.
    pub async fn block(&self, block: BlockNumberOrTag) -> Result<Block> {
        let value = self
            .request("eth_getBlockByNumber", json!([block, false]))
            .await?;
        if value.is_null() {
            return Err(TransportError::InvalidResponse(format!("block {block} not found")).into());
        }
        Ok(serde_json::from_value(value)?)
    }

    pub async fn balance(&self, address: Address, block: BlockNumberOrTag) -> Result<U256> {
        self.request_as("eth_getBalance", json!([address, block]))
            .await
    }

    pub async fn transaction_count(&self, address: Address, block: BlockNumberOrTag) -> Result<u64> {
        let count: U64 = self
            .request_as("eth_getTransactionCount", json!([address, block]))
            .await?;
        Ok(count.to())
    }

    pub async fn gas_price(&self) -> Result<U256> {
        self.request_as("eth_gasPrice", json!([])).await
    }

    pub async fn max_priority_fee_per_gas(&self) -> Result<U256> {
        self.request_as("eth_maxPriorityFeePerGas", json!([]))
            .await
    }

    pub async fn node_public_key(&self) -> Result<NodePublicKey> {
        self.inner.key_source.node_public_key().await
    }

    /// `eth_call` with the result already unsealed.
    #[instrument(level = "debug", skip_all, target = "confidential_client::client")]
    pub async fn call(&self, args: CallArgs) -> Result<Bytes> {
        let mut request = args.request;
        if let Some(account) = args.account.or_else(|| self.account().copied()) {
            request.from = Some(account.address);
        }
        let block = args.block.unwrap_or(BlockNumberOrTag::Latest);

        let tx = format_request(self.chain(), &request)?;
        self.request_as("eth_call", json!([tx, block])).await
    }

    /// Submits for node-side signing. `data` must be plaintext: the encryption
    /// interceptor seals it. Output of [`Self::prepare_transaction_request`]
    /// already carries sealed data and is meant for local signing.
    #[instrument(level = "debug", skip_all, target = "confidential_client::client")]
    pub async fn send_transaction(
        &self,
        request: TransactionRequest,
        account: Option<Account>,
    ) -> Result<B256> {
        let mut request = request;
        let account = account.or_else(|| self.account().copied());
        if let Some(account) = account {
            request.from = Some(account.address);
        }
        if request.from.is_none() {
            return Err(Error::InvalidRequest(
                "eth_sendTransaction requires an account".to_string(),
            ));
        }
        if let Some(chain) = self.chain() {
            request.chain_id.get_or_insert(chain.id);
        }
        validate_request(&request)?;

        let tx = format_request(self.chain(), &request)?;
        self.request_as("eth_sendTransaction", json!([tx]))
            .await
    }

    pub async fn estimate_gas(&self, args: EstimateGasArgs) -> Result<U256> {
        estimate_gas(self, args).await
    }

    pub async fn prepare_transaction_request(
        &self,
        args: PrepareTransactionArgs,
    ) -> Result<PreparedTransaction> {
        prepare_transaction_request(self, args).await
    }
}

impl std::fmt::Debug for ConfidentialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidentialClient")
            .field("chain", &self.inner.chain)
            .field("account", &self.inner.account)
            .field("interceptors", &self.inner.interceptors.len())
            .finish_non_exhaustive()
    }
}
