use std::fmt;

use alloy::{
    eips::BlockNumberOrTag,
    primitives::U256,
};
use serde_json::{
    Value,
    json,
};
use tracing::{
    debug,
    instrument,
};

use crate::{
    authorization::{
        authorization_surcharge,
        resolve_to,
    },
    blobs::SharedKzg,
    chain::format_request,
    client::ConfidentialClient,
    error::{
        Error,
        EstimationError,
        Result,
    },
    prepare::{
        DataSealing,
        PrepareTransactionArgs,
        prepare_request,
    },
    prepared::validate_request,
    types::{
        Account,
        ParameterSet,
        PrepareParameter,
        TransactionRequest,
    },
};

#[derive(Clone, Default)]
pub struct EstimateGasArgs {
    pub request: TransactionRequest,
    /// Falls back to the client's account.
    pub account: Option<Account>,
    /// Omitted from the RPC call when unset, which nodes treat as `latest`.
    pub block: Option<BlockNumberOrTag>,
    pub kzg: Option<SharedKzg>,
}

impl EstimateGasArgs {
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

    pub fn with_kzg(mut self, kzg: SharedKzg) -> Self {
        self.kzg = Some(kzg);
        self
    }
}

impl fmt::Debug for EstimateGasArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimateGasArgs")
            .field("request", &self.request)
            .field("account", &self.account)
            .field("block", &self.block)
            .field("kzg", &self.kzg.is_some())
            .finish()
    }
}

/// `eth_estimateGas` for a partially filled request, plus the authorization
/// surcharge when the request carries an authorization list.
///
/// Every failure comes back as [`Error::Estimation`] with the caller's
/// request, account and chain attached.
#[instrument(level = "debug", skip_all, target = "confidential_client::estimate")]
pub async fn estimate_gas(client: &ConfidentialClient, args: EstimateGasArgs) -> Result<U256> {
    let account = args.account.or_else(|| client.account().copied());
    let chain_id = client
        .chain()
        .map(|chain| chain.id)
        .or(args.request.chain_id);
    let context = serde_json::to_value(&args.request).unwrap_or(Value::Null);

    estimate(client, args, account).await.map_err(|source| {
        Error::from(Box::new(EstimationError {
            source: Box::new(source),
            account: account.map(|account| account.address),
            chain_id,
            request: context,
        }))
    })
}

async fn estimate(
    client: &ConfidentialClient,
    args: EstimateGasArgs,
    account: Option<Account>,
) -> Result<U256> {
    let EstimateGasArgs {
        request,
        block,
        kzg,
        ..
    } = args;
    validate_request(&request)?;

    // Local accounts sign client side and need everything but the gas limit.
    // For node-signed requests only the blob hashes are computed here, since
    // some nodes do not derive them from blobs.
    let parameters = if account.is_some_and(|account| account.is_local()) {
        ParameterSet::default().without(PrepareParameter::Gas)
    } else {
        ParameterSet::only([PrepareParameter::BlobVersionedHashes])
    };

    let prepared = prepare_request(
        client,
        PrepareTransactionArgs {
            request,
            account,
            parameters,
            kzg,
            ..Default::default()
        },
        DataSealing::Plaintext,
    )
    .await?;

    let to = resolve_to(&prepared)?;
    let request = TransactionRequest {
        from: account.map(|account| account.address).or(prepared.from),
        to,
        chain_id: None,
        transaction_type: None,
        sidecars: None,
        ..prepared
    };

    let formatted = format_request(client.chain(), &request)?;
    let mut estimate = estimate_gas_rpc(client, formatted, block).await?;
    debug!(target: "confidential_client::estimate", %estimate, "Base estimate");

    if let Some(authorization_list) = &request.authorization_list {
        let surcharge = authorization_surcharge(
            client,
            authorization_list,
            request.from,
            request.data.as_ref(),
            block,
        )
        .await?;
        estimate = estimate.saturating_add(surcharge);
    }

    Ok(estimate)
}

/// Raw `eth_estimateGas` through the client's interceptor chain.
pub async fn estimate_gas_rpc(
    client: &ConfidentialClient,
    request: Value,
    block: Option<BlockNumberOrTag>,
) -> Result<U256> {
    let params = match block {
        Some(block) => json!([request, block]),
        None => json!([request]),
    };
    client.request_as("eth_estimateGas", params).await
}
