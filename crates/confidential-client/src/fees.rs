//! Fee model resolution.

use alloy::{
    primitives::U256,
    rpc::types::Block,
};
use tracing::debug;

use crate::{
    error::{
        Error,
        FeeModelConflict,
        Result,
        TransportError,
    },
    prepare::CallMemo,
    types::{
        TransactionRequest,
        TransactionType,
    },
};

/// Price fields for one of the two fee models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeValues {
    Legacy {
        gas_price: U256,
    },
    FeeMarket {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

fn base_fee(block: &Block) -> Option<U256> {
    block.header.inner.base_fee_per_gas.map(U256::from)
}

/// `eth_maxPriorityFeePerGas`, or `eth_gasPrice - baseFee` when the node does
/// not implement it.
pub async fn estimate_max_priority_fee_per_gas(
    memo: &CallMemo<'_>,
    block: &Block,
) -> Result<U256> {
    let base_fee = base_fee(block).ok_or(FeeModelConflict::Eip1559FeesNotSupported)?;

    match memo.client().max_priority_fee_per_gas().await {
        Ok(fee) => Ok(fee),
        Err(Error::Transport(TransportError::JsonRpc { code, message })) => {
            debug!(
                target: "confidential_client::fees",
                code,
                %message,
                "eth_maxPriorityFeePerGas unavailable, deriving from gas price"
            );
            let gas_price = memo.client().gas_price().await?;
            Ok(gas_price.saturating_sub(base_fee))
        }
        Err(err) => Err(err),
    }
}

/// Fills whatever price fields `request` is missing for `ty`. Supplied fields
/// are kept as they are.
pub async fn estimate_fees_per_gas(
    memo: &CallMemo<'_>,
    request: &TransactionRequest,
    ty: TransactionType,
) -> Result<FeeValues> {
    let fees = memo.chain().map(|chain| chain.fees).unwrap_or_default();

    if !ty.is_fee_market() {
        let gas_price = match request.gas_price {
            Some(gas_price) => gas_price,
            None => fees.apply(memo.client().gas_price().await?),
        };
        return Ok(FeeValues::Legacy { gas_price });
    }

    let block = memo.latest_block().await?;
    let base_fee = base_fee(block).ok_or(FeeModelConflict::Eip1559FeesNotSupported)?;

    let max_priority_fee_per_gas = match request.max_priority_fee_per_gas {
        Some(fee) => fee,
        None => estimate_max_priority_fee_per_gas(memo, block).await?,
    };
    let max_fee_per_gas = request
        .max_fee_per_gas
        .unwrap_or_else(|| fees.apply(base_fee).saturating_add(max_priority_fee_per_gas));

    Ok(FeeValues::FeeMarket {
        max_fee_per_gas,
        max_priority_fee_per_gas,
    })
}

/// Caller-set `type` wins, then the populated fields, then the latest block:
/// a base fee means EIP-1559, no base fee means legacy.
pub async fn resolve_type(
    memo: &CallMemo<'_>,
    request: &TransactionRequest,
) -> Result<TransactionType> {
    if let Some(ty) = TransactionType::infer(request) {
        return Ok(ty);
    }

    let block = memo.latest_block().await?;
    Ok(if base_fee(block).is_some() {
        TransactionType::Eip1559
    } else {
        TransactionType::Legacy
    })
}

/// Writes the fee fields for `ty` into `request`.
pub async fn resolve_fees(
    memo: &CallMemo<'_>,
    request: &mut TransactionRequest,
    ty: TransactionType,
) -> Result<()> {
    if ty.is_fee_market() {
        if request.max_fee_per_gas.is_some() && request.max_priority_fee_per_gas.is_some() {
            return Ok(());
        }

        let FeeValues::FeeMarket {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } = estimate_fees_per_gas(memo, request, ty).await?
        else {
            return Err(FeeModelConflict::Eip1559FeesNotSupported.into());
        };

        // Only a caller cap without a caller tip is checked against the estimate.
        if request.max_priority_fee_per_gas.is_none() {
            if let Some(cap) = request.max_fee_per_gas.filter(|cap| !cap.is_zero()) {
                if cap < max_priority_fee_per_gas {
                    return Err(FeeModelConflict::MaxFeePerGasTooLow {
                        max_priority_fee_per_gas,
                    }
                    .into());
                }
            }
        }

        debug!(
            target: "confidential_client::fees",
            %max_fee_per_gas,
            %max_priority_fee_per_gas,
            "Resolved fee-market fees"
        );
        request.max_fee_per_gas = Some(max_fee_per_gas);
        request.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        return Ok(());
    }

    if request.max_fee_per_gas.is_some() || request.max_priority_fee_per_gas.is_some() {
        return Err(FeeModelConflict::Eip1559FeesNotSupported.into());
    }

    if let FeeValues::Legacy { gas_price } = estimate_fees_per_gas(memo, request, ty).await? {
        debug!(target: "confidential_client::fees", %gas_price, "Resolved legacy gas price");
        request.gas_price = Some(gas_price);
    }
    Ok(())
}
