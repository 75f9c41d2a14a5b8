//! EIP-7702 helpers: implied recipient and the gas surcharge for
//! authorization entries.

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{
        Address,
        Bytes,
        U256,
    },
};
use futures::future::join_all;
use tracing::{
    debug,
    warn,
};

use crate::{
    chain::format_request,
    client::ConfidentialClient,
    error::{
        Error,
        Result,
    },
    estimate::estimate_gas_rpc,
    types::{
        AuthorizationEntry,
        TransactionRequest,
    },
};

/// Used for an entry whose own estimate fails.
pub const AUTHORIZATION_FALLBACK_GAS: u64 = 100_000;

/// Each entry's estimate is multiplied by this. `eth_estimateGas` has no
/// schema for authorization lists yet, so activation cost is over-approximated.
pub const AUTHORIZATION_GAS_FACTOR: u64 = 2;

/// The explicit `to`, else the authority of the first authorization entry,
/// else `None` (deployment).
pub fn resolve_to(request: &TransactionRequest) -> Result<Option<Address>> {
    if let Some(to) = request.to {
        return Ok(Some(to));
    }

    match request.authorization_list.as_deref() {
        Some([first, ..]) => {
            first
                .recover_authority()
                .map(Some)
                .map_err(|e| Error::AuthorizationRecovery(e.to_string()))
        }
        _ => Ok(None),
    }
}

/// Gas for one entry: the entry's own estimate, or the fallback when the
/// estimate fails.
async fn entry_estimate(
    client: &ConfidentialClient,
    entry: &AuthorizationEntry,
    from: Option<Address>,
    data: Option<&Bytes>,
    value: Option<U256>,
    block: Option<BlockNumberOrTag>,
) -> Result<U256> {
    let request = TransactionRequest {
        from,
        to: Some(*entry.address()),
        data: data.cloned(),
        value,
        ..Default::default()
    };
    let formatted = format_request(client.chain(), &request)?;
    estimate_gas_rpc(client, formatted, block).await
}

/// `Σ AUTHORIZATION_GAS_FACTOR × estimate_i` over the list. Entries are
/// estimated concurrently.
pub async fn authorization_surcharge(
    client: &ConfidentialClient,
    authorization_list: &[AuthorizationEntry],
    from: Option<Address>,
    data: Option<&Bytes>,
    block: Option<BlockNumberOrTag>,
) -> Result<U256> {
    if authorization_list.is_empty() {
        return Ok(U256::ZERO);
    }

    let value = match from {
        Some(address) => Some(client.balance(address, BlockNumberOrTag::Latest).await?),
        None => None,
    };

    let estimates = join_all(authorization_list.iter().map(|entry| {
        async move {
            let estimate = entry_estimate(client, entry, from, data, value, block)
                .await
                .unwrap_or_else(|err| {
                    warn!(
                        target: "confidential_client::authorization",
                        contract = %entry.address(),
                        error = %err,
                        "Authorization estimate failed, using fallback"
                    );
                    U256::from(AUTHORIZATION_FALLBACK_GAS)
                });
            estimate.saturating_mul(U256::from(AUTHORIZATION_GAS_FACTOR))
        }
    }))
    .await;

    let surcharge = estimates
        .into_iter()
        .fold(U256::ZERO, |acc, estimate| acc.saturating_add(estimate));
    debug!(
        target: "confidential_client::authorization",
        entries = authorization_list.len(),
        %surcharge,
        "Computed authorization surcharge"
    );
    Ok(surcharge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        eips::eip7702::Authorization,
        primitives::Signature,
        signers::{
            SignerSync,
            local::PrivateKeySigner,
        },
    };
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn signed(signer: &PrivateKeySigner, contract: Address) -> AuthorizationEntry {
        let auth = Authorization {
            chain_id: U256::from(1291),
            address: contract,
            nonce: 0,
        };
        let signature = signer.sign_hash_sync(&auth.signature_hash()).unwrap();
        auth.into_signed(signature)
    }

    #[test]
    fn test_explicit_to_wins() {
        let signer = PrivateKeySigner::random();
        let request = TransactionRequest::default()
            .with_to(Address::repeat_byte(0x22))
            .with_authorization_list(vec![signed(&signer, Address::repeat_byte(0x33))]);

        assert_eq!(resolve_to(&request).unwrap(), Some(Address::repeat_byte(0x22)));
    }

    #[test]
    fn test_to_from_first_authority() {
        let first = PrivateKeySigner::random();
        let second = PrivateKeySigner::random();
        let request = TransactionRequest::default().with_authorization_list(vec![
            signed(&first, Address::repeat_byte(0x33)),
            signed(&second, Address::repeat_byte(0x44)),
        ]);

        assert_eq!(resolve_to(&request).unwrap(), Some(first.address()));
    }

    #[test]
    fn test_deployment_has_no_to() {
        assert_eq!(resolve_to(&TransactionRequest::default()).unwrap(), None);
        assert_eq!(
            resolve_to(&TransactionRequest::default().with_authorization_list(vec![])).unwrap(),
            None
        );
    }

    #[test]
    fn test_unrecoverable_authority() {
        let auth = Authorization {
            chain_id: U256::from(1291),
            address: Address::repeat_byte(0x33),
            nonce: 0,
        };
        let bogus = Signature::new(U256::ZERO, U256::ZERO, false);
        let request =
            TransactionRequest::default().with_authorization_list(vec![auth.into_signed(bogus)]);

        assert_matches!(resolve_to(&request), Err(Error::AuthorizationRecovery(_)));
    }
}
