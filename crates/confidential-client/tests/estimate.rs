use alloy::{
    eips::{
        BlockNumberOrTag,
        eip7702::Authorization,
    },
    primitives::{
        Address,
        Signature,
        U256,
    },
    signers::local::PrivateKeySigner,
};
use assert_matches::assert_matches;
use confidential_client::{
    Account,
    Chain,
    Error,
    EstimateGasArgs,
    PrepareTransactionArgs,
    TransactionRequest,
    TransactionType,
    TransportError,
    authorization::{
        AUTHORIZATION_FALLBACK_GAS,
        AUTHORIZATION_GAS_FACTOR,
    },
};
use int_test_utils::{
    FIXTURE_CALL_DATA,
    FIXTURE_CONTRACT,
    FIXTURE_GAS,
    MockNode,
    fixture_request,
    signed_authorization,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const SENDER: Address = Address::repeat_byte(0x11);
const CONTRACT_A: Address = Address::repeat_byte(0x33);
const CONTRACT_B: Address = Address::repeat_byte(0x44);

#[tokio::test]
async fn test_failing_entry_uses_fallback() {
    let node = MockNode::new();
    let client = node.client();
    let signer = PrivateKeySigner::random();
    node.fail_estimate_for(CONTRACT_A);

    let request =
        fixture_request().with_authorization_list(vec![signed_authorization(&signer, CONTRACT_A)]);
    let gas = client
        .estimate_gas(EstimateGasArgs::new(request).with_account(Account::json_rpc(SENDER)))
        .await
        .unwrap();

    assert_eq!(
        gas,
        U256::from(FIXTURE_GAS + AUTHORIZATION_GAS_FACTOR * AUTHORIZATION_FALLBACK_GAS)
    );
    assert_eq!(gas, U256::from(223_325));
}

#[tokio::test]
async fn test_surcharge_sums_every_entry() {
    let node = MockNode::new();
    let client = node.client();
    let first = PrivateKeySigner::random();
    let second = PrivateKeySigner::random();
    let third = PrivateKeySigner::random();
    node.estimate_for(CONTRACT_A, 30_000);
    node.estimate_for(CONTRACT_B, 40_000);
    node.fail_estimate_for(Address::repeat_byte(0x55));

    let request = fixture_request().with_authorization_list(vec![
        signed_authorization(&first, CONTRACT_A),
        signed_authorization(&second, CONTRACT_B),
        signed_authorization(&third, Address::repeat_byte(0x55)),
    ]);
    let gas = client
        .estimate_gas(EstimateGasArgs::new(request).with_account(Account::json_rpc(SENDER)))
        .await
        .unwrap();

    assert_eq!(
        gas,
        U256::from(FIXTURE_GAS + 2 * 30_000 + 2 * 40_000 + 2 * 100_000)
    );
    // one base estimate, then one per entry
    assert_eq!(node.call_count("eth_estimateGas"), 4);
    assert_eq!(node.call_count("eth_getBalance"), 1);
}

#[tokio::test]
async fn test_entry_estimates_carry_balance_and_plaintext() {
    let node = MockNode::new();
    let client = node.client();
    let signer = PrivateKeySigner::random();

    let request =
        fixture_request().with_authorization_list(vec![signed_authorization(&signer, CONTRACT_A)]);
    client
        .estimate_gas(EstimateGasArgs::new(request).with_account(Account::json_rpc(SENDER)))
        .await
        .unwrap();

    let entry = node
        .calls_to("eth_estimateGas")
        .into_iter()
        .find(|call| {
            serde_json::from_value::<Address>(call.params[0]["to"].clone()).ok() == Some(CONTRACT_A)
        })
        .unwrap();
    assert_eq!(entry.plaintext, Some(FIXTURE_CALL_DATA));
    assert_eq!(entry.params[0]["value"], json!("0xde0b6b3a7640000"));
    assert_eq!(entry.params[0].get("authorizationList"), None);
}

#[tokio::test]
async fn test_to_inferred_from_first_authority() {
    let node = MockNode::new();
    let client = node.client();
    let signer = PrivateKeySigner::random();
    node.estimate_for(signer.address(), 50_000);

    let request = TransactionRequest::default()
        .with_authorization_list(vec![signed_authorization(&signer, CONTRACT_A)]);
    let gas = client
        .estimate_gas(EstimateGasArgs::new(request))
        .await
        .unwrap();

    assert_eq!(gas, U256::from(50_000 + 2 * FIXTURE_GAS));
    let base = &node.calls_to("eth_estimateGas")[0];
    let to: Address = serde_json::from_value(base.params[0]["to"].clone()).unwrap();
    assert_eq!(to, signer.address());
    // no account, so no balance lookup
    assert_eq!(node.call_count("eth_getBalance"), 0);
}

#[tokio::test]
async fn test_unrecoverable_authority() {
    let node = MockNode::new();
    let client = node.client();
    let auth = Authorization {
        chain_id: U256::from(1291),
        address: CONTRACT_A,
        nonce: 0,
    };
    let bogus = Signature::new(U256::ZERO, U256::ZERO, false);
    let request = TransactionRequest::default()
        .with_authorization_list(vec![auth.into_signed(bogus)]);

    let error = client
        .estimate_gas(EstimateGasArgs::new(request))
        .await
        .unwrap_err();

    let error = match error {
        Error::Estimation(error) => error,
        other => panic!("expected an estimation error, got {other:?}"),
    };
    assert_matches!(error.root_cause(), Error::AuthorizationRecovery(_));
    assert!(error.to_string().contains("could not infer from authorizationList"));
    assert_eq!(node.call_count("eth_estimateGas"), 0);
}

#[tokio::test]
async fn test_empty_authorization_list_adds_nothing() {
    let node = MockNode::new();
    let client = node.client();

    let gas = client
        .estimate_gas(EstimateGasArgs::new(
            fixture_request().with_authorization_list(vec![]),
        ))
        .await
        .unwrap();

    assert_eq!(gas, U256::from(FIXTURE_GAS));
    assert_eq!(node.call_count("eth_estimateGas"), 1);
}

#[tokio::test]
async fn test_error_carries_request_context() {
    let node = MockNode::new();
    node.mock_rpc_error("eth_estimateGas", 3, "execution reverted");
    let client = node
        .client_builder()
        .with_chain(Chain::swisstronik_testnet())
        .build();

    let error = client
        .estimate_gas(EstimateGasArgs::new(fixture_request()).with_account(Account::json_rpc(SENDER)))
        .await
        .unwrap_err();

    let error = match error {
        Error::Estimation(error) => error,
        other => panic!("expected an estimation error, got {other:?}"),
    };
    assert_eq!(error.account, Some(SENDER));
    assert_eq!(error.chain_id, Some(1291));
    let to: Address = serde_json::from_value(error.request["to"].clone()).unwrap();
    assert_eq!(to, FIXTURE_CONTRACT);
    assert_matches!(
        error.root_cause(),
        Error::Transport(TransportError::JsonRpc { code: 3, .. })
    );
}

#[tokio::test]
async fn test_invalid_request_is_wrapped() {
    let node = MockNode::new();
    let client = node.client();

    let error = client
        .estimate_gas(EstimateGasArgs::new(
            fixture_request()
                .with_max_fee_per_gas(U256::from(1))
                .with_max_priority_fee_per_gas(U256::from(2)),
        ))
        .await
        .unwrap_err();

    let error = match error {
        Error::Estimation(error) => error,
        other => panic!("expected an estimation error, got {other:?}"),
    };
    assert_matches!(error.root_cause(), Error::InvalidRequest(_));
    assert_eq!(node.call_count("eth_estimateGas"), 0);
}

#[tokio::test]
async fn test_block_selector_is_forwarded() {
    let node = MockNode::new();
    let client = node.client();

    client
        .estimate_gas(EstimateGasArgs::new(fixture_request()).with_block(BlockNumberOrTag::Number(16)))
        .await
        .unwrap();
    client
        .estimate_gas(EstimateGasArgs::new(fixture_request()))
        .await
        .unwrap();

    let calls = node.calls_to("eth_estimateGas");
    assert_eq!(calls[0].params[1], json!("0x10"));
    assert_eq!(calls[1].params.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_local_account_fills_everything_but_gas() {
    let node = MockNode::new();
    let client = node.client();

    let gas = client
        .estimate_gas(EstimateGasArgs::new(fixture_request()).with_account(Account::local(SENDER)))
        .await
        .unwrap();

    assert_eq!(gas, U256::from(FIXTURE_GAS));
    let calls = node.calls_to("eth_estimateGas");
    assert_eq!(calls.len(), 1);
    let sent = &calls[0].params[0];
    assert_eq!(sent["nonce"], json!("0x5"));
    assert!(sent.get("maxFeePerGas").is_some());
    assert_eq!(sent.get("chainId"), None);
    assert_eq!(sent.get("type"), None);
    let from: Address = serde_json::from_value(sent["from"].clone()).unwrap();
    assert_eq!(from, SENDER);
}

#[tokio::test]
async fn test_prepare_includes_surcharge() {
    let node = MockNode::new();
    let client = node.client();
    let signer = PrivateKeySigner::random();
    node.estimate_for(CONTRACT_A, 30_000);

    let prepared = client
        .prepare_transaction_request(
            PrepareTransactionArgs::new(
                fixture_request()
                    .with_authorization_list(vec![signed_authorization(&signer, CONTRACT_A)]),
            )
            .with_account(Account::json_rpc(SENDER)),
        )
        .await
        .unwrap();

    assert_eq!(prepared.transaction_type(), TransactionType::Eip7702);
    assert_eq!(prepared.gas(), Some(U256::from(FIXTURE_GAS + 60_000)));
}
