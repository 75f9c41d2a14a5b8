use alloy::{
    eips::BlockNumberOrTag,
    primitives::{
        Address,
        B256,
        U256,
    },
};
use assert_matches::assert_matches;
use confidential_client::{
    Account,
    CallArgs,
    Chain,
    ClientConfig,
    ConfidentialClient,
    Error,
    TransportError,
};
use int_test_utils::{
    FIXTURE_CALL_DATA,
    MockNode,
    defaults,
    fixture_request,
};
use pretty_assertions::assert_eq;
use serde_json::{
    Value,
    json,
};

const SENDER: Address = Address::repeat_byte(0x11);

#[tokio::test]
async fn test_typed_helpers() {
    let node = MockNode::new();
    let client = node.client();

    assert_eq!(client.chain_id().await.unwrap(), 1291);
    assert_eq!(client.gas_price().await.unwrap(), U256::from(defaults::GAS_PRICE));
    assert_eq!(
        client.max_priority_fee_per_gas().await.unwrap(),
        U256::from(defaults::MAX_PRIORITY_FEE)
    );
    assert_eq!(
        client
            .transaction_count(SENDER, BlockNumberOrTag::Pending)
            .await
            .unwrap(),
        defaults::TRANSACTION_COUNT
    );
    assert_eq!(
        client
            .balance(SENDER, BlockNumberOrTag::Latest)
            .await
            .unwrap(),
        U256::from(1_000_000_000_000_000_000u128)
    );
    assert_eq!(client.node_public_key().await.unwrap(), node.public_key());

    let block = client.block(BlockNumberOrTag::Latest).await.unwrap();
    assert_eq!(block.header.inner.number, 16);
    assert_eq!(block.header.inner.base_fee_per_gas, Some(defaults::BASE_FEE));
    assert_eq!(block.header.hash, B256::with_last_byte(0x10));

    let count = &node.calls_to("eth_getTransactionCount")[0];
    assert_eq!(count.params, json!([SENDER, "pending"]));
}

#[tokio::test]
async fn test_missing_block() {
    let node = MockNode::new();
    node.add_response("eth_getBlockByNumber", Value::Null);
    let client = node.client();

    let error = client
        .block(BlockNumberOrTag::Number(1_000_000))
        .await
        .unwrap_err();

    assert_matches!(error, Error::Transport(TransportError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_send_transaction_seals_data() {
    let node = MockNode::new();
    let client = node
        .client_builder()
        .with_chain(Chain::swisstronik_testnet())
        .build();

    let hash = client
        .send_transaction(fixture_request(), Some(Account::json_rpc(SENDER)))
        .await
        .unwrap();

    assert_eq!(hash, defaults::TX_HASH.parse::<B256>().unwrap());
    let sent = &node.calls_to("eth_sendTransaction")[0];
    assert_eq!(sent.plaintext, Some(FIXTURE_CALL_DATA));
    assert_eq!(sent.params[0]["chainId"], json!("0x50b"));
    let from: Address = serde_json::from_value(sent.params[0]["from"].clone()).unwrap();
    assert_eq!(from, SENDER);
}

#[tokio::test]
async fn test_send_transaction_uses_client_account() {
    let node = MockNode::new();
    let client = node
        .client_builder()
        .with_account(Account::json_rpc(SENDER))
        .build();

    client
        .send_transaction(fixture_request(), None)
        .await
        .unwrap();

    let sent = &node.calls_to("eth_sendTransaction")[0];
    let from: Address = serde_json::from_value(sent.params[0]["from"].clone()).unwrap();
    assert_eq!(from, SENDER);
}

#[tokio::test]
async fn test_send_transaction_requires_account() {
    let node = MockNode::new();
    let client = node.client();

    let error = client
        .send_transaction(fixture_request(), None)
        .await
        .unwrap_err();

    assert_matches!(error, Error::InvalidRequest(_));
    assert!(node.calls().is_empty());
}

#[tokio::test]
async fn test_call_defaults_to_latest_and_sets_from() {
    let node = MockNode::new();
    let client = node.client();

    client
        .call(
            CallArgs::new(fixture_request()).with_account(Account::json_rpc(SENDER)),
        )
        .await
        .unwrap();

    let call = &node.calls_to("eth_call")[0];
    assert_eq!(call.params[1], json!("latest"));
    let from: Address = serde_json::from_value(call.params[0]["from"].clone()).unwrap();
    assert_eq!(from, SENDER);
}

#[test]
fn test_from_config() {
    let config = ClientConfig::default()
        .with_chain_id(1291)
        .validate()
        .unwrap();
    let client = ConfidentialClient::from_config(&config).unwrap();

    let chain = client.chain().unwrap();
    assert_eq!(chain.id, 1291);
    assert_eq!(chain.name, "Swisstronik Testnet");
    assert_eq!(chain.fees.base_fee_multiplier_percent, 120);
}
