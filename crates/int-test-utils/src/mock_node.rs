use std::sync::Arc;

use alloy::primitives::{
    Address,
    Bytes,
};
use async_trait::async_trait;
use confidential_client::{
    ConfidentialClient,
    ConfidentialClientBuilder,
    NodeKeypair,
    NodePublicKey,
    RpcTransport,
    TransportError,
    interceptor::{
        CALL_DATA_FIELDS,
        SEALED_METHODS,
    },
    node_key::NODE_PUBLIC_KEY_METHOD,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{
    Value,
    json,
};
use tracing::debug;

/// Default replies of a fresh [`MockNode`].
pub mod defaults {
    /// 1291
    pub const CHAIN_ID: &str = "0x50b";
    pub const BASE_FEE: u64 = 7;
    pub const TRANSACTION_COUNT: u64 = 5;
    /// 1 gwei
    pub const GAS_PRICE: u64 = 1_000_000_000;
    /// 1.5 gwei
    pub const MAX_PRIORITY_FEE: u64 = 1_500_000_000;
    /// 1 ether
    pub const BALANCE: &str = "0xde0b6b3a7640000";
    pub const ESTIMATE: u64 = 23_325;
    pub const TX_HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Result(Value),
    Error { code: i64, message: String },
}

impl MockReply {
    fn into_result(self) -> Result<Value, TransportError> {
        match self {
            MockReply::Result(value) => Ok(value),
            MockReply::Error { code, message } => Err(TransportError::JsonRpc { code, message }),
        }
    }
}

/// One request as the node saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    /// The opened call data when the request was sealed.
    pub plaintext: Option<Bytes>,
}

/// In-process confidential node keyed by method name.
///
/// Holds a real node keypair: sealed call data is opened with it and `eth_call`
/// results are sealed back to the caller's key.
pub struct MockNode {
    keypair: NodeKeypair,
    responses: DashMap<String, MockReply>,
    estimates_by_target: DashMap<Address, MockReply>,
    call_result: Mutex<Bytes>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNode")
            .field("public_key", &self.keypair.public_key())
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        let node = Self {
            keypair: NodeKeypair::random(),
            responses: DashMap::new(),
            estimates_by_target: DashMap::new(),
            call_result: Mutex::new(crate::fixture_call_result()),
            calls: Mutex::new(Vec::new()),
        };
        node.setup_default_responses();
        Arc::new(node)
    }

    fn setup_default_responses(&self) {
        self.add_response("eth_chainId", json!(defaults::CHAIN_ID));
        self.add_response(
            "eth_getBlockByNumber",
            crate::block_response(Some(defaults::BASE_FEE)),
        );
        self.add_response(
            "eth_getTransactionCount",
            json!(format!("{:#x}", defaults::TRANSACTION_COUNT)),
        );
        self.add_response("eth_gasPrice", json!(format!("{:#x}", defaults::GAS_PRICE)));
        self.add_response(
            "eth_maxPriorityFeePerGas",
            json!(format!("{:#x}", defaults::MAX_PRIORITY_FEE)),
        );
        self.add_response("eth_getBalance", json!(defaults::BALANCE));
        self.add_response("eth_estimateGas", json!(format!("{:#x}", defaults::ESTIMATE)));
        self.add_response("eth_sendTransaction", json!(defaults::TX_HASH));
        self.add_response(
            NODE_PUBLIC_KEY_METHOD,
            json!(self.keypair.public_key().to_string()),
        );
    }

    /// Client wired to this node with default interceptors.
    pub fn client(self: &Arc<Self>) -> ConfidentialClient {
        self.client_builder().build()
    }

    pub fn client_builder(self: &Arc<Self>) -> ConfidentialClientBuilder {
        ConfidentialClient::builder(self.clone())
    }

    pub fn public_key(&self) -> NodePublicKey {
        self.keypair.public_key()
    }

    pub fn add_response(&self, method: &str, response: Value) {
        self.responses
            .insert(method.to_string(), MockReply::Result(response));
    }

    pub fn mock_rpc_error(&self, method: &str, code: i64, message: &str) {
        self.responses.insert(
            method.to_string(),
            MockReply::Error {
                code,
                message: message.to_string(),
            },
        );
    }

    pub fn remove_response(&self, method: &str) {
        self.responses.remove(method);
    }

    /// `eth_estimateGas` reply for requests sent to `target`.
    pub fn estimate_for(&self, target: Address, gas: u64) {
        self.estimates_by_target
            .insert(target, MockReply::Result(json!(format!("{gas:#x}"))));
    }

    pub fn fail_estimate_for(&self, target: Address) {
        self.estimates_by_target.insert(
            target,
            MockReply::Error {
                code: 3,
                message: "execution reverted".to_string(),
            },
        );
    }

    /// Plaintext result of `eth_call`, sealed before it is returned.
    pub fn set_call_result(&self, result: Bytes) {
        *self.call_result.lock() = result;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    /// Opens `params[0].data`, or `params[0].input`, when the shape is one
    /// the client seals.
    fn open(&self, method: &str, params: &Value) -> Result<Option<(Bytes, [u8; 32])>, TransportError> {
        if !SEALED_METHODS.contains(&method) {
            return Ok(None);
        }
        let tx = &params[0];
        let has = |field: &str| tx[field].as_str().is_some_and(|value| !value.is_empty());
        let Some(field) = CALL_DATA_FIELDS.into_iter().find(|field| has(field)) else {
            return Ok(None);
        };
        if !has("to") {
            return Ok(None);
        }

        let sealed: Bytes = serde_json::from_value(tx[field].clone())?;
        self.keypair.open_request(&sealed).map(Some).map_err(|err| {
            TransportError::JsonRpc {
                code: -32000,
                message: format!("failed to decrypt data: {err}"),
            }
        })
    }

    fn reply(&self, method: &str) -> Result<Value, TransportError> {
        self.responses
            .get(method)
            .map(|reply| reply.value().clone())
            .unwrap_or_else(|| {
                MockReply::Error {
                    code: -32601,
                    message: format!("the method {method} does not exist/is not available"),
                }
            })
            .into_result()
    }
}

#[async_trait]
impl RpcTransport for MockNode {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let opened = self.open(method, &params);
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
            plaintext: opened
                .as_ref()
                .ok()
                .and_then(|opened| opened.as_ref().map(|(plaintext, _)| plaintext.clone())),
        });
        let opened = opened?;
        debug!(target: "int_test_utils::mock_node", %method, sealed = opened.is_some(), "Mock request");

        match method {
            "eth_estimateGas" => {
                let target = params[0]["to"]
                    .as_str()
                    .and_then(|to| to.parse::<Address>().ok());
                if let Some(reply) = target.and_then(|to| self.estimates_by_target.get(&to)) {
                    return reply.value().clone().into_result();
                }
                self.reply(method)
            }
            "eth_call" => {
                if let Some(reply) = self.responses.get(method) {
                    if let MockReply::Error { .. } = reply.value() {
                        return reply.value().clone().into_result();
                    }
                }
                let result = self.call_result.lock().clone();
                match opened {
                    Some((_, client_pk)) => {
                        let sealed = self
                            .keypair
                            .seal_response(&client_pk, &result)
                            .map_err(|err| TransportError::InvalidResponse(err.to_string()))?;
                        Ok(serde_json::to_value(sealed)?)
                    }
                    None => Ok(serde_json::to_value(result)?),
                }
            }
            _ => self.reply(method),
        }
    }
}
