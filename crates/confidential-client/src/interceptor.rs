//! Request interception on the client dispatch path.
//!
//! Every request issued through [`crate::ConfidentialClient::request`] walks the
//! interceptor chain front to back before it reaches the transport, and the
//! response walks it back in reverse. The [`EncryptionInterceptor`] sits last,
//! directly in front of the transport.

use std::sync::Arc;

use alloy::primitives::Bytes;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use tracing::{
    debug,
    trace,
};

use crate::{
    encryption::{
        self,
        NodePublicKey,
    },
    error::{
        Error,
        Result,
    },
    node_key::SharedNodeKeySource,
    transport::RpcTransport,
};

/// Methods whose first parameter carries executable call data.
pub const SEALED_METHODS: [&str; 3] = ["eth_call", "eth_estimateGas", "eth_sendTransaction"];

/// Fields that may carry call data once a chain formatter has run. Every
/// present one is sealed.
pub const CALL_DATA_FIELDS: [&str; 2] = ["data", "input"];

/// The only method whose result is sealed by the node.
pub const UNSEALED_RESULT_METHOD: &str = "eth_call";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// The remainder of the chain after the current interceptor.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    transport: &'a dyn RpcTransport,
    chain: &'a [SharedInterceptor],
}

impl<'a> Next<'a> {
    pub fn new(transport: &'a dyn RpcTransport, chain: &'a [SharedInterceptor]) -> Self {
        Self { transport, chain }
    }

    pub fn run(self, request: RpcRequest) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((head, rest)) => {
                    head.intercept(
                        request,
                        Next {
                            transport: self.transport,
                            chain: rest,
                        },
                    )
                    .await
                }
                None => {
                    trace!(target: "confidential_client::interceptor", method = %request.method, "Dispatching to transport");
                    Ok(self
                        .transport
                        .request(&request.method, request.params)
                        .await?)
                }
            }
        })
    }
}

#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, request: RpcRequest, next: Next<'_>) -> Result<Value>;
}

pub type SharedInterceptor = Arc<dyn RequestInterceptor>;

/// Seals call data on the way out and opens `eth_call` results on the way
/// back.
pub struct EncryptionInterceptor {
    key_source: SharedNodeKeySource,
}

impl EncryptionInterceptor {
    pub fn new(key_source: SharedNodeKeySource) -> Self {
        Self { key_source }
    }

    /// True when `method` carries call data and the first parameter has both
    /// a `to` and a non-empty `data` or `input`. Deployments and plain
    /// transfers pass through untouched.
    pub fn should_seal(method: &str, params: &Value) -> bool {
        if !SEALED_METHODS.contains(&method) {
            return false;
        }
        let Some(tx) = params.get(0) else {
            return false;
        };
        is_present(tx, "to") && !call_data_fields(tx).is_empty()
    }
}

fn is_present(tx: &Value, field: &str) -> bool {
    tx.get(field)
        .and_then(Value::as_str)
        .is_some_and(|value| !value.is_empty())
}

/// The call data fields of `tx` that hold a non-empty value.
fn call_data_fields(tx: &Value) -> Vec<&'static str> {
    CALL_DATA_FIELDS
        .into_iter()
        .filter(|field| is_present(tx, field))
        .collect()
}

#[async_trait]
impl RequestInterceptor for EncryptionInterceptor {
    async fn intercept(&self, request: RpcRequest, next: Next<'_>) -> Result<Value> {
        if !Self::should_seal(&request.method, &request.params) {
            return next.run(request).await;
        }

        let node_key = self.key_source.node_public_key().await?;
        let RpcRequest { method, mut params } = request;

        let tx = &mut params[0];
        let fields = call_data_fields(tx);
        let plaintext: Bytes = serde_json::from_value(tx[fields[0]].clone())?;
        for field in &fields[1..] {
            if serde_json::from_value::<Bytes>(tx[*field].clone())? != plaintext {
                return Err(Error::InvalidRequest(
                    "`data` and `input` carry different call data".to_string(),
                ));
            }
        }

        let envelope = encryption::seal(&node_key, &plaintext)?;
        let sealed = serde_json::to_value(&envelope.ciphertext)?;
        for field in &fields {
            tx[*field] = sealed.clone();
        }

        debug!(
            target: "confidential_client::interceptor",
            %method,
            ?fields,
            plaintext_len = plaintext.len(),
            sealed_len = envelope.ciphertext.len(),
            "Sealed call data"
        );

        let result = next.run(RpcRequest::new(method.clone(), params)).await?;
        if method != UNSEALED_RESULT_METHOD {
            return Ok(result);
        }

        let opened = open_result(&node_key, result, &envelope.encryption_key)?;
        Ok(serde_json::to_value(opened)?)
    }
}

fn open_result(
    node_key: &NodePublicKey,
    result: Value,
    encryption_key: &encryption::EncryptionKey,
) -> Result<Bytes> {
    let sealed: Bytes = serde_json::from_value(result)?;
    Ok(encryption::unseal(node_key, &sealed, encryption_key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encryption::NodeKeypair,
        error::TransportError,
        node_key::StaticNodeKeySource,
    };
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_should_seal_contract_calls() {
        let params = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "data": "0x61bc221a" }]);

        for method in SEALED_METHODS {
            assert!(EncryptionInterceptor::should_seal(method, &params), "{method}");
        }
        assert!(!EncryptionInterceptor::should_seal("eth_getBalance", &params));
    }

    #[test]
    fn test_should_not_seal_without_to_or_data() {
        let deployment = json!([{ "data": "0x6080" }]);
        let transfer = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "value": "0x1" }]);
        let null_to = json!([{ "to": null, "data": "0x6080" }]);
        let empty_data = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "data": "" }]);

        let empty_input = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "input": "" }]);

        for params in [
            deployment,
            transfer,
            null_to,
            empty_data,
            empty_input,
            json!([]),
            json!(["0x1"]),
        ] {
            assert!(
                !EncryptionInterceptor::should_seal("eth_call", &params),
                "{params}"
            );
        }
    }

    #[test]
    fn test_should_seal_input_field() {
        let params = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "input": "0x61bc221a" }]);

        for method in SEALED_METHODS {
            assert!(EncryptionInterceptor::should_seal(method, &params), "{method}");
        }
    }

    /// Acts as the node: opens sealed data and seals `eth_call` results.
    struct SealingNode {
        keypair: NodeKeypair,
        seen: Mutex<Vec<RpcRequest>>,
    }

    #[async_trait]
    impl RpcTransport for SealingNode {
        async fn request(
            &self,
            method: &str,
            params: Value,
        ) -> std::result::Result<Value, TransportError> {
            self.seen.lock().push(RpcRequest::new(method, params.clone()));
            let field = call_data_fields(&params[0])[0];
            let data: Bytes = serde_json::from_value(params[0][field].clone())?;
            let (plaintext, client_pk) = self
                .keypair
                .open_request(&data)
                .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
            assert_eq!(plaintext.as_ref(), &[0x61, 0xbc, 0x22, 0x1a]);

            match method {
                "eth_call" => {
                    let sealed = self
                        .keypair
                        .seal_response(&client_pk, &[0x05, 0x0b])
                        .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
                    Ok(serde_json::to_value(sealed)?)
                }
                _ => Ok(json!("0x5b1d")),
            }
        }
    }

    fn node() -> (SealingNode, Vec<SharedInterceptor>) {
        let keypair = NodeKeypair::random();
        let interceptor = EncryptionInterceptor::new(Arc::new(StaticNodeKeySource(
            keypair.public_key(),
        )));
        (
            SealingNode {
                keypair,
                seen: Mutex::new(vec![]),
            },
            vec![Arc::new(interceptor)],
        )
    }

    #[tokio::test]
    async fn test_eth_call_round_trip() {
        let (transport, chain) = node();
        let params = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "data": "0x61bc221a" }, "latest"]);

        let result = Next::new(&transport, &chain)
            .run(RpcRequest::new("eth_call", params))
            .await
            .unwrap();

        assert_eq!(result, json!("0x050b"));
        let seen = transport.seen.lock();
        assert_eq!(seen[0].params[1], json!("latest"));
        assert_ne!(seen[0].params[0]["data"], json!("0x61bc221a"));
    }

    #[tokio::test]
    async fn test_estimate_result_is_not_unsealed() {
        let (transport, chain) = node();
        let params = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "data": "0x61bc221a" }]);

        let result = Next::new(&transport, &chain)
            .run(RpcRequest::new("eth_estimateGas", params))
            .await
            .unwrap();

        assert_eq!(result, json!("0x5b1d"));
    }

    #[tokio::test]
    async fn test_input_field_is_sealed() {
        let (transport, chain) = node();
        let params = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "input": "0x61bc221a" }, "latest"]);

        let result = Next::new(&transport, &chain)
            .run(RpcRequest::new("eth_call", params))
            .await
            .unwrap();

        assert_eq!(result, json!("0x050b"));
        let seen = transport.seen.lock();
        assert_ne!(seen[0].params[0]["input"], json!("0x61bc221a"));
        assert_eq!(seen[0].params[0].get("data"), None);
    }

    #[tokio::test]
    async fn test_data_and_input_share_one_ciphertext() {
        let (transport, chain) = node();
        let params = json!([{
            "to": "0xf8beb8c8be514772097103e39c2cce057117cc92",
            "data": "0x61bc221a",
            "input": "0x61bc221a",
        }]);

        Next::new(&transport, &chain)
            .run(RpcRequest::new("eth_estimateGas", params))
            .await
            .unwrap();

        let seen = transport.seen.lock();
        let tx = &seen[0].params[0];
        assert_ne!(tx["data"], json!("0x61bc221a"));
        assert_eq!(tx["data"], tx["input"]);
    }

    #[tokio::test]
    async fn test_conflicting_call_data_is_rejected() {
        let (transport, chain) = node();
        let params = json!([{
            "to": "0xf8beb8c8be514772097103e39c2cce057117cc92",
            "data": "0x61bc221a",
            "input": "0x12345678",
        }]);

        let error = Next::new(&transport, &chain)
            .run(RpcRequest::new("eth_estimateGas", params))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::InvalidRequest(_)));
        assert!(transport.seen.lock().is_empty());
    }

    struct Tagger(&'static str);

    #[async_trait]
    impl RequestInterceptor for Tagger {
        async fn intercept(&self, mut request: RpcRequest, next: Next<'_>) -> Result<Value> {
            request.method.push_str(self.0);
            next.run(request).await
        }
    }

    struct Echo;

    #[async_trait]
    impl RpcTransport for Echo {
        async fn request(
            &self,
            method: &str,
            _params: Value,
        ) -> std::result::Result<Value, TransportError> {
            Ok(json!(method))
        }
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let chain: Vec<SharedInterceptor> = vec![Arc::new(Tagger("_a")), Arc::new(Tagger("_b"))];

        let result = Next::new(&Echo, &chain)
            .run(RpcRequest::new("m", json!([])))
            .await
            .unwrap();

        assert_eq!(result, json!("m_a_b"));
    }
}
