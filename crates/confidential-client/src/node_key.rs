//! Where the node's sealing key comes from.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{
    Value,
    json,
};
use tracing::debug;

use crate::{
    encryption::NodePublicKey,
    error::{
        Result,
        TransportError,
    },
    transport::SharedTransport,
};

pub const NODE_PUBLIC_KEY_METHOD: &str = "eth_getNodePublicKey";

#[async_trait]
pub trait NodeKeySource: Send + Sync {
    async fn node_public_key(&self) -> Result<NodePublicKey>;
}

pub type SharedNodeKeySource = Arc<dyn NodeKeySource>;

/// Asks the connected node for its key on every call.
pub struct RpcNodeKeySource {
    transport: SharedTransport,
}

impl RpcNodeKeySource {
    pub fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl NodeKeySource for RpcNodeKeySource {
    async fn node_public_key(&self) -> Result<NodePublicKey> {
        let result = self
            .transport
            .request(NODE_PUBLIC_KEY_METHOD, json!(["latest"]))
            .await?;

        let raw = match &result {
            Value::String(raw) => raw.as_str(),
            Value::Object(map) => {
                map.get("publicKey")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        TransportError::InvalidResponse(format!(
                            "{NODE_PUBLIC_KEY_METHOD} returned an object without `publicKey`"
                        ))
                    })?
            }
            other => {
                return Err(TransportError::InvalidResponse(format!(
                    "{NODE_PUBLIC_KEY_METHOD} returned {other}"
                ))
                .into());
            }
        };

        let key = raw.parse::<NodePublicKey>()?;
        debug!(target: "confidential_client::node_key", %key, "Fetched node public key");
        Ok(key)
    }
}

/// A key known ahead of time, e.g. from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticNodeKeySource(pub NodePublicKey);

#[async_trait]
impl NodeKeySource for StaticNodeKeySource {
    async fn node_public_key(&self) -> Result<NodePublicKey> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encryption::NodeKeypair,
        error::Error,
        transport::RpcTransport,
    };
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    struct FixedReply(Value);

    #[async_trait]
    impl RpcTransport for FixedReply {
        async fn request(
            &self,
            method: &str,
            params: Value,
        ) -> std::result::Result<Value, TransportError> {
            assert_eq!(method, NODE_PUBLIC_KEY_METHOD);
            assert_eq!(params, json!(["latest"]));
            Ok(self.0.clone())
        }
    }

    fn source(reply: Value) -> RpcNodeKeySource {
        RpcNodeKeySource::new(Arc::new(FixedReply(reply)))
    }

    #[tokio::test]
    async fn test_fetch_key_as_string() {
        let node = NodeKeypair::random();
        let key = source(json!(node.public_key().to_string()))
            .node_public_key()
            .await
            .unwrap();

        assert_eq!(key, node.public_key());
    }

    #[tokio::test]
    async fn test_fetch_key_as_object() {
        let node = NodeKeypair::random();
        let key = source(json!({ "publicKey": node.public_key().to_string() }))
            .node_public_key()
            .await
            .unwrap();

        assert_eq!(key, node.public_key());
    }

    #[tokio::test]
    async fn test_malformed_reply() {
        assert_matches!(
            source(json!(7)).node_public_key().await,
            Err(Error::Transport(TransportError::InvalidResponse(_)))
        );
        assert_matches!(
            source(json!("0xdead")).node_public_key().await,
            Err(Error::Encryption(_))
        );
    }

    #[tokio::test]
    async fn test_static_source() {
        let node = NodeKeypair::random();
        let key = StaticNodeKeySource(node.public_key())
            .node_public_key()
            .await
            .unwrap();

        assert_eq!(key, node.public_key());
    }
}
