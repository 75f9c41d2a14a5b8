use alloy::{
    rpc::client::RpcClient,
    transports::http::Http,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::trace;
use url::Url;

use super::RpcTransport;
use crate::error::TransportError;

/// JSON-RPC over HTTP, backed by alloy's RPC client. Ids and envelope
/// validation are alloy's; this type only forwards raw JSON values.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: RpcClient,
    url: Url,
}

impl HttpTransport {
    pub fn new(url: Url) -> Result<Self, TransportError> {
        let client = Client::builder().use_rustls_tls().build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: Url) -> Self {
        let http = Http::with_client(client, url.clone());
        let is_local = http.guess_local();
        Self {
            client: RpcClient::new(http, is_local),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        trace!(target: "confidential_client::transport", %method, url = %self.url, "Sending request");
        let result = self
            .client
            .request::<Value, Value>(method.to_owned(), params)
            .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        Mock,
        MockServer,
        Request,
        Respond,
        ResponseTemplate,
        matchers::{
            body_partial_json,
            method,
        },
    };

    /// Answers with `payload` under the id of the incoming request.
    fn reply(payload: Value) -> impl Respond {
        move |request: &Request| {
            let body: Value = request.body_json().unwrap();
            let mut response = json!({ "jsonrpc": "2.0", "id": body["id"] });
            for (key, value) in payload.as_object().unwrap() {
                response[key] = value.clone();
            }
            ResponseTemplate::new(200).set_body_json(response)
        }
    }

    fn transport_for(server: &MockServer) -> HttpTransport {
        HttpTransport::new(server.uri().parse().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_request_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "jsonrpc": "2.0",
                "method": "eth_chainId",
                "params": [],
            })))
            .respond_with(reply(json!({ "result": "0x50b" })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport.request("eth_chainId", json!([])).await.unwrap();

        assert_eq!(result, json!("0x50b"));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_params_are_forwarded_verbatim() {
        let server = MockServer::start().await;
        let params = json!([{ "to": "0xf8beb8c8be514772097103e39c2cce057117cc92", "input": "0x61bc221a" }, "latest"]);
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_call",
                "params": params.clone(),
            })))
            .respond_with(reply(json!({ "result": "0x" })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport.request("eth_call", params).await.unwrap();

        assert_eq!(result, json!("0x"));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_null_result_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(json!({ "result": null })))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let result = transport
            .request("eth_getBlockByNumber", json!(["0x999999", false]))
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_json_rpc_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(json!({
                "error": { "code": -32000, "message": "execution reverted" }
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let error = transport
            .request("eth_estimateGas", json!([{}]))
            .await
            .unwrap_err();

        assert_matches!(
            error,
            TransportError::JsonRpc { code: -32000, ref message } if message == "execution reverted"
        );
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let error = transport.request("eth_chainId", json!([])).await.unwrap_err();

        assert_matches!(error, TransportError::InvalidResponse(msg) if msg.contains("401"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let error = transport.request("eth_chainId", json!([])).await.unwrap_err();

        assert_matches!(error, TransportError::InvalidResponse(_));
    }
}
