//! Client configuration

use serde::{
    Deserialize,
    Serialize,
};
use url::Url;

use crate::{
    chain::{
        Chain,
        DEFAULT_BASE_FEE_MULTIPLIER_PERCENT,
        FeeConfig,
        SWISSTRONIK_TESTNET_ID,
        SWISSTRONIK_TESTNET_RPC,
    },
    encryption::NodePublicKey,
    error::{
        Error,
        Result,
    },
    types::ParameterSet,
};

pub const RPC_URL_ENV: &str = "CONFIDENTIAL_RPC_URL";
pub const CHAIN_ID_ENV: &str = "CONFIDENTIAL_CHAIN_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the confidential node.
    pub rpc_url: Url,
    /// Pins the chain id instead of asking the node.
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_base_fee_multiplier_percent")]
    pub base_fee_multiplier_percent: u64,
    /// Skips the per-call key lookup when the node key is known.
    #[serde(default)]
    pub node_public_key: Option<NodePublicKey>,
    /// Parameters the CLI resolves by default.
    #[serde(default)]
    pub parameters: ParameterSet,
}

fn default_base_fee_multiplier_percent() -> u64 {
    DEFAULT_BASE_FEE_MULTIPLIER_PERCENT
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(SWISSTRONIK_TESTNET_RPC).expect("static URL"),
            chain_id: Some(SWISSTRONIK_TESTNET_ID),
            base_fee_multiplier_percent: default_base_fee_multiplier_percent(),
            node_public_key: None,
            parameters: ParameterSet::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            chain_id: None,
            ..Default::default()
        }
    }

    /// Reads `CONFIDENTIAL_RPC_URL` and `CONFIDENTIAL_CHAIN_ID`, falling back
    /// to the public testnet when the URL is unset.
    pub fn from_env() -> Result<Self> {
        let Ok(raw_url) = std::env::var(RPC_URL_ENV) else {
            return Ok(Self::default());
        };

        let rpc_url = Url::parse(raw_url.trim())
            .map_err(|e| Error::Config(format!("{RPC_URL_ENV} is not a valid URL: {e}")))?;
        let chain_id = match std::env::var(CHAIN_ID_ENV) {
            Ok(raw) => {
                Some(raw.trim().parse::<u64>().map_err(|e| {
                    Error::Config(format!("{CHAIN_ID_ENV} is not a valid chain id: {e}"))
                })?)
            }
            Err(_) => None,
        };

        Ok(Self {
            chain_id,
            ..Self::new(rpc_url)
        })
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_node_public_key(mut self, key: NodePublicKey) -> Self {
        self.node_public_key = Some(key);
        self
    }

    /// Validates a configuration loaded from CLI flags or the environment.
    pub fn validate(self) -> Result<Self> {
        if !matches!(self.rpc_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "rpc_url must use http:// or https://, got {}",
                self.rpc_url
            )));
        }

        if self.base_fee_multiplier_percent == 0 {
            return Err(Error::Config(
                "base_fee_multiplier_percent must be greater than zero".to_string(),
            ));
        }

        Ok(self)
    }

    /// The chain the client is pinned to, if a chain id is configured.
    pub fn chain(&self) -> Option<Chain> {
        let id = self.chain_id?;
        let chain = if id == SWISSTRONIK_TESTNET_ID {
            Chain::swisstronik_testnet()
        } else {
            Chain::new(id, format!("chain-{id}"))
        };
        Some(
            chain.with_fees(FeeConfig {
                base_fee_multiplier_percent: self.base_fee_multiplier_percent,
            }),
        )
    }
}
