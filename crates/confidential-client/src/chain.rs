use std::{
    fmt,
    sync::Arc,
};

use alloy::primitives::U256;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use crate::{
    error::Result,
    types::TransactionRequest,
};

pub const SWISSTRONIK_TESTNET_ID: u64 = 1291;
pub const SWISSTRONIK_TESTNET_RPC: &str = "https://json-rpc.testnet.swisstronik.com";

pub const DEFAULT_BASE_FEE_MULTIPLIER_PERCENT: u64 = 120;

/// Turns a request into the JSON object a chain expects for
/// `eth_estimateGas`/`eth_sendTransaction`.
pub trait RequestFormatter: Send + Sync + fmt::Debug {
    fn format(&self, request: &TransactionRequest) -> Result<Value>;
}

/// Plain JSON-RPC transaction object.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl RequestFormatter for DefaultFormatter {
    fn format(&self, request: &TransactionRequest) -> Result<Value> {
        Ok(serde_json::to_value(request)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Applied to the base fee (fee market) or gas price (legacy), in percent.
    pub base_fee_multiplier_percent: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            base_fee_multiplier_percent: DEFAULT_BASE_FEE_MULTIPLIER_PERCENT,
        }
    }
}

impl FeeConfig {
    pub fn apply(&self, value: U256) -> U256 {
        value.saturating_mul(U256::from(self.base_fee_multiplier_percent)) / U256::from(100)
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    pub id: u64,
    pub name: String,
    pub fees: FeeConfig,
    pub formatter: Option<Arc<dyn RequestFormatter>>,
}

impl Chain {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            fees: FeeConfig::default(),
            formatter: None,
        }
    }

    pub fn swisstronik_testnet() -> Self {
        Self::new(SWISSTRONIK_TESTNET_ID, "Swisstronik Testnet")
    }

    pub fn with_fees(mut self, fees: FeeConfig) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn RequestFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }
}

/// Formats with the chain's formatter, or as a plain JSON-RPC object.
pub fn format_request(chain: Option<&Chain>, request: &TransactionRequest) -> Result<Value> {
    match chain.and_then(|chain| chain.formatter.as_deref()) {
        Some(formatter) => formatter.format(request),
        None => DefaultFormatter.format(request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug)]
    struct InputFormatter;

    impl RequestFormatter for InputFormatter {
        fn format(&self, request: &TransactionRequest) -> Result<Value> {
            let mut value = serde_json::to_value(request)?;
            if let Some(data) = value.as_object_mut().and_then(|obj| obj.remove("data")) {
                value["input"] = data;
            }
            Ok(value)
        }
    }

    #[test]
    fn test_fee_multiplier() {
        let fees = FeeConfig::default();
        assert_eq!(fees.apply(U256::from(7)), U256::from(8));
        assert_eq!(fees.apply(U256::from(1_000_000_000u64)), U256::from(1_200_000_000u64));

        let flat = FeeConfig {
            base_fee_multiplier_percent: 100,
        };
        assert_eq!(flat.apply(U256::from(7)), U256::from(7));
    }

    #[test]
    fn test_testnet_preset() {
        let chain = Chain::swisstronik_testnet();
        assert_eq!(chain.id, 1291);
        assert_eq!(chain.name, "Swisstronik Testnet");
        assert_eq!(chain.fees.base_fee_multiplier_percent, 120);
        assert!(chain.formatter.is_none());
    }

    #[test]
    fn test_format_request_uses_chain_formatter() {
        let request = TransactionRequest::default()
            .with_to(Address::repeat_byte(0x22))
            .with_data(vec![0x61, 0xbc]);

        assert_eq!(
            format_request(None, &request).unwrap(),
            json!({ "to": "0x2222222222222222222222222222222222222222", "data": "0x61bc" })
        );

        let chain = Chain::swisstronik_testnet().with_formatter(Arc::new(InputFormatter));
        assert_eq!(
            format_request(Some(&chain), &request).unwrap(),
            json!({ "to": "0x2222222222222222222222222222222222222222", "input": "0x61bc" })
        );
    }
}
