use std::{
    collections::BTreeSet,
    fmt,
    str::FromStr,
};

use alloy::{
    eips::{
        eip2930::AccessList,
        eip7702::SignedAuthorization,
    },
    primitives::{
        Address,
        B256,
        Bytes,
        FixedBytes,
        U64,
        U256,
    },
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};

use crate::error::Error;

/// A signed EIP-7702 delegation. `address` is the delegated contract.
pub type AuthorizationEntry = SignedAuthorization;

/// 48 byte KZG commitment or proof.
pub type KzgBytes = FixedBytes<48>;

/// Transaction envelope types the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Legacy,
    Eip2930,
    Eip1559,
    Eip4844,
    Eip7702,
}

impl TransactionType {
    pub const fn as_u8(self) -> u8 {
        match self {
            TransactionType::Legacy => 0,
            TransactionType::Eip2930 => 1,
            TransactionType::Eip1559 => 2,
            TransactionType::Eip4844 => 3,
            TransactionType::Eip7702 => 4,
        }
    }

    /// Whether the type is priced with `maxFeePerGas`/`maxPriorityFeePerGas`.
    pub const fn is_fee_market(self) -> bool {
        !matches!(self, TransactionType::Legacy | TransactionType::Eip2930)
    }

    /// Classifies the populated fields of a request. Returns `None` when the
    /// fields carry no hint, in which case the caller decides from the chain.
    pub fn infer(request: &TransactionRequest) -> Option<Self> {
        if let Some(ty) = request.transaction_type {
            return Some(ty);
        }
        if request.authorization_list.is_some() {
            return Some(TransactionType::Eip7702);
        }
        if request.blobs.is_some()
            || request.blob_versioned_hashes.is_some()
            || request.max_fee_per_blob_gas.is_some()
            || request.sidecars.is_some()
        {
            return Some(TransactionType::Eip4844);
        }
        if request.max_fee_per_gas.is_some() || request.max_priority_fee_per_gas.is_some() {
            return Some(TransactionType::Eip1559);
        }
        if request.gas_price.is_some() {
            if request.access_list.is_some() {
                return Some(TransactionType::Eip2930);
            }
            return Some(TransactionType::Legacy);
        }
        None
    }
}

impl TryFrom<u64> for TransactionType {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TransactionType::Legacy),
            1 => Ok(TransactionType::Eip2930),
            2 => Ok(TransactionType::Eip1559),
            3 => Ok(TransactionType::Eip4844),
            4 => Ok(TransactionType::Eip7702),
            other => {
                Err(Error::InvalidRequest(format!(
                    "unknown transaction type {other:#x}"
                )))
            }
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Legacy => write!(f, "legacy"),
            TransactionType::Eip2930 => write!(f, "eip2930"),
            TransactionType::Eip1559 => write!(f, "eip1559"),
            TransactionType::Eip4844 => write!(f, "eip4844"),
            TransactionType::Eip7702 => write!(f, "eip7702"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" | "0x0" => Ok(TransactionType::Legacy),
            "eip2930" | "0x1" => Ok(TransactionType::Eip2930),
            "eip1559" | "0x2" => Ok(TransactionType::Eip1559),
            "eip4844" | "0x3" => Ok(TransactionType::Eip4844),
            "eip7702" | "0x4" => Ok(TransactionType::Eip7702),
            _ => {
                Err(Error::InvalidRequest(format!(
                    "invalid transaction type '{s}'. Valid values are: legacy, eip2930, eip1559, eip4844, eip7702"
                )))
            }
        }
    }
}

impl Serialize for TransactionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", self.as_u8()))
    }
}

impl<'de> Deserialize<'de> for TransactionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = U64::deserialize(deserializer)?;
        TransactionType::try_from(raw.to::<u64>()).map_err(serde::de::Error::custom)
    }
}

/// Signing capability of an account. Local accounts sign in process; JSON-RPC
/// accounts are signed for by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    Local,
    JsonRpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub kind: AccountKind,
}

impl Account {
    pub const fn local(address: Address) -> Self {
        Self {
            address,
            kind: AccountKind::Local,
        }
    }

    pub const fn json_rpc(address: Address) -> Self {
        Self {
            address,
            kind: AccountKind::JsonRpc,
        }
    }

    pub const fn is_local(&self) -> bool {
        matches!(self.kind, AccountKind::Local)
    }
}

impl From<Address> for Account {
    /// A bare address is an account the node signs for.
    fn from(address: Address) -> Self {
        Account::json_rpc(address)
    }
}

/// One blob with its commitment and proof, as attached to an EIP-4844
/// transaction on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSidecar {
    pub blob: Bytes,
    pub commitment: KzgBytes,
    pub proof: KzgBytes,
}

/// The accumulator the preparation pipeline fills in.
///
/// Serializes to the JSON-RPC transaction object shape: quantities are hex and
/// `sidecars` never leave the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub nonce: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_blob_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_list: Option<Vec<AuthorizationEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blobs: Option<Vec<Bytes>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<B256>>,
    #[serde(skip)]
    pub sidecars: Option<Vec<BlobSidecar>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
}

impl TransactionRequest {
    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_gas(mut self, gas: U256) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_max_fee_per_gas(mut self, max_fee_per_gas: U256) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas);
        self
    }

    pub fn with_max_priority_fee_per_gas(mut self, max_priority_fee_per_gas: U256) -> Self {
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        self
    }

    pub fn with_access_list(mut self, access_list: AccessList) -> Self {
        self.access_list = Some(access_list);
        self
    }

    pub fn with_authorization_list(mut self, authorization_list: Vec<AuthorizationEntry>) -> Self {
        self.authorization_list = Some(authorization_list);
        self
    }

    pub fn with_blobs(mut self, blobs: Vec<Bytes>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    /// Whether the request carries call data to an existing contract, i.e. the
    /// shape that gets sealed before it leaves the client.
    pub fn is_contract_call(&self) -> bool {
        self.to.is_some() && self.data.is_some()
    }
}

/// Fields the pipeline may resolve on the caller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrepareParameter {
    BlobVersionedHashes,
    ChainId,
    Fees,
    Gas,
    Nonce,
    Type,
    Sidecars,
}

/// The set of [`PrepareParameter`]s to resolve. Defaults to everything except
/// sidecars.
///
/// A set without [`PrepareParameter::Fees`] or [`PrepareParameter::Type`]
/// needs a request that already carries `type` or a fee field; otherwise
/// preparation fails with [`crate::Error::InvalidRequest`] instead of returning
/// a partly filled request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeSet<PrepareParameter>);

impl Default for ParameterSet {
    fn default() -> Self {
        Self::only([
            PrepareParameter::BlobVersionedHashes,
            PrepareParameter::ChainId,
            PrepareParameter::Fees,
            PrepareParameter::Gas,
            PrepareParameter::Nonce,
            PrepareParameter::Type,
        ])
    }
}

impl ParameterSet {
    pub fn only(parameters: impl IntoIterator<Item = PrepareParameter>) -> Self {
        Self(parameters.into_iter().collect())
    }

    pub fn contains(&self, parameter: PrepareParameter) -> bool {
        self.0.contains(&parameter)
    }

    pub fn with(mut self, parameter: PrepareParameter) -> Self {
        self.0.insert(parameter);
        self
    }

    pub fn without(mut self, parameter: PrepareParameter) -> Self {
        self.0.remove(&parameter);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = PrepareParameter> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<PrepareParameter> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = PrepareParameter>>(iter: T) -> Self {
        Self::only(iter)
    }
}
