//! The immutable result of preparation.
//!
//! [`TransactionKind`] carries exactly one fee model, so a prepared
//! transaction cannot hold both `gasPrice` and fee-market fields.

use alloy::{
    eips::eip2930::AccessList,
    primitives::{
        Address,
        B256,
        Bytes,
        U256,
    },
};
use serde::{
    Serialize,
    Serializer,
};

use crate::{
    error::{
        Error,
        FeeModelConflict,
        Result,
    },
    types::{
        AuthorizationEntry,
        BlobSidecar,
        TransactionRequest,
        TransactionType,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionKind {
    Legacy {
        gas_price: U256,
    },
    Eip2930 {
        gas_price: U256,
        access_list: AccessList,
    },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        access_list: Option<AccessList>,
    },
    Eip4844 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        max_fee_per_blob_gas: Option<U256>,
        blob_versioned_hashes: Vec<B256>,
        blobs: Option<Vec<Bytes>>,
        sidecars: Option<Vec<BlobSidecar>>,
        access_list: Option<AccessList>,
    },
    Eip7702 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        authorization_list: Vec<AuthorizationEntry>,
        access_list: Option<AccessList>,
    },
}

impl TransactionKind {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionKind::Legacy { .. } => TransactionType::Legacy,
            TransactionKind::Eip2930 { .. } => TransactionType::Eip2930,
            TransactionKind::Eip1559 { .. } => TransactionType::Eip1559,
            TransactionKind::Eip4844 { .. } => TransactionType::Eip4844,
            TransactionKind::Eip7702 { .. } => TransactionType::Eip7702,
        }
    }

    pub fn gas_price(&self) -> Option<U256> {
        match self {
            TransactionKind::Legacy { gas_price } | TransactionKind::Eip2930 { gas_price, .. } => {
                Some(*gas_price)
            }
            _ => None,
        }
    }

    /// `(maxFeePerGas, maxPriorityFeePerGas)` for fee-market kinds.
    pub fn fee_market(&self) -> Option<(U256, U256)> {
        match self {
            TransactionKind::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            }
            | TransactionKind::Eip4844 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            }
            | TransactionKind::Eip7702 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => Some((*max_fee_per_gas, *max_priority_fee_per_gas)),
            _ => None,
        }
    }
}

/// A fully resolved request. Fields the caller excluded from resolution stay
/// as the caller left them.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTransaction {
    from: Option<Address>,
    to: Option<Address>,
    data: Option<Bytes>,
    value: Option<U256>,
    nonce: Option<u64>,
    chain_id: Option<u64>,
    gas: Option<U256>,
    kind: TransactionKind,
}

impl PreparedTransaction {
    pub fn from(&self) -> Option<Address> {
        self.from
    }

    pub fn to(&self) -> Option<Address> {
        self.to
    }

    /// Call data as it will be sent, sealed when the request targets a contract.
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn value(&self) -> Option<U256> {
        self.value
    }

    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn gas(&self) -> Option<U256> {
        self.gas
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.kind
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.kind.transaction_type()
    }

    /// Flattens back into the JSON-RPC request shape.
    pub fn to_request(&self) -> TransactionRequest {
        let mut request = TransactionRequest {
            from: self.from,
            to: self.to,
            data: self.data.clone(),
            value: self.value,
            nonce: self.nonce,
            chain_id: self.chain_id,
            gas: self.gas,
            transaction_type: Some(self.transaction_type()),
            ..Default::default()
        };

        match &self.kind {
            TransactionKind::Legacy { gas_price } => {
                request.gas_price = Some(*gas_price);
            }
            TransactionKind::Eip2930 {
                gas_price,
                access_list,
            } => {
                request.gas_price = Some(*gas_price);
                request.access_list = Some(access_list.clone());
            }
            TransactionKind::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                access_list,
            } => {
                request.max_fee_per_gas = Some(*max_fee_per_gas);
                request.max_priority_fee_per_gas = Some(*max_priority_fee_per_gas);
                request.access_list = access_list.clone();
            }
            TransactionKind::Eip4844 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                max_fee_per_blob_gas,
                blob_versioned_hashes,
                blobs,
                sidecars,
                access_list,
            } => {
                request.max_fee_per_gas = Some(*max_fee_per_gas);
                request.max_priority_fee_per_gas = Some(*max_priority_fee_per_gas);
                request.max_fee_per_blob_gas = *max_fee_per_blob_gas;
                request.blob_versioned_hashes = Some(blob_versioned_hashes.clone());
                request.blobs = blobs.clone();
                request.sidecars = sidecars.clone();
                request.access_list = access_list.clone();
            }
            TransactionKind::Eip7702 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                authorization_list,
                access_list,
            } => {
                request.max_fee_per_gas = Some(*max_fee_per_gas);
                request.max_priority_fee_per_gas = Some(*max_priority_fee_per_gas);
                request.authorization_list = Some(authorization_list.clone());
                request.access_list = access_list.clone();
            }
        }

        request
    }
}

impl Serialize for PreparedTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_request().serialize(serializer)
    }
}

fn missing(field: &str, ty: TransactionType) -> Error {
    Error::InvalidRequest(format!("`{field}` is required for {ty} transactions"))
}

impl TryFrom<TransactionRequest> for PreparedTransaction {
    type Error = Error;

    fn try_from(request: TransactionRequest) -> Result<Self> {
        validate_request(&request)?;

        let ty = TransactionType::infer(&request).ok_or_else(|| {
            Error::InvalidRequest(
                "transaction type is unresolved; supply a fee field or resolve `type`".to_string(),
            )
        })?;

        let fee_market = |request: &TransactionRequest| -> Result<(U256, U256)> {
            Ok((
                request
                    .max_fee_per_gas
                    .ok_or_else(|| missing("maxFeePerGas", ty))?,
                request
                    .max_priority_fee_per_gas
                    .ok_or_else(|| missing("maxPriorityFeePerGas", ty))?,
            ))
        };

        let kind = match ty {
            TransactionType::Legacy => {
                TransactionKind::Legacy {
                    gas_price: request.gas_price.ok_or_else(|| missing("gasPrice", ty))?,
                }
            }
            TransactionType::Eip2930 => {
                TransactionKind::Eip2930 {
                    gas_price: request.gas_price.ok_or_else(|| missing("gasPrice", ty))?,
                    access_list: request.access_list.clone().unwrap_or_default(),
                }
            }
            TransactionType::Eip1559 => {
                let (max_fee_per_gas, max_priority_fee_per_gas) = fee_market(&request)?;
                TransactionKind::Eip1559 {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    access_list: request.access_list.clone(),
                }
            }
            TransactionType::Eip4844 => {
                let (max_fee_per_gas, max_priority_fee_per_gas) = fee_market(&request)?;
                if request.to.is_none() {
                    return Err(missing("to", ty));
                }
                let blob_versioned_hashes = request
                    .blob_versioned_hashes
                    .clone()
                    .filter(|hashes| !hashes.is_empty())
                    .ok_or_else(|| missing("blobVersionedHashes", ty))?;
                TransactionKind::Eip4844 {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    max_fee_per_blob_gas: request.max_fee_per_blob_gas,
                    blob_versioned_hashes,
                    blobs: request.blobs.clone(),
                    sidecars: request.sidecars.clone(),
                    access_list: request.access_list.clone(),
                }
            }
            TransactionType::Eip7702 => {
                let (max_fee_per_gas, max_priority_fee_per_gas) = fee_market(&request)?;
                let authorization_list = request
                    .authorization_list
                    .clone()
                    .filter(|list| !list.is_empty())
                    .ok_or_else(|| missing("authorizationList", ty))?;
                TransactionKind::Eip7702 {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    authorization_list,
                    access_list: request.access_list.clone(),
                }
            }
        };

        Ok(Self {
            from: request.from,
            to: request.to,
            data: request.data,
            value: request.value,
            nonce: request.nonce,
            chain_id: request.chain_id,
            gas: request.gas,
            kind,
        })
    }
}

/// Structural checks shared by preparation, estimation and submission.
pub fn validate_request(request: &TransactionRequest) -> Result<()> {
    let has_fee_market =
        request.max_fee_per_gas.is_some() || request.max_priority_fee_per_gas.is_some();

    if has_fee_market {
        if let Some(ty) = request.transaction_type {
            if !ty.is_fee_market() {
                return Err(FeeModelConflict::Eip1559FeesNotSupported.into());
            }
        }
        if request.gas_price.is_some() {
            return Err(Error::InvalidRequest(
                "cannot specify both `gasPrice` and `maxFeePerGas`/`maxPriorityFeePerGas`"
                    .to_string(),
            ));
        }
    }

    if let (Some(max_fee), Some(tip)) = (request.max_fee_per_gas, request.max_priority_fee_per_gas) {
        if tip > max_fee {
            return Err(Error::InvalidRequest(format!(
                "`maxPriorityFeePerGas` ({tip}) cannot be higher than `maxFeePerGas` ({max_fee})"
            )));
        }
    }

    Ok(())
}
