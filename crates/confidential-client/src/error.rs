//! Error types for the confidential client

use alloy::{
    primitives::{
        Address,
        U256,
    },
    transports::{
        RpcError,
        TransportErrorKind,
    },
};
use thiserror::Error;

use crate::encryption::EncryptionError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top level error type for the client and the preparation pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The request violates a structural rule (conflicting fee fields, missing
    /// field for the resolved transaction type).
    #[error("invalid transaction request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    FeeModelConflict(#[from] FeeModelConflict),
    #[error("`to` is required; could not infer from authorizationList: {0}")]
    AuthorizationRecovery(String),
    #[error(transparent)]
    Estimation(#[from] Box<EstimationError>),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),
    #[error("blob error: {0}")]
    Blob(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Caller supplied fee fields that do not fit the resolved fee model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeModelConflict {
    #[error(
        "`maxFeePerGas` cannot be lower than the estimated `maxPriorityFeePerGas` ({max_priority_fee_per_gas} wei)"
    )]
    MaxFeePerGasTooLow { max_priority_fee_per_gas: U256 },
    #[error("chain does not support EIP-1559 fees")]
    Eip1559FeesNotSupported,
}

/// Failure reported by the underlying RPC transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON-RPC error code {code}: {message}")]
    JsonRpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("RPC transport error: {0}")]
    Rpc(#[source] RpcError<TransportErrorKind>),
}

impl From<RpcError<TransportErrorKind>> for TransportError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        match error {
            RpcError::ErrorResp(payload) => {
                Self::JsonRpc {
                    code: payload.code,
                    message: payload.message.into_owned(),
                }
            }
            RpcError::Transport(TransportErrorKind::HttpError(error)) => {
                Self::InvalidResponse(format!("HTTP error: {}", error.status))
            }
            RpcError::SerError(error) => Self::Json(error),
            RpcError::DeserError { err, text } => {
                Self::InvalidResponse(format!("{err}: {text}"))
            }
            other => Self::Rpc(other),
        }
    }
}

/// `eth_estimateGas` failed. Carries the request context so callers can report
/// it without re-deriving the account or chain.
#[derive(Debug, Error)]
#[error("gas estimation failed (account: {account:?}, chain: {chain_id:?}): {source}")]
pub struct EstimationError {
    pub source: Box<Error>,
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    /// The caller's arguments as they were handed to the estimator.
    pub request: serde_json::Value,
}

impl EstimationError {
    /// The innermost error, skipping nested estimation wrappers.
    pub fn root_cause(&self) -> &Error {
        match self.source.as_ref() {
            Error::Estimation(inner) => inner.root_cause(),
            other => other,
        }
    }
}
