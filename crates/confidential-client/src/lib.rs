//! Confidential transaction client.
//!
//! Confidential EVM nodes only accept call data that has been sealed to the
//! node's published X25519 key. This crate exposes two integration surfaces:
//!
//! - [`ConfidentialClient`], a JSON-RPC client whose dispatch path runs through
//!   a chain of [`RequestInterceptor`]s. The [`EncryptionInterceptor`] seals the
//!   `data` field of `eth_call`, `eth_estimateGas` and `eth_sendTransaction`
//!   and unseals `eth_call` results.
//! - The preparation pipeline ([`prepare_transaction_request`],
//!   [`estimate_gas`]) that fills chain id, nonce, fees, gas, blob commitments
//!   and the EIP-7702 implied recipient for a partially filled request.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod authorization;
pub mod blobs;
pub mod chain;
pub mod client;
pub mod config;
pub mod encryption;
pub mod error;
pub mod estimate;
pub mod fees;
pub mod interceptor;
pub mod node_key;
pub mod nonce;
pub mod prepare;
pub mod prepared;
pub mod transport;
pub mod types;

pub use blobs::{
    BlobCommitmentSet,
    Kzg,
    SharedKzg,
};
pub use chain::{
    Chain,
    DefaultFormatter,
    FeeConfig,
    RequestFormatter,
};
pub use client::{
    CallArgs,
    ConfidentialClient,
    ConfidentialClientBuilder,
};
pub use config::ClientConfig;
pub use encryption::{
    EncryptionEnvelope,
    EncryptionKey,
    NodeKeypair,
    NodePublicKey,
};
pub use error::{
    Error,
    EstimationError,
    FeeModelConflict,
    Result,
    TransportError,
};
pub use estimate::{
    EstimateGasArgs,
    estimate_gas,
};
pub use interceptor::{
    EncryptionInterceptor,
    Next,
    RequestInterceptor,
    RpcRequest,
    SharedInterceptor,
};
pub use node_key::{
    NodeKeySource,
    RpcNodeKeySource,
    StaticNodeKeySource,
};
pub use nonce::{
    LocalNonceManager,
    NonceManager,
    SharedNonceManager,
};
pub use prepare::{
    PrepareTransactionArgs,
    prepare_transaction_request,
};
pub use prepared::{
    PreparedTransaction,
    TransactionKind,
};
pub use transport::{
    HttpTransport,
    RpcTransport,
    SharedTransport,
};
pub use types::{
    Account,
    AccountKind,
    AuthorizationEntry,
    BlobSidecar,
    ParameterSet,
    PrepareParameter,
    TransactionRequest,
    TransactionType,
};
