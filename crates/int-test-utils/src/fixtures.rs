use alloy::{
    consensus,
    eips::eip7702::{
        Authorization,
        SignedAuthorization,
    },
    primitives::{
        Address,
        B256,
        Bytes,
        U256,
        address,
        bytes,
    },
    rpc::types::{
        Block,
        BlockTransactions,
        Header,
    },
    signers::{
        SignerSync,
        local::PrivateKeySigner,
    },
};
use confidential_client::TransactionRequest;
use serde_json::Value;

/// Counter contract on the public testnet.
pub const FIXTURE_CONTRACT: Address = address!("F8bEB8c8Be514772097103e39C2ccE057117CC92");

/// `count()` selector.
pub const FIXTURE_CALL_DATA: Bytes = bytes!("61bc221a");

pub const FIXTURE_GAS: u64 = 23_325;

/// `{ to: FIXTURE_CONTRACT, data: FIXTURE_CALL_DATA }`
pub fn fixture_request() -> TransactionRequest {
    TransactionRequest::default()
        .with_to(FIXTURE_CONTRACT)
        .with_data(FIXTURE_CALL_DATA)
}

/// 32 byte word holding `0x050b`.
pub fn fixture_call_result() -> Bytes {
    Bytes::from(B256::left_padding_from(&[0x05, 0x0b]).to_vec())
}

/// Delegation of `signer` to `contract` on chain 1291.
pub fn signed_authorization(signer: &PrivateKeySigner, contract: Address) -> SignedAuthorization {
    let auth = Authorization {
        chain_id: U256::from(1291),
        address: contract,
        nonce: 0,
    };
    let signature = signer
        .sign_hash_sync(&auth.signature_hash())
        .expect("signing works");
    auth.into_signed(signature)
}

/// `eth_getBlockByNumber` reply for block 16 without transactions.
pub fn block_response(base_fee_per_gas: Option<u64>) -> Value {
    let block: Block = Block {
        header: Header {
            hash: B256::with_last_byte(0x10),
            inner: consensus::Header {
                number: 16,
                gas_limit: 30_000_000,
                base_fee_per_gas,
                ..Default::default()
            },
            total_difficulty: None,
            size: None,
        },
        uncles: vec![],
        transactions: BlockTransactions::Hashes(vec![]),
        withdrawals: None,
    };
    serde_json::to_value(block).expect("block serializes")
}
