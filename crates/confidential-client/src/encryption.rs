//! Call-data sealing.
//!
//! ```text
//! request:  clientPublicKey(32) || nonce(12) || ChaCha20-Poly1305(payload)
//! response: nonce(12) || ChaCha20-Poly1305(payload)
//! ```
//!
//! The client public key is derived from the per-call [`EncryptionKey`]. Both
//! directions use the AEAD key `blake3::derive_key(KEY_CONTEXT, shared ||
//! clientPublicKey || nodePublicKey)`, where `shared` is the X25519 secret
//! between the per-call key and the node key.

use std::{
    fmt,
    str::FromStr,
};

use alloy::primitives::{
    B256,
    Bytes,
};
use chacha20poly1305::{
    ChaCha20Poly1305,
    Key,
    Nonce,
    aead::{
        Aead,
        KeyInit,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;
use x25519_dalek::{
    PublicKey,
    StaticSecret,
};

const KEY_CONTEXT: &str = "confidential-client 2024-06 call-data v1";

pub const PUBLIC_KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Bytes a sealed request adds on top of the plaintext.
pub const REQUEST_OVERHEAD: usize = PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("invalid node public key: {0}")]
    InvalidPublicKey(String),
    #[error("ciphertext too short: {len} bytes, expected at least {min}")]
    Truncated { len: usize, min: usize },
    #[error("failed to seal payload")]
    Seal,
    #[error("failed to unseal payload: authentication failed")]
    Unseal,
}

/// X25519 public key published by a confidential node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePublicKey(B256);

impl NodePublicKey {
    pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(B256::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0.0
    }

    fn to_x25519(self) -> PublicKey {
        PublicKey::from(self.0.0)
    }
}

impl FromStr for NodePublicKey {
    type Err = EncryptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| EncryptionError::InvalidPublicKey(format!("{s}: {e}")))
    }
}

impl fmt::Display for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-call client secret. Never leaves the process.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Public half sent in front of every sealed request.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        PublicKey::from(&self.secret()).to_bytes()
    }

    fn secret(&self) -> StaticSecret {
        StaticSecret::from(self.0)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Sealed payload plus the key needed to open the matching response.
#[derive(Debug, Clone)]
pub struct EncryptionEnvelope {
    pub ciphertext: Bytes,
    pub encryption_key: EncryptionKey,
}

/// Seals `plaintext` to `node_key` under a fresh [`EncryptionKey`].
pub fn seal(node_key: &NodePublicKey, plaintext: &[u8]) -> Result<EncryptionEnvelope, EncryptionError> {
    let encryption_key = EncryptionKey::random();
    let ciphertext = seal_with_key(node_key, plaintext, &encryption_key)?;
    Ok(EncryptionEnvelope {
        ciphertext,
        encryption_key,
    })
}

pub fn seal_with_key(
    node_key: &NodePublicKey,
    plaintext: &[u8],
    encryption_key: &EncryptionKey,
) -> Result<Bytes, EncryptionError> {
    let secret = encryption_key.secret();
    let client_pk = PublicKey::from(&secret).to_bytes();
    let cipher = io_cipher(&secret, node_key.to_x25519(), &client_pk, node_key.as_bytes());

    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| EncryptionError::Seal)?;

    let mut out = Vec::with_capacity(REQUEST_OVERHEAD + plaintext.len());
    out.extend_from_slice(&client_pk);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out.into())
}

/// Opens a node response sealed for `encryption_key`.
pub fn unseal(
    node_key: &NodePublicKey,
    ciphertext: &[u8],
    encryption_key: &EncryptionKey,
) -> Result<Bytes, EncryptionError> {
    let min = NONCE_LEN + TAG_LEN;
    if ciphertext.len() < min {
        return Err(EncryptionError::Truncated {
            len: ciphertext.len(),
            min,
        });
    }

    let secret = encryption_key.secret();
    let client_pk = PublicKey::from(&secret).to_bytes();
    let cipher = io_cipher(&secret, node_key.to_x25519(), &client_pk, node_key.as_bytes());

    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map(Bytes::from)
        .map_err(|_| EncryptionError::Unseal)
}

fn io_cipher(
    secret: &StaticSecret,
    peer: PublicKey,
    client_pk: &[u8; PUBLIC_KEY_LEN],
    node_pk: &[u8; PUBLIC_KEY_LEN],
) -> ChaCha20Poly1305 {
    let shared = secret.diffie_hellman(&peer);

    let mut material = [0u8; PUBLIC_KEY_LEN * 3];
    material[..32].copy_from_slice(shared.as_bytes());
    material[32..64].copy_from_slice(client_pk);
    material[64..].copy_from_slice(node_pk);

    let key = blake3::derive_key(KEY_CONTEXT, &material);
    ChaCha20Poly1305::new(Key::from_slice(&key))
}

/// Node side of the envelope. Used by mock nodes and tests.
#[derive(Clone)]
pub struct NodeKeypair {
    secret: StaticSecret,
    public: NodePublicKey,
}

impl NodeKeypair {
    pub fn random() -> Self {
        Self::from_secret_bytes(rand::random())
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = NodePublicKey::new(PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    pub fn public_key(&self) -> NodePublicKey {
        self.public
    }

    /// Opens a sealed request. Returns the plaintext and the client public
    /// key to seal the response to.
    pub fn open_request(
        &self,
        ciphertext: &[u8],
    ) -> Result<(Bytes, [u8; PUBLIC_KEY_LEN]), EncryptionError> {
        if ciphertext.len() < REQUEST_OVERHEAD {
            return Err(EncryptionError::Truncated {
                len: ciphertext.len(),
                min: REQUEST_OVERHEAD,
            });
        }

        let (client_pk, rest) = ciphertext.split_at(PUBLIC_KEY_LEN);
        let mut client_pk_bytes = [0u8; PUBLIC_KEY_LEN];
        client_pk_bytes.copy_from_slice(client_pk);

        let cipher = io_cipher(
            &self.secret,
            PublicKey::from(client_pk_bytes),
            &client_pk_bytes,
            self.public.as_bytes(),
        );
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| EncryptionError::Unseal)?;

        Ok((plaintext.into(), client_pk_bytes))
    }

    pub fn seal_response(
        &self,
        client_pk: &[u8; PUBLIC_KEY_LEN],
        plaintext: &[u8],
    ) -> Result<Bytes, EncryptionError> {
        let cipher = io_cipher(
            &self.secret,
            PublicKey::from(*client_pk),
            client_pk,
            self.public.as_bytes(),
        );
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| EncryptionError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out.into())
    }
}

impl fmt::Debug for NodeKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKeypair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
