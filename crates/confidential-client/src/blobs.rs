//! EIP-4844 blob commitments, versioned hashes and sidecars.
//!
//! KZG itself is injected through [`Kzg`]; this module only orders the work
//! and keeps the outputs index-aligned with the input blobs.

use std::sync::Arc;

use alloy::primitives::{
    B256,
    Bytes,
};
pub use alloy_eips::eip4844::{
    BYTES_PER_BLOB,
    VERSIONED_HASH_VERSION_KZG,
};

use crate::{
    error::{
        Error,
        Result,
    },
    types::{
        BlobSidecar,
        KzgBytes,
    },
};

/// Trusted-setup handle.
pub trait Kzg: Send + Sync {
    fn blob_to_commitment(&self, blob: &[u8]) -> Result<KzgBytes>;
    fn compute_blob_proof(&self, blob: &[u8], commitment: &KzgBytes) -> Result<KzgBytes>;
}

pub type SharedKzg = Arc<dyn Kzg>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobCommitmentSet {
    pub commitments: Vec<KzgBytes>,
    pub versioned_hashes: Option<Vec<B256>>,
    pub proofs: Option<Vec<KzgBytes>>,
    pub sidecars: Option<Vec<BlobSidecar>>,
}

fn check_blob(index: usize, blob: &[u8]) -> Result<()> {
    if blob.len() != BYTES_PER_BLOB {
        return Err(Error::Blob(format!(
            "blob {index} is {} bytes, expected {BYTES_PER_BLOB}",
            blob.len()
        )));
    }
    Ok(())
}

pub fn blobs_to_commitments(blobs: &[Bytes], kzg: &dyn Kzg) -> Result<Vec<KzgBytes>> {
    blobs
        .iter()
        .enumerate()
        .map(|(index, blob)| {
            check_blob(index, blob)?;
            kzg.blob_to_commitment(blob)
        })
        .collect()
}

/// `sha256(commitment)` with the first byte replaced by the KZG version.
pub fn commitment_to_versioned_hash(commitment: &KzgBytes) -> B256 {
    alloy_eips::eip4844::kzg_to_versioned_hash(commitment.as_slice())
}

pub fn commitments_to_versioned_hashes(commitments: &[KzgBytes]) -> Vec<B256> {
    commitments
        .iter()
        .map(commitment_to_versioned_hash)
        .collect()
}

pub fn blobs_to_proofs(
    blobs: &[Bytes],
    commitments: &[KzgBytes],
    kzg: &dyn Kzg,
) -> Result<Vec<KzgBytes>> {
    if blobs.len() != commitments.len() {
        return Err(Error::Blob(format!(
            "{} blobs but {} commitments",
            blobs.len(),
            commitments.len()
        )));
    }
    blobs
        .iter()
        .zip(commitments)
        .map(|(blob, commitment)| kzg.compute_blob_proof(blob, commitment))
        .collect()
}

pub fn to_blob_sidecars(
    blobs: &[Bytes],
    commitments: &[KzgBytes],
    proofs: &[KzgBytes],
) -> Result<Vec<BlobSidecar>> {
    if blobs.len() != commitments.len() || blobs.len() != proofs.len() {
        return Err(Error::Blob(format!(
            "misaligned sidecar inputs: {} blobs, {} commitments, {} proofs",
            blobs.len(),
            commitments.len(),
            proofs.len()
        )));
    }
    Ok(blobs
        .iter()
        .zip(commitments)
        .zip(proofs)
        .map(|((blob, commitment), proof)| {
            BlobSidecar {
                blob: blob.clone(),
                commitment: *commitment,
                proof: *proof,
            }
        })
        .collect())
}

/// Commitments first, then hashes and/or proofs and sidecars as requested.
pub fn build_commitment_set(
    blobs: &[Bytes],
    kzg: &dyn Kzg,
    versioned_hashes: bool,
    sidecars: bool,
) -> Result<BlobCommitmentSet> {
    let commitments = blobs_to_commitments(blobs, kzg)?;
    let mut set = BlobCommitmentSet {
        versioned_hashes: versioned_hashes.then(|| commitments_to_versioned_hashes(&commitments)),
        ..Default::default()
    };

    if sidecars {
        let proofs = blobs_to_proofs(blobs, &commitments, kzg)?;
        set.sidecars = Some(to_blob_sidecars(blobs, &commitments, &proofs)?);
        set.proofs = Some(proofs);
    }

    set.commitments = commitments;
    Ok(set)
}
