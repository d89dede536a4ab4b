//! TLS pseudo-random function (RFC 2246 §5, RFC 5246 §5).
//!
//! ```text
//! PRF(secret, label, seed) = P_<hash>(secret, label + seed)
//!
//! P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) ||
//!                        HMAC_hash(secret, A(2) + seed) || ...
//! A(0) = seed
//! A(i) = HMAC_hash(secret, A(i-1))
//! ```
//!
//! TLS 1.2 uses a single P_hash with the suite hash (SHA-256 or SHA-384).
//! TLS 1.0/1.1 split the secret in two overlapping halves and XOR
//! P_MD5(S1) with P_SHA1(S2).

use hmac::digest::core_api::BlockSizeUser;
use hmac::digest::Digest;
use hmac::{Mac, SimpleHmac};
use md5::Md5;
use periscope_types::TlsError;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

use super::PrfHash;
use crate::ProtocolVersion;

fn hmac_hash<D: Digest + BlockSizeUser>(secret: &[u8], data: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut mac = <SimpleHmac<D> as Mac>::new_from_slice(secret)
        .map_err(|e| TlsError::HandshakeFailed(format!("hmac key setup: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// P_hash expansion function.
fn p_hash<D: Digest + BlockSizeUser>(
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut result = Vec::with_capacity(output_len);

    // A(0) = seed
    let mut a = seed.to_vec();

    while result.len() < output_len {
        // A(i) = HMAC_hash(secret, A(i-1))
        a = hmac_hash::<D>(secret, &a)?;

        // HMAC_hash(secret, A(i) + seed)
        let mut ai_seed = Vec::with_capacity(a.len() + seed.len());
        ai_seed.extend_from_slice(&a);
        ai_seed.extend_from_slice(seed);
        let block = hmac_hash::<D>(secret, &ai_seed)?;

        result.extend_from_slice(&block);
    }

    result.truncate(output_len);
    Ok(result)
}

/// TLS 1.0/1.1 PRF: P_MD5 over the first half of the secret XORed with
/// P_SHA1 over the second half. Odd-length secrets share the middle byte.
fn prf_md5_sha1(
    secret: &[u8],
    label_seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let md5_out = p_hash::<Md5>(s1, label_seed, output_len)?;
    let sha1_out = p_hash::<Sha1>(s2, label_seed, output_len)?;

    Ok(md5_out
        .iter()
        .zip(sha1_out.iter())
        .map(|(a, b)| a ^ b)
        .collect())
}

/// Derive `output_len` bytes from `secret`, `label`, and `seed` with the
/// PRF appropriate for the negotiated version and suite.
pub fn prf(
    version: ProtocolVersion,
    hash: PrfHash,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);

    match version {
        ProtocolVersion::Tls10 | ProtocolVersion::Tls11 => {
            prf_md5_sha1(secret, &label_seed, output_len)
        }
        ProtocolVersion::Tls12 => match hash {
            PrfHash::Sha256 => p_hash::<Sha256>(secret, &label_seed, output_len),
            PrfHash::Sha384 => p_hash::<Sha384>(secret, &label_seed, output_len),
        },
    }
}
