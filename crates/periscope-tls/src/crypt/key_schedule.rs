//! TLS 1.0–1.2 key derivation (RFC 2246/5246 §6.3, §8.1; RFC 7627).
//!
//! Derives the master secret from the pre-master secret, then expands the
//! master secret into a key block of per-direction MAC keys, cipher keys
//! and IVs. The extended variants take the transcript hash (RFC 7627) or
//! concatenated extended randoms as PRF inputs.

use periscope_types::TlsError;
use zeroize::Zeroize;

use super::prf::prf;
use super::{CipherSuiteParams, PrfHash};
use crate::ProtocolVersion;

pub const MASTER_SECRET_LENGTH: usize = 48;
pub const VERIFY_DATA_LENGTH: usize = 12;

/// Key block cut into its six segments (RFC 5246 §6.3 order: MAC keys,
/// cipher keys, IVs; client-write before server-write in each pair).
/// MAC segments are empty for AEAD suites.
pub struct KeyBlock {
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl Drop for KeyBlock {
    fn drop(&mut self) {
        self.client_write_mac_key.zeroize();
        self.server_write_mac_key.zeroize();
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

/// Derive the 48-byte master secret.
///
/// ```text
/// master_secret = PRF(pre_master_secret, "master secret",
///                     ClientHello.random + ServerHello.random)[0..47]
/// ```
///
/// The randoms are taken as slices: when the extended-random extension was
/// negotiated the caller passes `random || extended_random` on each side.
pub fn derive_master_secret(
    version: ProtocolVersion,
    hash: PrfHash,
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(
        version,
        hash,
        pre_master_secret,
        "master secret",
        &seed,
        MASTER_SECRET_LENGTH,
    )
}

/// Derive the master secret bound to the handshake transcript (RFC 7627).
///
/// ```text
/// master_secret = PRF(pre_master_secret, "extended master secret",
///                     session_hash)[0..47]
/// ```
///
/// `session_hash` is the transcript hash up to and including the
/// ClientKeyExchange message.
pub fn derive_extended_master_secret(
    version: ProtocolVersion,
    hash: PrfHash,
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    prf(
        version,
        hash,
        pre_master_secret,
        "extended master secret",
        session_hash,
        MASTER_SECRET_LENGTH,
    )
}

/// Expand the master secret into the key block.
///
/// ```text
/// key_block = PRF(master_secret, "key expansion",
///                 ServerHello.random + ClientHello.random)
/// ```
///
/// Note the seed order is reversed relative to master-secret derivation.
pub fn derive_key_block(
    version: ProtocolVersion,
    params: &CipherSuiteParams,
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<KeyBlock, TlsError> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let mut key_block = prf(
        version,
        params.prf_hash,
        master_secret,
        "key expansion",
        &seed,
        params.key_block_len(),
    )?;

    let mut offset = 0;
    let mut cut = |len: usize| {
        let piece = key_block[offset..offset + len].to_vec();
        offset += len;
        piece
    };

    let client_write_mac_key = cut(params.mac_len);
    let server_write_mac_key = cut(params.mac_len);
    let client_write_key = cut(params.key_len);
    let server_write_key = cut(params.key_len);
    let client_write_iv = cut(params.iv_len);
    let server_write_iv = cut(params.iv_len);
    key_block.zeroize();

    Ok(KeyBlock {
        client_write_mac_key,
        server_write_mac_key,
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    })
}

/// Compute Finished verify_data (12 bytes for every covered version).
///
/// ```text
/// verify_data = PRF(master_secret, finished_label,
///                   transcript_hash)[0..11]
/// ```
///
/// `label` is `"client finished"` or `"server finished"`; the transcript
/// hash is the snapshot taken before the Finished message itself.
pub fn compute_verify_data(
    version: ProtocolVersion,
    hash: PrfHash,
    master_secret: &[u8],
    label: &str,
    transcript_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    prf(
        version,
        hash,
        master_secret,
        label,
        transcript_hash,
        VERIFY_DATA_LENGTH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::suite_params;
    use crate::CipherSuite;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_master_secret_length_and_determinism() {
        let pms = hex("0303aabbccdd");
        let cr = [0x01u8; 32];
        let sr = [0x02u8; 32];

        let ms1 =
            derive_master_secret(ProtocolVersion::Tls12, PrfHash::Sha256, &pms, &cr, &sr).unwrap();
        let ms2 =
            derive_master_secret(ProtocolVersion::Tls12, PrfHash::Sha256, &pms, &cr, &sr).unwrap();
        assert_eq!(ms1, ms2);
        assert_eq!(ms1.len(), 48);
    }

    #[test]
    fn test_master_secret_seed_order_matters() {
        let pms = hex("0303aabbccdd");
        let cr = [0x01u8; 32];
        let sr = [0x02u8; 32];

        let forward =
            derive_master_secret(ProtocolVersion::Tls12, PrfHash::Sha256, &pms, &cr, &sr).unwrap();
        let reversed =
            derive_master_secret(ProtocolVersion::Tls12, PrfHash::Sha256, &pms, &sr, &cr).unwrap();
        assert_ne!(forward, reversed);
    }

    #[test]
    fn test_extended_master_secret_differs_from_standard() {
        let pms = hex("0303aabbccdd");
        let cr = [0x01u8; 32];
        let sr = [0x02u8; 32];
        let session_hash = [0xEE; 32];

        let standard =
            derive_master_secret(ProtocolVersion::Tls12, PrfHash::Sha256, &pms, &cr, &sr).unwrap();
        let extended = derive_extended_master_secret(
            ProtocolVersion::Tls12,
            PrfHash::Sha256,
            &pms,
            &session_hash,
        )
        .unwrap();
        assert_eq!(extended.len(), 48);
        assert_ne!(standard, extended);
    }

    #[test]
    fn test_extended_random_widens_the_seed() {
        let pms = hex("0303aabbccdd");
        let cr = [0x01u8; 32];
        let sr = [0x02u8; 32];

        let plain =
            derive_master_secret(ProtocolVersion::Tls12, PrfHash::Sha256, &pms, &cr, &sr).unwrap();

        let mut cr_ext = cr.to_vec();
        cr_ext.extend_from_slice(&[0x03; 32]);
        let widened =
            derive_master_secret(ProtocolVersion::Tls12, PrfHash::Sha256, &pms, &cr_ext, &sr)
                .unwrap();
        assert_ne!(plain, widened);
    }

    #[test]
    fn test_key_block_aead_geometry() {
        let params = suite_params(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256).unwrap();
        let kb = derive_key_block(
            ProtocolVersion::Tls12,
            params,
            &[0xAB; 48],
            &[0x01; 32],
            &[0x02; 32],
        )
        .unwrap();

        assert!(kb.client_write_mac_key.is_empty());
        assert!(kb.server_write_mac_key.is_empty());
        assert_eq!(kb.client_write_key.len(), 16);
        assert_eq!(kb.server_write_key.len(), 16);
        assert_eq!(kb.client_write_iv.len(), 4);
        assert_eq!(kb.server_write_iv.len(), 4);
        assert_ne!(kb.client_write_key, kb.server_write_key);
    }

    #[test]
    fn test_key_block_cbc_geometry() {
        let params = suite_params(CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA).unwrap();
        let kb = derive_key_block(
            ProtocolVersion::Tls10,
            params,
            &[0xCD; 48],
            &[0x01; 32],
            &[0x02; 32],
        )
        .unwrap();

        assert_eq!(kb.client_write_mac_key.len(), 20);
        assert_eq!(kb.server_write_mac_key.len(), 20);
        assert_eq!(kb.client_write_key.len(), 32);
        assert_eq!(kb.server_write_key.len(), 32);
        assert_eq!(kb.client_write_iv.len(), 16);
        assert_eq!(kb.server_write_iv.len(), 16);
        assert_ne!(kb.client_write_mac_key, kb.server_write_mac_key);
    }

    #[test]
    fn test_verify_data_is_twelve_bytes_and_label_bound() {
        let master = [0xAB; 48];
        let hash = [0xCD; 32];

        let client = compute_verify_data(
            ProtocolVersion::Tls12,
            PrfHash::Sha256,
            &master,
            "client finished",
            &hash,
        )
        .unwrap();
        let server = compute_verify_data(
            ProtocolVersion::Tls12,
            PrfHash::Sha256,
            &master,
            "server finished",
            &hash,
        )
        .unwrap();
        assert_eq!(client.len(), 12);
        assert_eq!(server.len(), 12);
        assert_ne!(client, server);
    }

    #[test]
    fn test_verify_data_tls10_uses_split_prf() {
        let master = [0xAB; 48];
        let hash = [0xCD; 36];

        let legacy = compute_verify_data(
            ProtocolVersion::Tls10,
            PrfHash::Sha256,
            &master,
            "client finished",
            &hash,
        )
        .unwrap();
        let modern = compute_verify_data(
            ProtocolVersion::Tls12,
            PrfHash::Sha256,
            &master,
            "client finished",
            &hash,
        )
        .unwrap();
        assert_eq!(legacy.len(), 12);
        assert_ne!(legacy, modern);
    }
}
