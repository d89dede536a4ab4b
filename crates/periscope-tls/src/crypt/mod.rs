//! Cipher suite parameters and key-schedule primitives.

pub mod key_schedule;
pub mod prf;
pub mod transcript;

use serde::Serialize;

use crate::CipherSuite;

/// Key exchange performed by a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyExchangeKind {
    /// Static RSA: pre-master secret encrypted to the certificate key.
    Rsa,
    /// Ephemeral finite-field Diffie-Hellman, RSA-signed parameters.
    DheRsa,
    /// Ephemeral elliptic-curve Diffie-Hellman, RSA-signed parameters.
    EcdheRsa,
    /// Ephemeral elliptic-curve Diffie-Hellman, ECDSA-signed parameters.
    EcdheEcdsa,
    /// Unauthenticated ephemeral finite-field Diffie-Hellman.
    DheAnon,
    /// Unauthenticated ephemeral elliptic-curve Diffie-Hellman.
    EcdheAnon,
}

impl KeyExchangeKind {
    /// Whether the server must send a ServerKeyExchange message.
    /// Only static RSA carries its key material in the certificate.
    pub fn requires_server_key_exchange(self) -> bool {
        !matches!(self, KeyExchangeKind::Rsa)
    }

    /// Whether the server presents a Certificate message at all.
    pub fn requires_certificate(self) -> bool {
        !self.is_anonymous()
    }

    pub fn is_anonymous(self) -> bool {
        matches!(self, KeyExchangeKind::DheAnon | KeyExchangeKind::EcdheAnon)
    }

    /// Whether the ServerKeyExchange parameters are signed.
    pub fn signed_params(self) -> bool {
        matches!(
            self,
            KeyExchangeKind::DheRsa | KeyExchangeKind::EcdheRsa | KeyExchangeKind::EcdheEcdsa
        )
    }

    /// Whether the ephemeral parameters live on an elliptic curve.
    pub fn is_ecdhe(self) -> bool {
        matches!(
            self,
            KeyExchangeKind::EcdheRsa | KeyExchangeKind::EcdheEcdsa | KeyExchangeKind::EcdheAnon
        )
    }

    /// Whether the ephemeral parameters are finite-field DH.
    pub fn is_dhe(self) -> bool {
        matches!(self, KeyExchangeKind::DheRsa | KeyExchangeKind::DheAnon)
    }
}

/// Bulk cipher used by a suite. The record layer owns the actual cipher
/// implementation; the handshake engine only needs key geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BulkCipherKind {
    Rc4,
    TripleDesCbc,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
}

/// Record MAC used by a suite. `Aead` means the bulk cipher authenticates
/// and the key block carries no MAC keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MacKind {
    Aead,
    HmacMd5,
    HmacSha1,
}

/// Hash backing the TLS 1.2 PRF for a suite. TLS 1.0/1.1 always use the
/// split MD5/SHA1 PRF regardless of this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrfHash {
    Sha256,
    Sha384,
}

/// Parameters of an *implemented* cipher suite.
///
/// Suites outside this table may still be advertised under `force_suites`,
/// but a handshake can never be completed with one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    pub kx: KeyExchangeKind,
    pub bulk: BulkCipherKind,
    pub mac: MacKind,
    /// Encryption key length in bytes.
    pub key_len: usize,
    /// MAC key length in bytes (0 for AEAD suites).
    pub mac_len: usize,
    /// IV length cut from the key block (fixed IV for AEAD suites).
    pub iv_len: usize,
    /// Suite may only be negotiated at TLS 1.2.
    pub tls12_only: bool,
    /// Suite authenticates neither peer.
    pub anonymous: bool,
    pub prf_hash: PrfHash,
}

impl CipherSuiteParams {
    /// Total key block length for this suite (RFC 5246 §6.3 cut order).
    pub fn key_block_len(&self) -> usize {
        2 * self.mac_len + 2 * self.key_len + 2 * self.iv_len
    }
}

macro_rules! suite {
    ($id:expr, $kx:ident, $bulk:ident, $mac:ident, $key:expr, $maclen:expr, $iv:expr, $tls12:expr, $anon:expr, $prf:ident) => {
        CipherSuiteParams {
            suite: $id,
            kx: KeyExchangeKind::$kx,
            bulk: BulkCipherKind::$bulk,
            mac: MacKind::$mac,
            key_len: $key,
            mac_len: $maclen,
            iv_len: $iv,
            tls12_only: $tls12,
            anonymous: $anon,
            prf_hash: PrfHash::$prf,
        }
    };
}

/// The static table of implemented cipher suites, in preference order.
#[rustfmt::skip]
pub const IMPLEMENTED_SUITES: &[CipherSuiteParams] = &[
    suite!(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,   EcdheRsa,   Aes128Gcm,    Aead,     16,  0,  4, true,  false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,   EcdheRsa,   Aes256Gcm,    Aead,     32,  0,  4, true,  false, Sha384),
    suite!(CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, EcdheEcdsa, Aes128Gcm,    Aead,     16,  0,  4, true,  false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384, EcdheEcdsa, Aes256Gcm,    Aead,     32,  0,  4, true,  false, Sha384),
    suite!(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,      EcdheRsa,   Aes128Cbc,    HmacSha1, 16, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,      EcdheRsa,   Aes256Cbc,    HmacSha1, 32, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,    EcdheEcdsa, Aes128Cbc,    HmacSha1, 16, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,    EcdheEcdsa, Aes256Cbc,    HmacSha1, 32, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,     EcdheRsa,   TripleDesCbc, HmacSha1, 24, 20,  8, false, false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_RSA_WITH_RC4_128_SHA,          EcdheRsa,   Rc4,          HmacSha1, 16, 20,  0, false, false, Sha256),
    suite!(CipherSuite::TLS_ECDHE_ECDSA_WITH_RC4_128_SHA,        EcdheEcdsa, Rc4,          HmacSha1, 16, 20,  0, false, false, Sha256),
    suite!(CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,     DheRsa,     Aes128Gcm,    Aead,     16,  0,  4, true,  false, Sha256),
    suite!(CipherSuite::TLS_DHE_RSA_WITH_AES_256_GCM_SHA384,     DheRsa,     Aes256Gcm,    Aead,     32,  0,  4, true,  false, Sha384),
    suite!(CipherSuite::TLS_DHE_RSA_WITH_AES_128_CBC_SHA,        DheRsa,     Aes128Cbc,    HmacSha1, 16, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA,        DheRsa,     Aes256Cbc,    HmacSha1, 32, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256,         Rsa,        Aes128Gcm,    Aead,     16,  0,  4, true,  false, Sha256),
    suite!(CipherSuite::TLS_RSA_WITH_AES_256_GCM_SHA384,         Rsa,        Aes256Gcm,    Aead,     32,  0,  4, true,  false, Sha384),
    suite!(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,            Rsa,        Aes128Cbc,    HmacSha1, 16, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,            Rsa,        Aes256Cbc,    HmacSha1, 32, 20, 16, false, false, Sha256),
    suite!(CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA,           Rsa,        TripleDesCbc, HmacSha1, 24, 20,  8, false, false, Sha256),
    suite!(CipherSuite::TLS_RSA_WITH_RC4_128_SHA,                Rsa,        Rc4,          HmacSha1, 16, 20,  0, false, false, Sha256),
    suite!(CipherSuite::TLS_DH_ANON_WITH_AES_128_CBC_SHA,        DheAnon,    Aes128Cbc,    HmacSha1, 16, 20, 16, false, true,  Sha256),
    suite!(CipherSuite::TLS_DH_ANON_WITH_AES_256_CBC_SHA,        DheAnon,    Aes256Cbc,    HmacSha1, 32, 20, 16, false, true,  Sha256),
    suite!(CipherSuite::TLS_DH_ANON_WITH_RC4_128_MD5,            DheAnon,    Rc4,          HmacMd5,  16, 16,  0, false, true,  Sha256),
    suite!(CipherSuite::TLS_ECDH_ANON_WITH_AES_128_CBC_SHA,      EcdheAnon,  Aes128Cbc,    HmacSha1, 16, 20, 16, false, true,  Sha256),
];

/// Look up an implemented suite by id.
pub fn suite_params(suite: CipherSuite) -> Option<&'static CipherSuiteParams> {
    IMPLEMENTED_SUITES.iter().find(|p| p.suite == suite)
}

/// Whether a suite id is in the implemented table.
pub fn is_implemented(suite: CipherSuite) -> bool {
    suite_params(suite).is_some()
}

/// Find the suite the server chose, provided the client actually offered it
/// and this implementation can complete a handshake with it.
pub fn mutual_cipher_suite(
    offered: &[CipherSuite],
    chosen: CipherSuite,
) -> Option<&'static CipherSuiteParams> {
    if offered.contains(&chosen) {
        suite_params(chosen)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ids_are_unique() {
        for (i, a) in IMPLEMENTED_SUITES.iter().enumerate() {
            for b in &IMPLEMENTED_SUITES[i + 1..] {
                assert_ne!(a.suite, b.suite);
            }
        }
    }

    #[test]
    fn test_gcm_suites_are_tls12_only_aead() {
        for p in IMPLEMENTED_SUITES {
            let is_gcm = matches!(
                p.bulk,
                BulkCipherKind::Aes128Gcm | BulkCipherKind::Aes256Gcm
            );
            if is_gcm {
                assert!(p.tls12_only, "{:?} must be TLS 1.2-only", p.suite);
                assert_eq!(p.mac, MacKind::Aead);
                assert_eq!(p.mac_len, 0);
                assert_eq!(p.iv_len, 4);
            }
        }
    }

    #[test]
    fn test_sha384_prf_only_on_256_bit_gcm() {
        for p in IMPLEMENTED_SUITES {
            if p.prf_hash == PrfHash::Sha384 {
                assert_eq!(p.bulk, BulkCipherKind::Aes256Gcm);
            }
        }
    }

    #[test]
    fn test_anonymous_flag_matches_kx() {
        for p in IMPLEMENTED_SUITES {
            assert_eq!(p.anonymous, p.kx.is_anonymous(), "{:?}", p.suite);
        }
    }

    #[test]
    fn test_key_block_len() {
        let gcm = suite_params(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256).unwrap();
        assert_eq!(gcm.key_block_len(), 2 * 16 + 2 * 4);

        let cbc = suite_params(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA).unwrap();
        assert_eq!(cbc.key_block_len(), 2 * 20 + 2 * 16 + 2 * 16);
    }

    #[test]
    fn test_mutual_cipher_suite() {
        let offered = [
            CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256,
            CipherSuite(0x00FF),
        ];
        // Offered and implemented
        assert!(
            mutual_cipher_suite(&offered, CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256).is_some()
        );
        // Offered but not implemented
        assert!(mutual_cipher_suite(&offered, CipherSuite(0x00FF)).is_none());
        // Implemented but not offered
        assert!(
            mutual_cipher_suite(&offered, CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA).is_none()
        );
    }

    #[test]
    fn test_rsa_needs_no_server_key_exchange() {
        assert!(!KeyExchangeKind::Rsa.requires_server_key_exchange());
        assert!(KeyExchangeKind::DheRsa.requires_server_key_exchange());
        assert!(KeyExchangeKind::EcdheRsa.requires_server_key_exchange());
        assert!(KeyExchangeKind::EcdheAnon.requires_server_key_exchange());
    }

    #[test]
    fn test_anonymous_kx_needs_no_certificate() {
        assert!(!KeyExchangeKind::DheAnon.requires_certificate());
        assert!(!KeyExchangeKind::EcdheAnon.requires_certificate());
        assert!(KeyExchangeKind::Rsa.requires_certificate());
        assert!(KeyExchangeKind::EcdheEcdsa.requires_certificate());
    }
}
