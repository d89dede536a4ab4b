//! Wire-level algorithm identifiers shared across the handshake engine.

use serde::Serialize;

/// TLS hash algorithm identifier (RFC 5246 §7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HashId(pub u8);

impl HashId {
    pub const NONE: Self = Self(0);
    pub const MD5: Self = Self(1);
    pub const SHA1: Self = Self(2);
    pub const SHA224: Self = Self(3);
    pub const SHA256: Self = Self(4);
    pub const SHA384: Self = Self(5);
    pub const SHA512: Self = Self(6);
}

/// TLS signature algorithm identifier (RFC 5246 §7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SignatureId(pub u8);

impl SignatureId {
    pub const ANONYMOUS: Self = Self(0);
    pub const RSA: Self = Self(1);
    pub const DSA: Self = Self(2);
    pub const ECDSA: Self = Self(3);
}

/// A (hash, signature) algorithm pair as advertised in the
/// signature_algorithms extension and in ServerKeyExchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SignatureAndHash {
    pub hash: HashId,
    pub signature: SignatureId,
}

impl SignatureAndHash {
    pub const fn new(hash: HashId, signature: SignatureId) -> Self {
        Self { hash, signature }
    }
}

/// The (hash, signature) pairs this implementation can consume in a signed
/// ServerKeyExchange. Pairs outside this set are rejected by extension
/// validation.
pub const SUPPORTED_SKX_SIGNATURE_ALGORITHMS: &[SignatureAndHash] = &[
    SignatureAndHash::new(HashId::SHA256, SignatureId::RSA),
    SignatureAndHash::new(HashId::SHA256, SignatureId::ECDSA),
    SignatureAndHash::new(HashId::SHA384, SignatureId::RSA),
    SignatureAndHash::new(HashId::SHA384, SignatureId::ECDSA),
    SignatureAndHash::new(HashId::SHA1, SignatureId::RSA),
    SignatureAndHash::new(HashId::SHA1, SignatureId::ECDSA),
];

/// Named elliptic curve identifier (RFC 4492 §5.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CurveId(pub u16);

impl CurveId {
    pub const SECP256R1: Self = Self(23);
    pub const SECP384R1: Self = Self(24);
    pub const SECP521R1: Self = Self(25);
    pub const X25519: Self = Self(29);
}

/// The only EC point format this implementation emits or accepts.
pub const POINT_FORMAT_UNCOMPRESSED: u8 = 0;

/// Heartbeat mode advertised in the heartbeat extension (RFC 6520 §2).
pub const HEARTBEAT_MODE_PEER_ALLOWED: u8 = 1;
