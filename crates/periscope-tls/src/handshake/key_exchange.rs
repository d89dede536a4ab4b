//! Per-suite key agreement: ServerKeyExchange decoding and
//! ClientKeyExchange generation.
//!
//! ServerKeyExchange signatures are decoded and recorded for the scan
//! log but not cryptographically verified; chain trust is the external
//! validator's concern and signature checking is an offline job for the
//! consumer of the log.

use num_bigint::BigUint;
use periscope_types::{CurveId, HashId, SignatureAndHash, SignatureId, TlsError};
use rand_core::{CryptoRng, RngCore};
use serde::Serialize;

use super::codec::wrap_handshake;
use super::HandshakeType;
use crate::config::{SecureRandom, TlsConfig};
use crate::crypt::KeyExchangeKind;
use crate::ProtocolVersion;

/// Decoded ServerKeyExchange parameters, kept verbatim for the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ServerKeyExchangeParams {
    Ecdhe {
        curve_type: u8,
        curve: CurveId,
        public_key: Vec<u8>,
        signature_and_hash: Option<SignatureAndHash>,
        signature: Vec<u8>,
    },
    Dhe {
        prime: Vec<u8>,
        generator: Vec<u8>,
        public_key: Vec<u8>,
        signature_and_hash: Option<SignatureAndHash>,
        signature: Vec<u8>,
    },
}

/// Decoded parameters of the ClientKeyExchange this client sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClientKeyExchangeParams {
    Ecdhe { public_key: Vec<u8> },
    Dhe { public_key: Vec<u8> },
    Rsa { encrypted_pre_master_secret: Vec<u8> },
}

/// Decode a ServerKeyExchange body for the given key-exchange kind.
///
/// Signed variants carry `signature_algorithm(2)` only at TLS 1.2;
/// anonymous variants carry no signature section at all.
pub fn parse_server_key_exchange(
    kx: KeyExchangeKind,
    version: ProtocolVersion,
    body: &[u8],
) -> Result<ServerKeyExchangeParams, TlsError> {
    let err = |msg: &str| TlsError::UnexpectedMessage(format!("ServerKeyExchange: {msg}"));

    if kx.is_ecdhe() {
        if body.len() < 4 {
            return Err(err("too short"));
        }
        let curve_type = body[0];
        if curve_type != 3 {
            return Err(err("unsupported curve type (expected named_curve)"));
        }
        let curve = CurveId(u16::from_be_bytes([body[1], body[2]]));
        let point_len = body[3] as usize;
        if body.len() < 4 + point_len {
            return Err(err("truncated public key"));
        }
        let public_key = body[4..4 + point_len].to_vec();
        let rest = &body[4 + point_len..];

        let (signature_and_hash, signature) = if kx.signed_params() {
            parse_signature(rest, version)?
        } else {
            (None, Vec::new())
        };
        Ok(ServerKeyExchangeParams::Ecdhe {
            curve_type,
            curve,
            public_key,
            signature_and_hash,
            signature,
        })
    } else if kx.is_dhe() {
        let mut pos = 0;
        let mut read_vector = |label: &str| -> Result<Vec<u8>, TlsError> {
            if body.len() < pos + 2 {
                return Err(err(&format!("truncated {label} length")));
            }
            let len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
            pos += 2;
            if body.len() < pos + len {
                return Err(err(&format!("truncated {label}")));
            }
            let v = body[pos..pos + len].to_vec();
            pos += len;
            Ok(v)
        };
        let prime = read_vector("prime")?;
        let generator = read_vector("generator")?;
        let public_key = read_vector("public value")?;
        let rest = &body[pos..];

        let (signature_and_hash, signature) = if kx.signed_params() {
            parse_signature(rest, version)?
        } else {
            (None, Vec::new())
        };
        Ok(ServerKeyExchangeParams::Dhe {
            prime,
            generator,
            public_key,
            signature_and_hash,
            signature,
        })
    } else {
        Err(err("not expected for this key exchange"))
    }
}

fn parse_signature(
    data: &[u8],
    version: ProtocolVersion,
) -> Result<(Option<SignatureAndHash>, Vec<u8>), TlsError> {
    let err = |msg: &str| TlsError::UnexpectedMessage(format!("ServerKeyExchange: {msg}"));
    let mut pos = 0;
    let pair = if version == ProtocolVersion::Tls12 {
        if data.len() < 2 {
            return Err(err("missing signature algorithm"));
        }
        pos += 2;
        Some(SignatureAndHash::new(
            HashId(data[0]),
            SignatureId(data[1]),
        ))
    } else {
        None
    };
    if data.len() < pos + 2 {
        return Err(err("missing signature length"));
    }
    let len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
    pos += 2;
    if data.len() < pos + len {
        return Err(err("truncated signature"));
    }
    Ok((pair, data[pos..pos + len].to_vec()))
}

/// Server-side key material the client key exchange consumes.
pub enum ServerKeyMaterial<'a> {
    /// Static RSA: the certificate's public key.
    Rsa { public_key: &'a rsa::RsaPublicKey },
    Ecdhe { curve: CurveId, public_key: &'a [u8] },
    Dhe {
        prime: &'a [u8],
        generator: &'a [u8],
        public_key: &'a [u8],
    },
}

/// Result of generating the ClientKeyExchange.
pub struct ClientKeyExchangeOutcome {
    pub pre_master_secret: Vec<u8>,
    /// Complete handshake message (header included).
    pub message: Vec<u8>,
    pub params: ClientKeyExchangeParams,
}

/// Generate the pre-master secret and the ClientKeyExchange message.
///
/// `client_hello_version` is the version offered in ClientHello; the
/// static-RSA pre-master secret embeds it (RFC 5246 §7.4.7.1).
pub fn generate_client_key_exchange(
    config: &TlsConfig,
    material: ServerKeyMaterial<'_>,
    client_hello_version: u16,
) -> Result<ClientKeyExchangeOutcome, TlsError> {
    match material {
        ServerKeyMaterial::Rsa { public_key } => {
            let mut pre_master = vec![0u8; 48];
            pre_master[0] = (client_hello_version >> 8) as u8;
            pre_master[1] = client_hello_version as u8;
            config.fill_random(&mut pre_master[2..])?;

            let mut rng = RngBridge::new(config.rand());
            let encrypted = public_key
                .encrypt(&mut rng, rsa::Pkcs1v15Encrypt, &pre_master)
                .map_err(|e| TlsError::HandshakeFailed(format!("rsa encrypt: {e}")))?;

            let mut body = Vec::with_capacity(2 + encrypted.len());
            body.extend_from_slice(&(encrypted.len() as u16).to_be_bytes());
            body.extend_from_slice(&encrypted);
            Ok(ClientKeyExchangeOutcome {
                pre_master_secret: pre_master,
                message: wrap_handshake(HandshakeType::ClientKeyExchange, &body),
                params: ClientKeyExchangeParams::Rsa {
                    encrypted_pre_master_secret: encrypted,
                },
            })
        }
        ServerKeyMaterial::Ecdhe { curve, public_key } => {
            let (client_public, shared) = ecdh_agree(config, curve, public_key)?;
            let mut body = Vec::with_capacity(1 + client_public.len());
            body.push(client_public.len() as u8);
            body.extend_from_slice(&client_public);
            Ok(ClientKeyExchangeOutcome {
                pre_master_secret: shared,
                message: wrap_handshake(HandshakeType::ClientKeyExchange, &body),
                params: ClientKeyExchangeParams::Ecdhe {
                    public_key: client_public,
                },
            })
        }
        ServerKeyMaterial::Dhe {
            prime,
            generator,
            public_key,
        } => {
            let p = BigUint::from_bytes_be(prime);
            let g = BigUint::from_bytes_be(generator);
            let ys = BigUint::from_bytes_be(public_key);
            if p < BigUint::from(5u8) {
                return Err(TlsError::HandshakeFailed(
                    "server sent degenerate DH prime".into(),
                ));
            }

            let mut exponent = vec![0u8; prime.len().max(32)];
            config.fill_random(&mut exponent)?;
            // Clamp into [2, p-2].
            let x = BigUint::from_bytes_be(&exponent) % (&p - BigUint::from(3u8))
                + BigUint::from(2u8);

            let yc = g.modpow(&x, &p).to_bytes_be();
            let pre_master = ys.modpow(&x, &p).to_bytes_be();

            let mut body = Vec::with_capacity(2 + yc.len());
            body.extend_from_slice(&(yc.len() as u16).to_be_bytes());
            body.extend_from_slice(&yc);
            Ok(ClientKeyExchangeOutcome {
                pre_master_secret: pre_master,
                message: wrap_handshake(HandshakeType::ClientKeyExchange, &body),
                params: ClientKeyExchangeParams::Dhe { public_key: yc },
            })
        }
    }
}

/// One ECDH agreement: returns (client public point, shared secret).
fn ecdh_agree(
    config: &TlsConfig,
    curve: CurveId,
    server_public: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
    let mut rng = RngBridge::new(config.rand());
    match curve {
        CurveId::X25519 => {
            let point: [u8; 32] = server_public.try_into().map_err(|_| {
                TlsError::HandshakeFailed("X25519 public value must be 32 bytes".into())
            })?;
            let secret = x25519_dalek::EphemeralSecret::random_from_rng(&mut rng);
            let public = x25519_dalek::PublicKey::from(&secret);
            let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(point));
            Ok((public.as_bytes().to_vec(), shared.as_bytes().to_vec()))
        }
        CurveId::SECP256R1 => {
            use p256::elliptic_curve::sec1::ToEncodedPoint;
            let peer = p256::PublicKey::from_sec1_bytes(server_public)
                .map_err(|_| TlsError::HandshakeFailed("bad P-256 point".into()))?;
            let secret = p256::ecdh::EphemeralSecret::random(&mut rng);
            let public = secret.public_key().to_encoded_point(false);
            let shared = secret.diffie_hellman(&peer);
            Ok((
                public.as_bytes().to_vec(),
                shared.raw_secret_bytes().to_vec(),
            ))
        }
        CurveId::SECP384R1 => {
            use p384::elliptic_curve::sec1::ToEncodedPoint;
            let peer = p384::PublicKey::from_sec1_bytes(server_public)
                .map_err(|_| TlsError::HandshakeFailed("bad P-384 point".into()))?;
            let secret = p384::ecdh::EphemeralSecret::random(&mut rng);
            let public = secret.public_key().to_encoded_point(false);
            let shared = secret.diffie_hellman(&peer);
            Ok((
                public.as_bytes().to_vec(),
                shared.raw_secret_bytes().to_vec(),
            ))
        }
        other => Err(TlsError::HandshakeFailed(format!(
            "unsupported named curve {:#06x}",
            other.0
        ))),
    }
}

/// Adapter exposing the configured [`SecureRandom`] to RustCrypto key
/// generation. `fill_bytes` must not return partial randomness, so a
/// failing source aborts the process rather than weaken a key.
pub(crate) struct RngBridge<'a> {
    random: &'a dyn SecureRandom,
}

impl<'a> RngBridge<'a> {
    pub(crate) fn new(random: &'a dyn SecureRandom) -> Self {
        Self { random }
    }
}

impl RngCore for RngBridge<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_be_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_be_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.try_fill_bytes(dest)
            .expect("random source failed during key generation")
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.random
            .fill(dest)
            .map_err(|e| rand_core::Error::new(Box::new(e)))
    }
}

impl CryptoRng for RngBridge<'_> {}
