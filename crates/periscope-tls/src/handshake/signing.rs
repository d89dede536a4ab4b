//! CertificateVerify signing for client authentication.
//!
//! TLS 1.2 signs the selected hash of the full handshake transcript with
//! an explicit (hash, signature) pair; earlier versions sign the raw
//! MD5||SHA1 digest (RSA, no DigestInfo) or the SHA1 digest (ECDSA).
//! ECDSA signatures go on the wire as a DER SEQUENCE of r and s.

use hmac::digest::Digest;
use md5::Md5;
use periscope_types::{HashId, SignatureAndHash, SignatureId, TlsError};
use sha1::Sha1;
use sha2::Sha256;

use crate::config::ClientPrivateKey;
use crate::crypt::transcript::TranscriptHash;
use crate::ProtocolVersion;

fn signature_id_for_key(key: &ClientPrivateKey) -> SignatureId {
    match key {
        ClientPrivateKey::Rsa(_) => SignatureId::RSA,
        ClientPrivateKey::EcdsaP256(_) => SignatureId::ECDSA,
    }
}

/// Pick the (hash, signature) pair for CertificateVerify.
///
/// Pre-TLS 1.2 carries no pair on the wire. At TLS 1.2 the pair must match
/// the key type, appear in the server's CertificateRequest list (when one
/// was given), and use SHA-256, the one hash this client signs with.
pub fn select_signature_and_hash(
    version: ProtocolVersion,
    requested: &[SignatureAndHash],
    key: &ClientPrivateKey,
) -> Result<Option<SignatureAndHash>, TlsError> {
    if version < ProtocolVersion::Tls12 {
        return Ok(None);
    }
    let candidate = SignatureAndHash::new(HashId::SHA256, signature_id_for_key(key));
    if requested.is_empty() || requested.contains(&candidate) {
        Ok(Some(candidate))
    } else {
        Err(TlsError::SigningFailed(
            "no mutually supported signature algorithm for client certificate".into(),
        ))
    }
}

/// Sign the handshake transcript for CertificateVerify.
pub fn sign_certificate_verify(
    version: ProtocolVersion,
    key: &ClientPrivateKey,
    transcript: &TranscriptHash,
) -> Result<Vec<u8>, TlsError> {
    let messages = transcript.buffered();
    match key {
        ClientPrivateKey::Rsa(rsa_key) => {
            if version == ProtocolVersion::Tls12 {
                let digest = Sha256::digest(messages);
                rsa_key
                    .sign(rsa::Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|e| TlsError::SigningFailed(e.to_string()))
            } else {
                let mut digest = Vec::with_capacity(36);
                digest.extend_from_slice(&Md5::digest(messages));
                digest.extend_from_slice(&Sha1::digest(messages));
                rsa_key
                    .sign(rsa::Pkcs1v15Sign::new_unprefixed(), &digest)
                    .map_err(|e| TlsError::SigningFailed(e.to_string()))
            }
        }
        ClientPrivateKey::EcdsaP256(signing_key) => {
            use p256::ecdsa::signature::hazmat::PrehashSigner;
            use p256::ecdsa::Signature;

            let digest: Vec<u8> = if version == ProtocolVersion::Tls12 {
                Sha256::digest(messages).to_vec()
            } else {
                Sha1::digest(messages).to_vec()
            };
            let signature: Signature = signing_key
                .sign_prehash(&digest)
                .map_err(|e| TlsError::SigningFailed(e.to_string()))?;
            Ok(signature.to_der().as_bytes().to_vec())
        }
    }
}
