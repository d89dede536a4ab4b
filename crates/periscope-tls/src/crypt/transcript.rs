//! Running transcript hash over handshake messages.
//!
//! The hash function depends on the negotiated version and suite, but the
//! first two messages (ClientHello, ServerHello) are absorbed before those
//! are known. The recorder therefore buffers raw message bytes and replays
//! them on demand: `update()` appends, `current_hash()` hashes the whole
//! buffer with the selected algorithm. ChangeCipherSpec is not a handshake
//! message and never enters the transcript.

use hmac::digest::Digest;
use md5::Md5;
use periscope_types::TlsError;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

use super::PrfHash;
use crate::ProtocolVersion;

/// Hash variant backing the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptAlg {
    /// MD5(messages) || SHA1(messages), 36 bytes (TLS 1.0/1.1).
    Md5Sha1,
    Sha256,
    Sha384,
}

impl TranscriptAlg {
    /// Pick the transcript hash for a negotiated version and PRF hash.
    /// `prf_hash` is `None` while no implemented suite has been selected;
    /// TLS 1.2 then defaults to SHA-256.
    pub fn for_connection(version: ProtocolVersion, prf_hash: Option<PrfHash>) -> Self {
        match version {
            ProtocolVersion::Tls10 | ProtocolVersion::Tls11 => TranscriptAlg::Md5Sha1,
            ProtocolVersion::Tls12 => match prf_hash {
                Some(PrfHash::Sha384) => TranscriptAlg::Sha384,
                _ => TranscriptAlg::Sha256,
            },
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            TranscriptAlg::Md5Sha1 => 36,
            TranscriptAlg::Sha256 => 32,
            TranscriptAlg::Sha384 => 48,
        }
    }
}

/// Buffer-and-replay transcript recorder.
#[derive(Debug, Clone)]
pub struct TranscriptHash {
    buffer: Vec<u8>,
    alg: Option<TranscriptAlg>,
}

impl TranscriptHash {
    /// Create a recorder that buffers until an algorithm is selected.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            alg: None,
        }
    }

    /// Select the hash algorithm. Everything buffered so far is replayed
    /// under the new algorithm, so selecting after ClientHello/ServerHello
    /// have been absorbed is safe.
    pub fn select(&mut self, alg: TranscriptAlg) {
        self.alg = Some(alg);
    }

    pub fn algorithm(&self) -> Option<TranscriptAlg> {
        self.alg
    }

    /// Absorb a raw handshake message (including its 4-byte header).
    pub fn update(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// The raw absorbed bytes. CertificateVerify signs exactly this.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Hash of everything absorbed so far, non-destructive.
    pub fn current_hash(&self) -> Result<Vec<u8>, TlsError> {
        let alg = self.alg.ok_or_else(|| {
            TlsError::HandshakeFailed("transcript hash used before suite selection".into())
        })?;
        Ok(match alg {
            TranscriptAlg::Md5Sha1 => {
                let mut out = Vec::with_capacity(36);
                out.extend_from_slice(&Md5::digest(&self.buffer));
                out.extend_from_slice(&Sha1::digest(&self.buffer));
                out
            }
            TranscriptAlg::Sha256 => Sha256::digest(&self.buffer).to_vec(),
            TranscriptAlg::Sha384 => Sha384::digest(&self.buffer).to_vec(),
        })
    }
}

impl Default for TranscriptHash {
    fn default() -> Self {
        Self::new()
    }
}
