//! The record-layer seam.
//!
//! Record framing, encryption and the TCP stream are external
//! collaborators; the handshake driver talks to them exclusively through
//! [`RecordTransport`]. A production implementation wraps a socket plus the
//! record codec; tests script one in memory.

use zeroize::Zeroize;

use crate::alert::AlertDescription;
use crate::crypt::key_schedule::KeyBlock;
use crate::crypt::CipherSuiteParams;
use crate::handshake::HandshakeMessage;
use crate::ProtocolVersion;
use periscope_types::TlsError;

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

/// Everything the record layer needs to instantiate one direction of the
/// newly negotiated cipher. Handed over via `prepare_*_cipher`; the record
/// layer switches to it at the corresponding ChangeCipherSpec boundary.
pub struct PendingCipherSpec {
    pub version: ProtocolVersion,
    pub suite: CipherSuiteParams,
    pub mac_key: Vec<u8>,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl PendingCipherSpec {
    /// Cut one direction out of a freshly derived key block.
    pub fn client_write(version: ProtocolVersion, suite: &CipherSuiteParams, kb: &KeyBlock) -> Self {
        Self {
            version,
            suite: *suite,
            mac_key: kb.client_write_mac_key.clone(),
            key: kb.client_write_key.clone(),
            iv: kb.client_write_iv.clone(),
        }
    }

    pub fn server_write(version: ProtocolVersion, suite: &CipherSuiteParams, kb: &KeyBlock) -> Self {
        Self {
            version,
            suite: *suite,
            mac_key: kb.server_write_mac_key.clone(),
            key: kb.server_write_key.clone(),
            iv: kb.server_write_iv.clone(),
        }
    }
}

impl Drop for PendingCipherSpec {
    fn drop(&mut self) {
        self.mac_key.zeroize();
        self.key.zeroize();
        self.iv.zeroize();
    }
}

/// Interface the handshake driver consumes from the record layer.
///
/// Contract:
/// - `read_handshake` yields exactly one parsed handshake message,
///   reassembled across record boundaries by the implementation.
/// - `read_change_cipher_spec` awaits a ChangeCipherSpec record and flips
///   the read side to the spec staged by `prepare_read_cipher`.
/// - `write_record` writes one record; after a ChangeCipherSpec record is
///   written the implementation flips the write side to the spec staged by
///   `prepare_write_cipher`.
/// - All calls are blocking; errors are terminal for the handshake.
pub trait RecordTransport {
    fn read_handshake(&mut self) -> Result<HandshakeMessage, TlsError>;
    fn read_change_cipher_spec(&mut self) -> Result<(), TlsError>;
    fn write_record(&mut self, content_type: ContentType, payload: &[u8])
        -> Result<(), TlsError>;
    fn send_alert(&mut self, description: AlertDescription) -> Result<(), TlsError>;
    fn prepare_read_cipher(&mut self, spec: PendingCipherSpec) -> Result<(), TlsError>;
    fn prepare_write_cipher(&mut self, spec: PendingCipherSpec) -> Result<(), TlsError>;
    /// Peer address string, used as the session-cache key when no server
    /// name is configured.
    fn peer_address(&self) -> String;
}
