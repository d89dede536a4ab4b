//! User-specified ClientHello blueprints.
//!
//! A fingerprint dictates the first flight byte for byte: the caller lists
//! every extension (including raw ones this implementation does not
//! recognize) and the exact suite and compression vectors, so the emitted
//! hello can mimic another client's wire appearance. Most of the semantic
//! builder's sanity checks are bypassed; what remains is extension
//! validation, the compression-method rules, and the implemented-suite
//! check when `force_suites` is off.

use periscope_types::TlsError;

use super::codec::wrap_handshake;
use super::extensions_codec::{validate_extensions, ClientExtension};
use super::HandshakeType;
use crate::config::TlsConfig;
use crate::CipherSuite;

/// A literal ClientHello configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientHelloFingerprint {
    pub handshake_version: u16,
    /// Used verbatim when exactly 32 bytes; otherwise filled from the
    /// configured random source.
    pub client_random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<ClientExtension>,
}

impl ClientHelloFingerprint {
    /// Reject extension values this implementation cannot honor.
    pub fn validate_extensions(&self) -> Result<(), TlsError> {
        validate_extensions(&self.extensions)
    }

    /// Emit the exact handshake-message bytes for this blueprint.
    pub fn marshal(&self, config: &TlsConfig) -> Result<Vec<u8>, TlsError> {
        self.validate_extensions()?;

        let mut body = Vec::with_capacity(64);
        body.extend_from_slice(&self.handshake_version.to_be_bytes());

        if self.client_random.len() == 32 {
            body.extend_from_slice(&self.client_random);
        } else {
            let mut random = [0u8; 32];
            config.fill_random(&mut random)?;
            body.extend_from_slice(&random);
        }

        body.push(self.session_id.len() as u8);
        body.extend_from_slice(&self.session_id);

        body.extend_from_slice(&((2 * self.cipher_suites.len()) as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            if !config.force_suites && !crate::crypt::is_implemented(*suite) {
                return Err(TlsError::ConfigError(format!(
                    "unimplemented cipher suite {:#06x}",
                    suite.0
                )));
            }
            body.extend_from_slice(&suite.0.to_be_bytes());
        }

        match self.compression_methods.split_first() {
            None => return Err(TlsError::ConfigError("no compression method".into())),
            Some((first, rest)) => {
                if *first != 0 {
                    return Err(TlsError::ConfigError(format!(
                        "unimplemented compression method {first}"
                    )));
                }
                if let Some(second) = rest.first() {
                    return Err(TlsError::ConfigError(format!(
                        "unimplemented compression method {second}"
                    )));
                }
            }
        }
        body.push(self.compression_methods.len() as u8);
        body.extend_from_slice(&self.compression_methods);

        let mut ext_bytes = Vec::new();
        for ext in &self.extensions {
            ext_bytes.extend_from_slice(&ext.marshal());
        }
        if !ext_bytes.is_empty() {
            body.extend_from_slice(&(ext_bytes.len() as u16).to_be_bytes());
            body.extend_from_slice(&ext_bytes);
        }

        Ok(wrap_handshake(HandshakeType::ClientHello, &body))
    }
}
