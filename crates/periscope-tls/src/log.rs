//! The handshake log: structured capture of every message exchanged.
//!
//! The log is the scanner's primary artifact. It is populated strictly in
//! wire order as messages are sent or received, never on speculative
//! paths, and it survives handshake failure so partial observations reach
//! the caller.

use serde::Serialize;

use crate::cert_verify::{
    CertificateAudit, CertificateChain, CertificateKeyType, CertificateValidation,
    ParsedCertificate,
};
use crate::handshake::codec::{ClientHello, ServerHello};
use crate::handshake::key_exchange::{ClientKeyExchangeParams, ServerKeyExchangeParams};
use periscope_types::SignatureAndHash;

/// Parsed form of one received certificate, log-friendly.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateLog {
    pub subject: String,
    pub issuer: String,
    pub key_type: CertificateKeyType,
}

impl From<&ParsedCertificate> for CertificateLog {
    fn from(cert: &ParsedCertificate) -> Self {
        Self {
            subject: cert.subject.clone(),
            issuer: cert.issuer.clone(),
            key_type: cert.key_type.clone(),
        }
    }
}

/// The server's Certificate message plus everything validation learned.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCertificatesLog {
    /// DER chain exactly as presented, leaf first.
    pub raw: Vec<Vec<u8>>,
    pub parsed: Vec<CertificateLog>,
    pub validation: Option<CertificateValidation>,
    pub chains: Vec<CertificateChain>,
    /// Stapled OCSP response, when the server sent CertificateStatus.
    pub ocsp_response: Option<Vec<u8>>,
}

impl ServerCertificatesLog {
    /// Attach the audit produced by the validation wrapper.
    pub fn add_audit(&mut self, audit: &CertificateAudit) {
        self.parsed = audit.certificates.iter().map(CertificateLog::from).collect();
        self.chains = audit.chains.clone();
        self.validation = audit.validation.clone();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerKeyExchangeLog {
    pub raw: Vec<u8>,
    pub params: Option<ServerKeyExchangeParams>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientKeyExchangeLog {
    pub raw: Vec<u8>,
    pub params: ClientKeyExchangeParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientCertificatesLog {
    /// DER chain sent, leaf first; empty when the request went unanswered.
    pub chain: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateVerifyLog {
    pub signature_and_hash: Option<SignatureAndHash>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionTicketLog {
    pub lifetime_hint: u32,
    pub ticket: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinishedLog {
    pub verify_data: Vec<u8>,
}

/// Derived secrets, for offline decryption of the recorded session.
#[derive(Debug, Clone, Serialize)]
pub struct KeyMaterialLog {
    pub master_secret: Vec<u8>,
    /// Empty on resumed handshakes.
    pub pre_master_secret: Vec<u8>,
}

/// Append-only record of the handshake, in wire order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HandshakeLog {
    pub client_hello: Option<ClientHello>,
    pub server_hello: Option<ServerHello>,
    pub server_certificates: Option<ServerCertificatesLog>,
    pub server_key_exchange: Option<ServerKeyExchangeLog>,
    pub client_certificates: Option<ClientCertificatesLog>,
    pub client_key_exchange: Option<ClientKeyExchangeLog>,
    pub certificate_verify: Option<CertificateVerifyLog>,
    pub session_ticket: Option<SessionTicketLog>,
    pub client_finished: Option<FinishedLog>,
    pub server_finished: Option<FinishedLog>,
    pub key_material: Option<KeyMaterialLog>,
}
