//! Certificate-chain validation wrapper.
//!
//! Scanning semantics: every presented certificate is parsed and recorded;
//! chain validation runs with full detail capture and only aborts the
//! handshake when `insecure_skip_verify` is off. Chain building and trust
//! evaluation are an external collaborator behind [`CertificateVerifier`];
//! per-certificate parsing has a default implementation backed by
//! `x509-parser` so the log and the key-type gate work on their own.

use std::time::SystemTime;

use periscope_types::TlsError;
use serde::Serialize;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::config::TlsConfig;

/// Public-key family of a certificate, as far as this client cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CertificateKeyType {
    Rsa,
    Ecdsa,
    /// ECDSA carrying the raw curve point alongside the parsed key, as
    /// emitted by measurement-grade X.509 stacks.
    AugmentedEcdsa,
    Dsa,
    Unknown(String),
}

/// One certificate out of the peer's chain, parsed far enough for the
/// handshake log and the key-exchange layer.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub der: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    /// Raw DER of the issuer distinguished name, for CertificateRequest
    /// CA matching.
    pub raw_issuer: Vec<u8>,
    pub key_type: CertificateKeyType,
    /// Present when the subject key is RSA; static-RSA key exchange
    /// encrypts the pre-master secret to it.
    pub rsa_public_key: Option<rsa::RsaPublicKey>,
}

/// Parses one DER certificate. External collaborator seam; the default is
/// [`X509Decoder`].
pub trait CertificateDecoder: Send + Sync {
    fn parse_certificate(&self, der: &[u8]) -> Result<ParsedCertificate, TlsError>;
}

/// `x509-parser`-backed decoder.
pub struct X509Decoder;

impl CertificateDecoder for X509Decoder {
    fn parse_certificate(&self, der: &[u8]) -> Result<ParsedCertificate, TlsError> {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| TlsError::CertVerifyFailed(format!("certificate parse: {e}")))?;

        let spki = cert.public_key();
        let (key_type, rsa_public_key) = match spki.parsed() {
            Ok(PublicKey::RSA(key)) => {
                let n = rsa::BigUint::from_bytes_be(key.modulus);
                let e = rsa::BigUint::from_bytes_be(key.exponent);
                match rsa::RsaPublicKey::new(n, e) {
                    Ok(pk) => (CertificateKeyType::Rsa, Some(pk)),
                    Err(_) => (CertificateKeyType::Rsa, None),
                }
            }
            Ok(PublicKey::EC(_)) => (CertificateKeyType::Ecdsa, None),
            Ok(PublicKey::DSA(_)) => (CertificateKeyType::Dsa, None),
            _ => (
                CertificateKeyType::Unknown(spki.algorithm.algorithm.to_string()),
                None,
            ),
        };

        Ok(ParsedCertificate {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            raw_issuer: cert.tbs_certificate.issuer.as_raw().to_vec(),
            key_type,
            rsa_public_key,
        })
    }
}

/// Options handed to the external validator, mirroring what it needs to
/// build and judge chains.
pub struct ValidationOptions<'a> {
    pub dns_name: &'a str,
    pub current_time: SystemTime,
    /// Every certificate the peer presented, leaf included.
    pub intermediates: &'a [ParsedCertificate],
}

/// A candidate chain, leaf first, DER-encoded.
pub type CertificateChain = Vec<Vec<u8>>;

/// Structured outcome of chain validation, captured into the handshake log
/// whether or not the handshake goes on to abort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CertificateValidation {
    pub browser_trusted: bool,
    pub browser_error: Option<String>,
    pub matches_domain: bool,
}

/// External chain validator seam.
///
/// Returns every chain it could build, the structured validation verdict,
/// and the error a strict client would abort with (if any). All three are
/// returned together so a scan records the verdict even when it proceeds
/// despite the error.
pub trait CertificateVerifier: Send + Sync {
    fn validate_with_detail(
        &self,
        leaf: &ParsedCertificate,
        opts: &ValidationOptions<'_>,
    ) -> (Vec<CertificateChain>, CertificateValidation, Option<TlsError>);
}

/// Everything the wrapper learned about the peer chain.
#[derive(Debug, Clone, Default)]
pub struct CertificateAudit {
    pub certificates: Vec<ParsedCertificate>,
    pub chains: Vec<CertificateChain>,
    pub validation: Option<CertificateValidation>,
}

/// Parse and validate the peer chain.
///
/// The audit is always populated as far as processing got, so the caller
/// can log it before acting on the error:
/// - any parse failure is fatal (`CertVerifyFailed` → bad_certificate);
/// - a validation failure is fatal only when `insecure_skip_verify` is off;
/// - an unsupported leaf key type is fatal (`UnsupportedCertificate`),
///   with DSA gated on `client_dsa_enabled`.
pub fn verify_server_certificates(
    config: &TlsConfig,
    chain_der: &[Vec<u8>],
) -> (CertificateAudit, Option<TlsError>) {
    let mut audit = CertificateAudit::default();

    for der in chain_der {
        match config.certificate_decoder.parse_certificate(der) {
            Ok(parsed) => audit.certificates.push(parsed),
            Err(e) => {
                return (
                    audit,
                    Some(TlsError::CertVerifyFailed(format!(
                        "failed to parse certificate from server: {e}"
                    ))),
                );
            }
        }
    }

    match config.certificate_verifier.as_deref() {
        Some(verifier) => {
            let opts = ValidationOptions {
                dns_name: &config.server_name,
                current_time: config.time(),
                intermediates: &audit.certificates,
            };
            let (chains, validation, error) =
                verifier.validate_with_detail(&audit.certificates[0], &opts);
            audit.chains = chains;
            audit.validation = Some(validation);
            if let Some(e) = error {
                if !config.insecure_skip_verify {
                    return (audit, Some(e));
                }
            }
        }
        None => {
            if !config.insecure_skip_verify {
                return (
                    audit,
                    Some(TlsError::CertVerifyFailed(
                        "no certificate verifier configured".into(),
                    )),
                );
            }
        }
    }

    let leaf = &audit.certificates[0];
    let supported = match leaf.key_type {
        CertificateKeyType::Rsa
        | CertificateKeyType::Ecdsa
        | CertificateKeyType::AugmentedEcdsa => true,
        CertificateKeyType::Dsa => config.client_dsa_enabled,
        CertificateKeyType::Unknown(_) => false,
    };
    if !supported {
        let err = TlsError::UnsupportedCertificate(format!("{:?}", leaf.key_type));
        return (audit, Some(err));
    }

    (audit, None)
}
