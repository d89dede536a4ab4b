//! ClientHello extension codec.
//!
//! Extensions are a tagged sum; the codec dispatches on the tag. Each
//! extension marshals to `type(2) || length(2) || body`. Two wire layouts
//! here are deliberately non-standard and must stay byte-stable because
//! remote fingerprinting depends on them:
//!
//! - SNI writes a single leading name_type byte and then every domain with
//!   its own 2-byte length prefix.
//! - ALPN length-prefixes each protocol name with 2 bytes where RFC 7301
//!   uses 1.
//!
//! Unknown extensions (and known types whose body does not match the
//! canonical layout) are carried as [`ClientExtension::Raw`], so parsing
//! and re-marshalling arbitrary fingerprint bytes is lossless.

use periscope_types::{
    CurveId, HashId, SignatureAndHash, SignatureId, TlsError,
    POINT_FORMAT_UNCOMPRESSED, SUPPORTED_SKX_SIGNATURE_ALGORITHMS,
};
use serde::Serialize;

/// TLS extension type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtensionType(pub u16);

impl ExtensionType {
    pub const SERVER_NAME: Self = Self(0);
    pub const STATUS_REQUEST: Self = Self(5);
    pub const SUPPORTED_CURVES: Self = Self(10);
    pub const POINT_FORMATS: Self = Self(11);
    pub const SIGNATURE_ALGORITHMS: Self = Self(13);
    pub const HEARTBEAT: Self = Self(15);
    pub const ALPN: Self = Self(16);
    pub const SIGNED_CERTIFICATE_TIMESTAMP: Self = Self(18);
    pub const EXTENDED_MASTER_SECRET: Self = Self(23);
    pub const SESSION_TICKET: Self = Self(35);
    pub const EXTENDED_RANDOM: Self = Self(40);
    pub const NEXT_PROTO_NEG: Self = Self(13172);
    pub const RENEGOTIATION_INFO: Self = Self(0xFF01);
}

/// A recognized ClientHello extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ClientExtension {
    Sni { domains: Vec<String> },
    Alpn { protocols: Vec<String> },
    SecureRenegotiation,
    ExtendedMasterSecret,
    NextProtocolNegotiation,
    StatusRequest,
    SignedCertificateTimestamp,
    SupportedCurves { curves: Vec<CurveId> },
    PointFormats { formats: Vec<u8> },
    SessionTicket { ticket: Vec<u8> },
    SignatureAlgorithms { algorithms: Vec<SignatureAndHash> },
    Heartbeat { mode: u8 },
    ExtendedRandom { random: Vec<u8> },
    Raw { extension_type: u16, data: Vec<u8> },
}

fn wrap(extension_type: ExtensionType, body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&extension_type.0.to_be_bytes());
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

impl ClientExtension {
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            ClientExtension::Sni { .. } => ExtensionType::SERVER_NAME,
            ClientExtension::Alpn { .. } => ExtensionType::ALPN,
            ClientExtension::SecureRenegotiation => ExtensionType::RENEGOTIATION_INFO,
            ClientExtension::ExtendedMasterSecret => ExtensionType::EXTENDED_MASTER_SECRET,
            ClientExtension::NextProtocolNegotiation => ExtensionType::NEXT_PROTO_NEG,
            ClientExtension::StatusRequest => ExtensionType::STATUS_REQUEST,
            ClientExtension::SignedCertificateTimestamp => {
                ExtensionType::SIGNED_CERTIFICATE_TIMESTAMP
            }
            ClientExtension::SupportedCurves { .. } => ExtensionType::SUPPORTED_CURVES,
            ClientExtension::PointFormats { .. } => ExtensionType::POINT_FORMATS,
            ClientExtension::SessionTicket { .. } => ExtensionType::SESSION_TICKET,
            ClientExtension::SignatureAlgorithms { .. } => ExtensionType::SIGNATURE_ALGORITHMS,
            ClientExtension::Heartbeat { .. } => ExtensionType::HEARTBEAT,
            ClientExtension::ExtendedRandom { .. } => ExtensionType::EXTENDED_RANDOM,
            ClientExtension::Raw { extension_type, .. } => ExtensionType(*extension_type),
        }
    }

    /// Wire bytes: `type(2) || length(2) || body`.
    pub fn marshal(&self) -> Vec<u8> {
        match self {
            ClientExtension::Sni { domains } => {
                let mut names = Vec::new();
                for domain in domains {
                    names.extend_from_slice(&(domain.len() as u16).to_be_bytes());
                    names.extend_from_slice(domain.as_bytes());
                }
                // One name_type byte for the whole list, then the names.
                let mut body = Vec::with_capacity(3 + names.len());
                body.extend_from_slice(&((names.len() + 1) as u16).to_be_bytes());
                body.push(0);
                body.extend_from_slice(&names);
                wrap(ExtensionType::SERVER_NAME, body)
            }
            ClientExtension::Alpn { protocols } => {
                let mut names = Vec::new();
                for protocol in protocols {
                    names.extend_from_slice(&(protocol.len() as u16).to_be_bytes());
                    names.extend_from_slice(protocol.as_bytes());
                }
                let mut body = Vec::with_capacity(2 + names.len());
                body.extend_from_slice(&(names.len() as u16).to_be_bytes());
                body.extend_from_slice(&names);
                wrap(ExtensionType::ALPN, body)
            }
            ClientExtension::SecureRenegotiation => {
                // Empty renegotiated_connection.
                wrap(ExtensionType::RENEGOTIATION_INFO, vec![0])
            }
            ClientExtension::ExtendedMasterSecret => {
                wrap(ExtensionType::EXTENDED_MASTER_SECRET, Vec::new())
            }
            ClientExtension::NextProtocolNegotiation => {
                wrap(ExtensionType::NEXT_PROTO_NEG, Vec::new())
            }
            ClientExtension::StatusRequest => wrap(ExtensionType::STATUS_REQUEST, Vec::new()),
            ClientExtension::SignedCertificateTimestamp => {
                wrap(ExtensionType::SIGNED_CERTIFICATE_TIMESTAMP, Vec::new())
            }
            ClientExtension::SupportedCurves { curves } => {
                let mut body = Vec::with_capacity(2 + 2 * curves.len());
                body.extend_from_slice(&((2 * curves.len()) as u16).to_be_bytes());
                for curve in curves {
                    body.extend_from_slice(&curve.0.to_be_bytes());
                }
                wrap(ExtensionType::SUPPORTED_CURVES, body)
            }
            ClientExtension::PointFormats { formats } => {
                let mut body = Vec::with_capacity(1 + formats.len());
                body.push(formats.len() as u8);
                body.extend_from_slice(formats);
                wrap(ExtensionType::POINT_FORMATS, body)
            }
            ClientExtension::SessionTicket { ticket } => {
                wrap(ExtensionType::SESSION_TICKET, ticket.clone())
            }
            ClientExtension::SignatureAlgorithms { algorithms } => {
                let mut body = Vec::with_capacity(2 + 2 * algorithms.len());
                body.extend_from_slice(&((2 * algorithms.len()) as u16).to_be_bytes());
                for pair in algorithms {
                    body.push(pair.hash.0);
                    body.push(pair.signature.0);
                }
                wrap(ExtensionType::SIGNATURE_ALGORITHMS, body)
            }
            ClientExtension::Heartbeat { mode } => wrap(ExtensionType::HEARTBEAT, vec![*mode]),
            ClientExtension::ExtendedRandom { random } => {
                let mut body = Vec::with_capacity(2 + random.len());
                body.extend_from_slice(&(random.len() as u16).to_be_bytes());
                body.extend_from_slice(random);
                wrap(ExtensionType::EXTENDED_RANDOM, body)
            }
            ClientExtension::Raw {
                extension_type,
                data,
            } => wrap(ExtensionType(*extension_type), data.clone()),
        }
    }

    /// Parse one extension body. Known types whose body does not match the
    /// canonical layout fall back to `Raw` so the bytes survive a
    /// re-marshal unchanged.
    pub fn parse(extension_type: u16, data: &[u8]) -> ClientExtension {
        let parsed = match ExtensionType(extension_type) {
            ExtensionType::SERVER_NAME => parse_sni(data),
            ExtensionType::ALPN => parse_alpn(data),
            ExtensionType::RENEGOTIATION_INFO => {
                (data == [0]).then_some(ClientExtension::SecureRenegotiation)
            }
            ExtensionType::EXTENDED_MASTER_SECRET => {
                data.is_empty().then_some(ClientExtension::ExtendedMasterSecret)
            }
            ExtensionType::NEXT_PROTO_NEG => {
                data.is_empty().then_some(ClientExtension::NextProtocolNegotiation)
            }
            ExtensionType::STATUS_REQUEST => {
                data.is_empty().then_some(ClientExtension::StatusRequest)
            }
            ExtensionType::SIGNED_CERTIFICATE_TIMESTAMP => data
                .is_empty()
                .then_some(ClientExtension::SignedCertificateTimestamp),
            ExtensionType::SUPPORTED_CURVES => parse_supported_curves(data),
            ExtensionType::POINT_FORMATS => parse_point_formats(data),
            ExtensionType::SESSION_TICKET => Some(ClientExtension::SessionTicket {
                ticket: data.to_vec(),
            }),
            ExtensionType::SIGNATURE_ALGORITHMS => parse_signature_algorithms(data),
            ExtensionType::HEARTBEAT => match data {
                [mode] => Some(ClientExtension::Heartbeat { mode: *mode }),
                _ => None,
            },
            ExtensionType::EXTENDED_RANDOM => parse_extended_random(data),
            _ => None,
        };
        parsed.unwrap_or(ClientExtension::Raw {
            extension_type,
            data: data.to_vec(),
        })
    }
}

fn parse_sni(data: &[u8]) -> Option<ClientExtension> {
    if data.len() < 3 {
        return None;
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if list_len != data.len() - 2 || data[2] != 0 {
        return None;
    }
    let mut domains = Vec::new();
    let mut pos = 3;
    while pos < data.len() {
        if data.len() - pos < 2 {
            return None;
        }
        let len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;
        if data.len() - pos < len {
            return None;
        }
        domains.push(String::from_utf8(data[pos..pos + len].to_vec()).ok()?);
        pos += len;
    }
    Some(ClientExtension::Sni { domains })
}

fn parse_alpn(data: &[u8]) -> Option<ClientExtension> {
    if data.len() < 2 {
        return None;
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if list_len != data.len() - 2 {
        return None;
    }
    let mut protocols = Vec::new();
    let mut pos = 2;
    while pos < data.len() {
        if data.len() - pos < 2 {
            return None;
        }
        let len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;
        if data.len() - pos < len {
            return None;
        }
        protocols.push(String::from_utf8(data[pos..pos + len].to_vec()).ok()?);
        pos += len;
    }
    Some(ClientExtension::Alpn { protocols })
}

fn parse_supported_curves(data: &[u8]) -> Option<ClientExtension> {
    if data.len() < 2 {
        return None;
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if list_len != data.len() - 2 || list_len % 2 != 0 {
        return None;
    }
    let curves = data[2..]
        .chunks_exact(2)
        .map(|c| CurveId(u16::from_be_bytes([c[0], c[1]])))
        .collect();
    Some(ClientExtension::SupportedCurves { curves })
}

fn parse_point_formats(data: &[u8]) -> Option<ClientExtension> {
    if data.is_empty() || data[0] as usize != data.len() - 1 {
        return None;
    }
    Some(ClientExtension::PointFormats {
        formats: data[1..].to_vec(),
    })
}

fn parse_signature_algorithms(data: &[u8]) -> Option<ClientExtension> {
    if data.len() < 2 {
        return None;
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if list_len != data.len() - 2 || list_len % 2 != 0 {
        return None;
    }
    let algorithms = data[2..]
        .chunks_exact(2)
        .map(|c| SignatureAndHash::new(HashId(c[0]), SignatureId(c[1])))
        .collect();
    Some(ClientExtension::SignatureAlgorithms { algorithms })
}

fn parse_extended_random(data: &[u8]) -> Option<ClientExtension> {
    if data.len() < 2 {
        return None;
    }
    let len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if len != data.len() - 2 {
        return None;
    }
    Some(ClientExtension::ExtendedRandom {
        random: data[2..].to_vec(),
    })
}

/// Reject configuration-supplied extensions that carry values this
/// implementation cannot honor: compressed EC point formats, and
/// signature/hash pairs outside the supported ServerKeyExchange set.
pub fn validate_extensions(extensions: &[ClientExtension]) -> Result<(), TlsError> {
    for ext in extensions {
        match ext {
            ClientExtension::PointFormats { formats } => {
                for format in formats {
                    if *format != POINT_FORMAT_UNCOMPRESSED {
                        return Err(TlsError::ConfigError(format!(
                            "unsupported EC point format {format}"
                        )));
                    }
                }
            }
            ClientExtension::SignatureAlgorithms { algorithms } => {
                for pair in algorithms {
                    if !SUPPORTED_SKX_SIGNATURE_ALGORITHMS.contains(pair) {
                        return Err(TlsError::ConfigError(format!(
                            "unsupported hash and signature algorithm ({}, {})",
                            pair.hash.0, pair.signature.0
                        )));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}
