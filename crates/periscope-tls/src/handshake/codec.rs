//! Handshake message encoding/decoding (RFC 5246 §7.4).
//!
//! The client only ever emits ClientHello, Certificate, ClientKeyExchange,
//! CertificateVerify, NextProtocol and Finished; decoders cover the server
//! flight. Server-side encoders exist for the scripted peers the tests
//! drive the state machine against.

use periscope_types::{CurveId, HashId, SignatureAndHash, SignatureId, TlsError};
use serde::Serialize;

use super::extensions_codec::{ClientExtension, ExtensionType};
use super::HandshakeType;
use crate::CipherSuite;

// ---------------------------------------------------------------------------
// Handshake header
// ---------------------------------------------------------------------------

/// Parse a handshake header: msg_type(1) || length(3).
/// Returns (type, body, total bytes consumed).
pub fn parse_handshake_header(data: &[u8]) -> Result<(HandshakeType, &[u8], usize), TlsError> {
    if data.len() < 4 {
        return Err(TlsError::UnexpectedMessage(
            "handshake header too short".into(),
        ));
    }
    let msg_type = HandshakeType::from_u8(data[0])
        .map_err(|v| TlsError::UnexpectedMessage(format!("unknown handshake type {v}")))?;
    let length = read_u24(&data[1..]) as usize;
    let total = 4 + length;
    if data.len() < total {
        return Err(TlsError::UnexpectedMessage(
            "handshake message body truncated".into(),
        ));
    }
    Ok((msg_type, &data[4..total], total))
}

/// Wrap a handshake body with the 4-byte header.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let len = body.len();
    let mut out = Vec::with_capacity(4 + len);
    out.push(msg_type as u8);
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
    out.extend_from_slice(body);
    out
}

/// Read a 3-byte big-endian integer.
pub fn read_u24(data: &[u8]) -> u32 {
    ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32)
}

// ---------------------------------------------------------------------------
// ClientHello
// ---------------------------------------------------------------------------

/// Semantic form of a ClientHello. Both construction paths end up here:
/// the builder fills it from configuration, the fingerprint path re-parses
/// its own emitted bytes into it so the driver can reason about what was
/// actually sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientHello {
    pub version: u16,
    pub random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    pub server_names: Vec<String>,
    pub ocsp_stapling: bool,
    pub supported_curves: Vec<CurveId>,
    pub supported_points: Vec<u8>,
    pub ticket_supported: bool,
    pub session_ticket: Vec<u8>,
    pub signature_and_hashes: Vec<SignatureAndHash>,
    pub secure_renegotiation: bool,
    pub extended_master_secret: bool,
    pub next_proto_neg: bool,
    pub heartbeat_enabled: bool,
    pub heartbeat_mode: u8,
    pub extended_random: Option<Vec<u8>>,
    pub sct_enabled: bool,
    pub alpn_protocols: Vec<String>,
}

impl ClientHello {
    /// Assemble the extension list in the fixed emission order.
    fn extensions(&self) -> Vec<ClientExtension> {
        let mut exts = Vec::new();
        if self.next_proto_neg {
            exts.push(ClientExtension::NextProtocolNegotiation);
        }
        if !self.server_names.is_empty() {
            exts.push(ClientExtension::Sni {
                domains: self.server_names.clone(),
            });
        }
        if let Some(ref random) = self.extended_random {
            exts.push(ClientExtension::ExtendedRandom {
                random: random.clone(),
            });
        }
        if self.ocsp_stapling {
            exts.push(ClientExtension::StatusRequest);
        }
        if !self.supported_curves.is_empty() {
            exts.push(ClientExtension::SupportedCurves {
                curves: self.supported_curves.clone(),
            });
        }
        if !self.supported_points.is_empty() {
            exts.push(ClientExtension::PointFormats {
                formats: self.supported_points.clone(),
            });
        }
        if self.ticket_supported {
            exts.push(ClientExtension::SessionTicket {
                ticket: self.session_ticket.clone(),
            });
        }
        if !self.signature_and_hashes.is_empty() {
            exts.push(ClientExtension::SignatureAlgorithms {
                algorithms: self.signature_and_hashes.clone(),
            });
        }
        if !self.alpn_protocols.is_empty() {
            exts.push(ClientExtension::Alpn {
                protocols: self.alpn_protocols.clone(),
            });
        }
        if self.secure_renegotiation {
            exts.push(ClientExtension::SecureRenegotiation);
        }
        if self.heartbeat_enabled {
            exts.push(ClientExtension::Heartbeat {
                mode: self.heartbeat_mode,
            });
        }
        if self.extended_master_secret {
            exts.push(ClientExtension::ExtendedMasterSecret);
        }
        if self.sct_enabled {
            exts.push(ClientExtension::SignedCertificateTimestamp);
        }
        exts
    }

    /// Encode as a complete handshake message (header + body).
    pub fn marshal(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(128);
        body.extend_from_slice(&self.version.to_be_bytes());
        body.extend_from_slice(&self.random);

        body.push(self.session_id.len() as u8);
        body.extend_from_slice(&self.session_id);

        body.extend_from_slice(&((2 * self.cipher_suites.len()) as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            body.extend_from_slice(&suite.0.to_be_bytes());
        }

        body.push(self.compression_methods.len() as u8);
        body.extend_from_slice(&self.compression_methods);

        let mut ext_bytes = Vec::new();
        for ext in self.extensions() {
            ext_bytes.extend_from_slice(&ext.marshal());
        }
        if !ext_bytes.is_empty() {
            body.extend_from_slice(&(ext_bytes.len() as u16).to_be_bytes());
            body.extend_from_slice(&ext_bytes);
        }

        wrap_handshake(HandshakeType::ClientHello, &body)
    }

    /// Decode a ClientHello from handshake body bytes (after the header).
    /// Unknown extensions are dropped; the semantic fields carry everything
    /// the driver reasons about.
    pub fn parse(body: &[u8]) -> Result<ClientHello, TlsError> {
        let err = |msg: &str| TlsError::UnexpectedMessage(format!("ClientHello: {msg}"));
        let mut pos = 0;

        if body.len() < 34 {
            return Err(err("too short for version and random"));
        }
        let version = u16::from_be_bytes([body[0], body[1]]);
        let random = body[2..34].to_vec();
        pos += 34;

        let sid_len = *body.get(pos).ok_or_else(|| err("missing session_id"))? as usize;
        pos += 1;
        if body.len() < pos + sid_len {
            return Err(err("truncated session_id"));
        }
        let session_id = body[pos..pos + sid_len].to_vec();
        pos += sid_len;

        if body.len() < pos + 2 {
            return Err(err("missing cipher_suites length"));
        }
        let suites_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
        pos += 2;
        if suites_len % 2 != 0 || body.len() < pos + suites_len {
            return Err(err("bad cipher_suites length"));
        }
        let cipher_suites = body[pos..pos + suites_len]
            .chunks_exact(2)
            .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
            .collect();
        pos += suites_len;

        let comp_len = *body.get(pos).ok_or_else(|| err("missing compression"))? as usize;
        pos += 1;
        if body.len() < pos + comp_len {
            return Err(err("truncated compression methods"));
        }
        let compression_methods = body[pos..pos + comp_len].to_vec();
        pos += comp_len;

        let mut hello = ClientHello {
            version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            ..ClientHello::default()
        };

        if pos == body.len() {
            return Ok(hello);
        }
        if body.len() < pos + 2 {
            return Err(err("truncated extensions length"));
        }
        let ext_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
        pos += 2;
        if body.len() < pos + ext_len {
            return Err(err("truncated extensions"));
        }
        let ext_end = pos + ext_len;

        while pos < ext_end {
            if ext_end - pos < 4 {
                return Err(err("truncated extension header"));
            }
            let typ = u16::from_be_bytes([body[pos], body[pos + 1]]);
            let len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
            pos += 4;
            if ext_end - pos < len {
                return Err(err("truncated extension body"));
            }
            let data = &body[pos..pos + len];
            pos += len;
            hello.apply_extension(ClientExtension::parse(typ, data));
        }

        Ok(hello)
    }

    fn apply_extension(&mut self, ext: ClientExtension) {
        match ext {
            ClientExtension::Sni { domains } => self.server_names = domains,
            ClientExtension::Alpn { protocols } => self.alpn_protocols = protocols,
            ClientExtension::SecureRenegotiation => self.secure_renegotiation = true,
            ClientExtension::ExtendedMasterSecret => self.extended_master_secret = true,
            ClientExtension::NextProtocolNegotiation => self.next_proto_neg = true,
            ClientExtension::StatusRequest => self.ocsp_stapling = true,
            ClientExtension::SignedCertificateTimestamp => self.sct_enabled = true,
            ClientExtension::SupportedCurves { curves } => self.supported_curves = curves,
            ClientExtension::PointFormats { formats } => self.supported_points = formats,
            ClientExtension::SessionTicket { ticket } => {
                self.ticket_supported = true;
                self.session_ticket = ticket;
            }
            ClientExtension::SignatureAlgorithms { algorithms } => {
                self.signature_and_hashes = algorithms;
            }
            ClientExtension::Heartbeat { mode } => {
                self.heartbeat_enabled = true;
                self.heartbeat_mode = mode;
            }
            ClientExtension::ExtendedRandom { random } => self.extended_random = Some(random),
            // A raw status_request body still means stapling was offered;
            // other raw extensions carry no semantic weight here.
            ClientExtension::Raw { extension_type, .. } => {
                if ExtensionType(extension_type) == ExtensionType::STATUS_REQUEST {
                    self.ocsp_stapling = true;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ServerHello
// ---------------------------------------------------------------------------

/// Parsed ServerHello, including every extension this client can observe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerHello {
    pub version: u16,
    pub random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
    pub next_proto_neg: bool,
    pub next_protos: Vec<String>,
    pub ocsp_stapling: bool,
    pub ticket_supported: bool,
    pub secure_renegotiation: bool,
    pub extended_master_secret: bool,
    pub heartbeat_enabled: bool,
    pub heartbeat_mode: u8,
    pub extended_random: Option<Vec<u8>>,
    pub alpn_protocol: Option<String>,
}

/// Decode a ServerHello from handshake body bytes.
pub fn parse_server_hello(body: &[u8]) -> Result<ServerHello, TlsError> {
    let err = |msg: &str| TlsError::UnexpectedMessage(format!("ServerHello: {msg}"));
    let mut pos = 0;

    if body.len() < 34 {
        return Err(err("too short for version and random"));
    }
    let version = u16::from_be_bytes([body[0], body[1]]);
    let random = body[2..34].to_vec();
    pos += 34;

    let sid_len = *body.get(pos).ok_or_else(|| err("missing session_id"))? as usize;
    pos += 1;
    if sid_len > 32 || body.len() < pos + sid_len {
        return Err(err("bad session_id"));
    }
    let session_id = body[pos..pos + sid_len].to_vec();
    pos += sid_len;

    if body.len() < pos + 3 {
        return Err(err("too short for cipher suite"));
    }
    let cipher_suite = CipherSuite(u16::from_be_bytes([body[pos], body[pos + 1]]));
    let compression_method = body[pos + 2];
    pos += 3;

    let mut hello = ServerHello {
        version,
        random,
        session_id,
        cipher_suite,
        compression_method,
        ..ServerHello::default()
    };

    if pos == body.len() {
        return Ok(hello);
    }
    if body.len() < pos + 2 {
        return Err(err("truncated extensions length"));
    }
    let ext_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    pos += 2;
    if body.len() < pos + ext_len {
        return Err(err("truncated extensions"));
    }
    let ext_end = pos + ext_len;

    while pos < ext_end {
        if ext_end - pos < 4 {
            return Err(err("truncated extension header"));
        }
        let typ = ExtensionType(u16::from_be_bytes([body[pos], body[pos + 1]]));
        let len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        pos += 4;
        if ext_end - pos < len {
            return Err(err("truncated extension body"));
        }
        let data = &body[pos..pos + len];
        pos += len;

        match typ {
            ExtensionType::NEXT_PROTO_NEG => {
                hello.next_proto_neg = true;
                let mut p = 0;
                while p < data.len() {
                    let plen = data[p] as usize;
                    p += 1;
                    if data.len() - p < plen {
                        return Err(err("truncated NPN protocol list"));
                    }
                    hello.next_protos.push(
                        String::from_utf8(data[p..p + plen].to_vec())
                            .map_err(|_| err("NPN protocol not UTF-8"))?,
                    );
                    p += plen;
                }
            }
            ExtensionType::STATUS_REQUEST => hello.ocsp_stapling = true,
            ExtensionType::SESSION_TICKET => hello.ticket_supported = true,
            ExtensionType::RENEGOTIATION_INFO => hello.secure_renegotiation = true,
            ExtensionType::EXTENDED_MASTER_SECRET => hello.extended_master_secret = true,
            ExtensionType::HEARTBEAT => {
                hello.heartbeat_enabled = true;
                hello.heartbeat_mode = *data.first().unwrap_or(&0);
            }
            ExtensionType::EXTENDED_RANDOM => {
                if data.len() < 2 {
                    return Err(err("truncated extended random"));
                }
                let rlen = u16::from_be_bytes([data[0], data[1]]) as usize;
                if data.len() - 2 < rlen {
                    return Err(err("truncated extended random"));
                }
                hello.extended_random = Some(data[2..2 + rlen].to_vec());
            }
            ExtensionType::ALPN => {
                // selected_list_len(2) || name_len(1) || name
                if data.len() < 3 {
                    return Err(err("truncated ALPN selection"));
                }
                let nlen = data[2] as usize;
                if data.len() - 3 < nlen {
                    return Err(err("truncated ALPN selection"));
                }
                hello.alpn_protocol = Some(
                    String::from_utf8(data[3..3 + nlen].to_vec())
                        .map_err(|_| err("ALPN protocol not UTF-8"))?,
                );
            }
            _ => {}
        }
    }

    Ok(hello)
}

/// Encode a ServerHello (scripted test peers only).
pub fn encode_server_hello(hello: &ServerHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(48);
    body.extend_from_slice(&hello.version.to_be_bytes());
    body.extend_from_slice(&hello.random);
    body.push(hello.session_id.len() as u8);
    body.extend_from_slice(&hello.session_id);
    body.extend_from_slice(&hello.cipher_suite.0.to_be_bytes());
    body.push(hello.compression_method);

    let mut exts = Vec::new();
    let mut push_ext = |typ: ExtensionType, data: &[u8]| {
        exts.extend_from_slice(&typ.0.to_be_bytes());
        exts.extend_from_slice(&(data.len() as u16).to_be_bytes());
        exts.extend_from_slice(data);
    };
    if hello.next_proto_neg {
        let mut data = Vec::new();
        for proto in &hello.next_protos {
            data.push(proto.len() as u8);
            data.extend_from_slice(proto.as_bytes());
        }
        push_ext(ExtensionType::NEXT_PROTO_NEG, &data);
    }
    if hello.ocsp_stapling {
        push_ext(ExtensionType::STATUS_REQUEST, &[]);
    }
    if hello.ticket_supported {
        push_ext(ExtensionType::SESSION_TICKET, &[]);
    }
    if hello.secure_renegotiation {
        push_ext(ExtensionType::RENEGOTIATION_INFO, &[0]);
    }
    if hello.extended_master_secret {
        push_ext(ExtensionType::EXTENDED_MASTER_SECRET, &[]);
    }
    if hello.heartbeat_enabled {
        push_ext(ExtensionType::HEARTBEAT, &[hello.heartbeat_mode]);
    }
    if let Some(ref random) = hello.extended_random {
        let mut data = Vec::with_capacity(2 + random.len());
        data.extend_from_slice(&(random.len() as u16).to_be_bytes());
        data.extend_from_slice(random);
        push_ext(ExtensionType::EXTENDED_RANDOM, &data);
    }
    if let Some(ref proto) = hello.alpn_protocol {
        let mut data = Vec::with_capacity(3 + proto.len());
        data.extend_from_slice(&((proto.len() + 1) as u16).to_be_bytes());
        data.push(proto.len() as u8);
        data.extend_from_slice(proto.as_bytes());
        push_ext(ExtensionType::ALPN, &data);
    }

    if !exts.is_empty() {
        body.extend_from_slice(&(exts.len() as u16).to_be_bytes());
        body.extend_from_slice(&exts);
    }
    wrap_handshake(HandshakeType::ServerHello, &body)
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// Decode a Certificate message body into its DER chain (leaf first).
pub fn parse_certificate(body: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    let err = |msg: &str| TlsError::UnexpectedMessage(format!("Certificate: {msg}"));
    if body.len() < 3 {
        return Err(err("too short"));
    }
    let total = read_u24(body) as usize;
    if body.len() < 3 + total {
        return Err(err("truncated chain"));
    }
    let mut certs = Vec::new();
    let mut pos = 3;
    let end = 3 + total;
    while pos < end {
        if end - pos < 3 {
            return Err(err("truncated entry length"));
        }
        let len = read_u24(&body[pos..]) as usize;
        pos += 3;
        if end - pos < len {
            return Err(err("truncated entry"));
        }
        certs.push(body[pos..pos + len].to_vec());
        pos += len;
    }
    Ok(certs)
}

/// Encode a Certificate message. An empty chain is legal: the client sends
/// one when a CertificateRequest cannot be satisfied.
pub fn encode_certificate(chain: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = chain.iter().map(|c| 3 + c.len()).sum();
    let mut body = Vec::with_capacity(3 + total);
    body.push((total >> 16) as u8);
    body.push((total >> 8) as u8);
    body.push(total as u8);
    for cert in chain {
        let len = cert.len();
        body.push((len >> 16) as u8);
        body.push((len >> 8) as u8);
        body.push(len as u8);
        body.extend_from_slice(cert);
    }
    wrap_handshake(HandshakeType::Certificate, &body)
}

// ---------------------------------------------------------------------------
// CertificateStatus
// ---------------------------------------------------------------------------

/// CertificateStatus (RFC 6066 §8). Only the OCSP status type is decoded;
/// anything else is carried raw for the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateStatus {
    pub status_type: u8,
    pub response: Vec<u8>,
}

pub const STATUS_TYPE_OCSP: u8 = 1;

pub fn parse_certificate_status(body: &[u8]) -> Result<CertificateStatus, TlsError> {
    let err = |msg: &str| TlsError::UnexpectedMessage(format!("CertificateStatus: {msg}"));
    if body.is_empty() {
        return Err(err("empty"));
    }
    let status_type = body[0];
    if status_type != STATUS_TYPE_OCSP {
        return Ok(CertificateStatus {
            status_type,
            response: body[1..].to_vec(),
        });
    }
    if body.len() < 4 {
        return Err(err("too short for response length"));
    }
    let len = read_u24(&body[1..]) as usize;
    if body.len() < 4 + len {
        return Err(err("truncated response"));
    }
    Ok(CertificateStatus {
        status_type,
        response: body[4..4 + len].to_vec(),
    })
}

pub fn encode_certificate_status(status: &CertificateStatus) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + status.response.len());
    body.push(status.status_type);
    let len = status.response.len();
    body.push((len >> 16) as u8);
    body.push((len >> 8) as u8);
    body.push(len as u8);
    body.extend_from_slice(&status.response);
    wrap_handshake(HandshakeType::CertificateStatus, &body)
}

// ---------------------------------------------------------------------------
// CertificateRequest
// ---------------------------------------------------------------------------

pub const CERT_TYPE_RSA_SIGN: u8 = 1;
pub const CERT_TYPE_ECDSA_SIGN: u8 = 64;

/// CertificateRequest (RFC 5246 §7.4.4).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub signature_and_hashes: Vec<SignatureAndHash>,
    /// DER-encoded distinguished names of acceptable CAs.
    pub certificate_authorities: Vec<Vec<u8>>,
}

/// Decode a CertificateRequest. `has_signature_and_hash` is true iff the
/// negotiated version is TLS 1.2.
pub fn parse_certificate_request(
    body: &[u8],
    has_signature_and_hash: bool,
) -> Result<CertificateRequest, TlsError> {
    let err = |msg: &str| TlsError::UnexpectedMessage(format!("CertificateRequest: {msg}"));
    let mut pos = 0;

    let types_len = *body.first().ok_or_else(|| err("empty"))? as usize;
    pos += 1;
    if body.len() < pos + types_len {
        return Err(err("truncated certificate types"));
    }
    let certificate_types = body[pos..pos + types_len].to_vec();
    pos += types_len;

    let mut signature_and_hashes = Vec::new();
    if has_signature_and_hash {
        if body.len() < pos + 2 {
            return Err(err("missing signature algorithms"));
        }
        let algs_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
        pos += 2;
        if algs_len % 2 != 0 || body.len() < pos + algs_len {
            return Err(err("bad signature algorithms"));
        }
        signature_and_hashes = body[pos..pos + algs_len]
            .chunks_exact(2)
            .map(|c| SignatureAndHash::new(HashId(c[0]), SignatureId(c[1])))
            .collect();
        pos += algs_len;
    }

    if body.len() < pos + 2 {
        return Err(err("missing certificate authorities"));
    }
    let cas_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    pos += 2;
    if body.len() < pos + cas_len {
        return Err(err("truncated certificate authorities"));
    }
    let cas_end = pos + cas_len;
    let mut certificate_authorities = Vec::new();
    while pos < cas_end {
        if cas_end - pos < 2 {
            return Err(err("truncated CA name length"));
        }
        let len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
        pos += 2;
        if cas_end - pos < len {
            return Err(err("truncated CA name"));
        }
        certificate_authorities.push(body[pos..pos + len].to_vec());
        pos += len;
    }

    Ok(CertificateRequest {
        certificate_types,
        signature_and_hashes,
        certificate_authorities,
    })
}

pub fn encode_certificate_request(
    req: &CertificateRequest,
    has_signature_and_hash: bool,
) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(req.certificate_types.len() as u8);
    body.extend_from_slice(&req.certificate_types);
    if has_signature_and_hash {
        body.extend_from_slice(&((2 * req.signature_and_hashes.len()) as u16).to_be_bytes());
        for pair in &req.signature_and_hashes {
            body.push(pair.hash.0);
            body.push(pair.signature.0);
        }
    }
    let cas_len: usize = req.certificate_authorities.iter().map(|c| 2 + c.len()).sum();
    body.extend_from_slice(&(cas_len as u16).to_be_bytes());
    for ca in &req.certificate_authorities {
        body.extend_from_slice(&(ca.len() as u16).to_be_bytes());
        body.extend_from_slice(ca);
    }
    wrap_handshake(HandshakeType::CertificateRequest, &body)
}

// ---------------------------------------------------------------------------
// ServerHelloDone / Finished / CertificateVerify / NextProtocol
// ---------------------------------------------------------------------------

pub fn encode_server_hello_done() -> Vec<u8> {
    wrap_handshake(HandshakeType::ServerHelloDone, &[])
}

/// Encode a Finished message (12-byte verify_data for all covered versions).
pub fn encode_finished(verify_data: &[u8]) -> Vec<u8> {
    wrap_handshake(HandshakeType::Finished, verify_data)
}

/// Encode a CertificateVerify. The signature algorithm pair is present only
/// at TLS 1.2.
pub fn encode_certificate_verify(
    signature_and_hash: Option<SignatureAndHash>,
    signature: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + signature.len());
    if let Some(pair) = signature_and_hash {
        body.push(pair.hash.0);
        body.push(pair.signature.0);
    }
    body.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    body.extend_from_slice(signature);
    wrap_handshake(HandshakeType::CertificateVerify, &body)
}

/// Encode a NextProtocol message (draft-agl-tls-nextprotoneg §3): the
/// selected protocol plus zero padding to a 32-byte boundary.
pub fn encode_next_protocol(protocol: &str) -> Vec<u8> {
    let padding_len = 32 - (protocol.len() + 2) % 32;
    let mut body = Vec::with_capacity(2 + protocol.len() + padding_len);
    body.push(protocol.len() as u8);
    body.extend_from_slice(protocol.as_bytes());
    body.push(padding_len as u8);
    body.resize(body.len() + padding_len, 0);
    wrap_handshake(HandshakeType::NextProtocol, &body)
}

// ---------------------------------------------------------------------------
// NewSessionTicket
// ---------------------------------------------------------------------------

/// Decode a NewSessionTicket (RFC 5077 §3.3):
/// `lifetime_hint(4) || ticket_length(2) || ticket`.
pub fn parse_new_session_ticket(body: &[u8]) -> Result<(u32, Vec<u8>), TlsError> {
    let err = |msg: &str| TlsError::UnexpectedMessage(format!("NewSessionTicket: {msg}"));
    if body.len() < 6 {
        return Err(err("too short"));
    }
    let lifetime_hint = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
    let len = u16::from_be_bytes([body[4], body[5]]) as usize;
    if body.len() < 6 + len {
        return Err(err("truncated ticket"));
    }
    Ok((lifetime_hint, body[6..6 + len].to_vec()))
}

pub fn encode_new_session_ticket(lifetime_hint: u32, ticket: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(6 + ticket.len());
    body.extend_from_slice(&lifetime_hint.to_be_bytes());
    body.extend_from_slice(&(ticket.len() as u16).to_be_bytes());
    body.extend_from_slice(ticket);
    wrap_handshake(HandshakeType::NewSessionTicket, &body)
}
