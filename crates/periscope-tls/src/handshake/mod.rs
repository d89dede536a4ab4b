//! Client-side handshake state machine and message codecs.

pub mod builder;
pub mod client;
#[cfg(test)]
mod client_tests;
pub mod codec;
pub mod extensions_codec;
pub mod fingerprint;
pub mod key_exchange;
pub mod signing;

/// Handshake message types (RFC 5246 §7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    CertificateStatus = 22,
    /// Next Protocol Negotiation's NextProtocol message (draft-agl-tls-nextprotoneg).
    NextProtocol = 67,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(HandshakeType::HelloRequest),
            1 => Ok(HandshakeType::ClientHello),
            2 => Ok(HandshakeType::ServerHello),
            4 => Ok(HandshakeType::NewSessionTicket),
            11 => Ok(HandshakeType::Certificate),
            12 => Ok(HandshakeType::ServerKeyExchange),
            13 => Ok(HandshakeType::CertificateRequest),
            14 => Ok(HandshakeType::ServerHelloDone),
            15 => Ok(HandshakeType::CertificateVerify),
            16 => Ok(HandshakeType::ClientKeyExchange),
            20 => Ok(HandshakeType::Finished),
            22 => Ok(HandshakeType::CertificateStatus),
            67 => Ok(HandshakeType::NextProtocol),
            _ => Err(v),
        }
    }
}

/// One handshake message as read off the wire, header included.
#[derive(Debug, Clone)]
pub struct HandshakeMessage {
    pub msg_type: HandshakeType,
    /// Full message bytes: type(1) || length(3) || body. The transcript
    /// absorbs exactly these bytes.
    pub raw: Vec<u8>,
}

impl HandshakeMessage {
    /// Message body after the 4-byte header.
    pub fn body(&self) -> &[u8] {
        &self.raw[4..]
    }
}
