/// TLS handshake engine errors.
///
/// Every failure of the handshake entry point surfaces as one of these.
/// Cipher-selection failures (`NoMutualCipher`, `UnimplementedCipher`) are
/// recorded as sticky state first and only surfaced at the point where key
/// derivation would need the missing suite, so a scan still captures the
/// certificate chain.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("record layer error: {0}")]
    RecordError(String),
    #[error("alert received: {0}")]
    AlertReceived(String),
    #[error("server selected unsupported protocol version {0:#06x}")]
    UnsupportedVersion(u16),
    #[error("no cipher suite supported by both client and server")]
    NoMutualCipher,
    #[error("server chose an unimplemented cipher suite")]
    UnimplementedCipher,
    #[error("certificate verification failed: {0}")]
    CertVerifyFailed(String),
    #[error("server certificate contains an unsupported type of public key: {0}")]
    UnsupportedCertificate(String),
    #[error("failed to sign handshake: {0}")]
    SigningFailed(String),
    #[error("short read from random source: {0}")]
    RandomSourceFailed(String),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
