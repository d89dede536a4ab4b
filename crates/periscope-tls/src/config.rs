//! Scan configuration with builder pattern.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use periscope_types::{CurveId, SignatureAndHash, TlsError, SUPPORTED_SKX_SIGNATURE_ALGORITHMS};

use crate::cert_verify::{CertificateDecoder, CertificateVerifier, X509Decoder};
use crate::crypt::IMPLEMENTED_SUITES;
use crate::handshake::fingerprint::ClientHelloFingerprint;
use crate::session::ClientSessionCache;
use crate::{CipherSuite, ProtocolVersion};

/// Source of cryptographic randomness. Shared across connections, so it
/// must be safe for concurrent use.
pub trait SecureRandom: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), TlsError>;
}

/// Operating-system randomness.
pub struct SystemRandom;

impl SecureRandom for SystemRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), TlsError> {
        getrandom::getrandom(dest).map_err(|e| TlsError::RandomSourceFailed(e.to_string()))
    }
}

/// Clock accessor type; overridable so scans can evaluate certificate
/// validity at a chosen instant.
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// Private key usable for client authentication.
#[derive(Clone)]
pub enum ClientPrivateKey {
    Rsa(rsa::RsaPrivateKey),
    EcdsaP256(p256::ecdsa::SigningKey),
}

impl fmt::Debug for ClientPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientPrivateKey::Rsa(_) => write!(f, "ClientPrivateKey::Rsa(..)"),
            ClientPrivateKey::EcdsaP256(_) => write!(f, "ClientPrivateKey::EcdsaP256(..)"),
        }
    }
}

/// A client certificate chain plus its signing key.
#[derive(Debug, Clone)]
pub struct ClientCertificate {
    /// DER-encoded chain, leaf first.
    pub chain: Vec<Vec<u8>>,
    pub key: ClientPrivateKey,
}

/// Handshake configuration.
///
/// The defaults describe a permissive scanning client: no verifier, every
/// implemented authenticated suite offered, TLS 1.0 through 1.2 accepted.
#[derive(Clone)]
pub struct TlsConfig {
    /// Expected server name; SNI value, certificate DNS name, and session
    /// cache key. May be empty only with `insecure_skip_verify`.
    pub server_name: String,
    /// Record validation results without aborting on failure.
    pub insecure_skip_verify: bool,
    /// Literal ClientHello blueprint. When set, the semantic builder is
    /// bypassed entirely.
    pub client_fingerprint: Option<ClientHelloFingerprint>,
    /// Exact client random; used only when exactly 32 bytes long.
    pub client_random: Vec<u8>,
    pub extended_master_secret: bool,
    pub extended_random: bool,
    pub heartbeat_enabled: bool,
    /// Offer the session ticket extension even without a cache.
    pub force_session_ticket_ext: bool,
    pub signed_certificate_timestamp_ext: bool,
    /// Advertise `cipher_suites` verbatim, implemented or not.
    pub force_suites: bool,
    pub session_tickets_disabled: bool,
    pub session_cache: Option<Arc<dyn ClientSessionCache>>,
    pub client_dsa_enabled: bool,
    /// NPN protocol preferences; non-empty enables the extension.
    pub next_protos: Vec<String>,
    /// Client-auth certificate chains.
    pub certificates: Vec<ClientCertificate>,
    pub certificate_decoder: Arc<dyn CertificateDecoder>,
    pub certificate_verifier: Option<Arc<dyn CertificateVerifier>>,
    pub curve_preferences: Vec<CurveId>,
    pub cipher_suites: Vec<CipherSuite>,
    pub min_version: ProtocolVersion,
    pub max_version: ProtocolVersion,
    pub signature_and_hashes: Vec<SignatureAndHash>,
    pub random: Arc<dyn SecureRandom>,
    pub clock: Option<Clock>,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("server_name", &self.server_name)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("force_suites", &self.force_suites)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("extended_random", &self.extended_random)
            .field("has_fingerprint", &self.client_fingerprint.is_some())
            .field("has_session_cache", &self.session_cache.is_some())
            .finish_non_exhaustive()
    }
}

impl TlsConfig {
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Effective cipher suite preferences: the configured list, or every
    /// implemented authenticated suite in table order.
    pub fn cipher_suites(&self) -> Vec<CipherSuite> {
        if !self.cipher_suites.is_empty() {
            return self.cipher_suites.clone();
        }
        IMPLEMENTED_SUITES
            .iter()
            .filter(|p| !p.anonymous)
            .map(|p| p.suite)
            .collect()
    }

    /// Effective curve preferences.
    pub fn curve_preferences(&self) -> Vec<CurveId> {
        if !self.curve_preferences.is_empty() {
            return self.curve_preferences.clone();
        }
        vec![CurveId::SECP256R1, CurveId::SECP384R1, CurveId::X25519]
    }

    /// Signature/hash pairs advertised in the signature_algorithms
    /// extension when offering TLS 1.2.
    pub fn signature_and_hashes_for_client(&self) -> Vec<SignatureAndHash> {
        if !self.signature_and_hashes.is_empty() {
            return self.signature_and_hashes.clone();
        }
        SUPPORTED_SKX_SIGNATURE_ALGORITHMS.to_vec()
    }

    /// Compute the mutually acceptable version given the server's choice:
    /// anything above `max_version` is clamped down to it, anything below
    /// `min_version` is refused.
    pub fn mutual_version(&self, server_version: u16) -> Option<ProtocolVersion> {
        if server_version < self.min_version.as_u16() {
            return None;
        }
        let clamped = server_version.min(self.max_version.as_u16());
        ProtocolVersion::from_u16(clamped)
    }

    pub fn rand(&self) -> &dyn SecureRandom {
        self.random.as_ref()
    }

    pub fn fill_random(&self, dest: &mut [u8]) -> Result<(), TlsError> {
        self.random.fill(dest)
    }

    pub fn time(&self) -> SystemTime {
        match &self.clock {
            Some(clock) => clock(),
            None => SystemTime::now(),
        }
    }
}

/// Builder for [`TlsConfig`].
pub struct TlsConfigBuilder {
    config: TlsConfig,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            config: TlsConfig {
                server_name: String::new(),
                insecure_skip_verify: false,
                client_fingerprint: None,
                client_random: Vec::new(),
                extended_master_secret: false,
                extended_random: false,
                heartbeat_enabled: false,
                force_session_ticket_ext: false,
                signed_certificate_timestamp_ext: false,
                force_suites: false,
                session_tickets_disabled: false,
                session_cache: None,
                client_dsa_enabled: false,
                next_protos: Vec::new(),
                certificates: Vec::new(),
                certificate_decoder: Arc::new(X509Decoder),
                certificate_verifier: None,
                curve_preferences: Vec::new(),
                cipher_suites: Vec::new(),
                min_version: ProtocolVersion::Tls10,
                max_version: ProtocolVersion::Tls12,
                signature_and_hashes: Vec::new(),
                random: Arc::new(SystemRandom),
                clock: None,
            },
        }
    }
}

impl TlsConfigBuilder {
    pub fn server_name(mut self, name: &str) -> Self {
        self.config.server_name = name.to_string();
        self
    }

    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.config.insecure_skip_verify = skip;
        self
    }

    pub fn client_fingerprint(mut self, fingerprint: ClientHelloFingerprint) -> Self {
        self.config.client_fingerprint = Some(fingerprint);
        self
    }

    pub fn client_random(mut self, random: &[u8]) -> Self {
        self.config.client_random = random.to_vec();
        self
    }

    pub fn extended_master_secret(mut self, enabled: bool) -> Self {
        self.config.extended_master_secret = enabled;
        self
    }

    pub fn extended_random(mut self, enabled: bool) -> Self {
        self.config.extended_random = enabled;
        self
    }

    pub fn heartbeat(mut self, enabled: bool) -> Self {
        self.config.heartbeat_enabled = enabled;
        self
    }

    pub fn force_session_ticket_ext(mut self, enabled: bool) -> Self {
        self.config.force_session_ticket_ext = enabled;
        self
    }

    pub fn signed_certificate_timestamp(mut self, enabled: bool) -> Self {
        self.config.signed_certificate_timestamp_ext = enabled;
        self
    }

    pub fn force_suites(mut self, force: bool) -> Self {
        self.config.force_suites = force;
        self
    }

    pub fn session_tickets_disabled(mut self, disabled: bool) -> Self {
        self.config.session_tickets_disabled = disabled;
        self
    }

    pub fn session_cache(mut self, cache: Arc<dyn ClientSessionCache>) -> Self {
        self.config.session_cache = Some(cache);
        self
    }

    pub fn client_dsa_enabled(mut self, enabled: bool) -> Self {
        self.config.client_dsa_enabled = enabled;
        self
    }

    pub fn next_protos(mut self, protos: &[&str]) -> Self {
        self.config.next_protos = protos.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn certificates(mut self, certificates: Vec<ClientCertificate>) -> Self {
        self.config.certificates = certificates;
        self
    }

    pub fn certificate_decoder(mut self, decoder: Arc<dyn CertificateDecoder>) -> Self {
        self.config.certificate_decoder = decoder;
        self
    }

    pub fn certificate_verifier(mut self, verifier: Arc<dyn CertificateVerifier>) -> Self {
        self.config.certificate_verifier = Some(verifier);
        self
    }

    pub fn curve_preferences(mut self, curves: &[CurveId]) -> Self {
        self.config.curve_preferences = curves.to_vec();
        self
    }

    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.to_vec();
        self
    }

    pub fn min_version(mut self, version: ProtocolVersion) -> Self {
        self.config.min_version = version;
        self
    }

    pub fn max_version(mut self, version: ProtocolVersion) -> Self {
        self.config.max_version = version;
        self
    }

    pub fn signature_and_hashes(mut self, pairs: &[SignatureAndHash]) -> Self {
        self.config.signature_and_hashes = pairs.to_vec();
        self
    }

    pub fn random(mut self, random: Arc<dyn SecureRandom>) -> Self {
        self.config.random = random;
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.config.clock = Some(clock);
        self
    }

    pub fn build(self) -> TlsConfig {
        self.config
    }
}
