//! End-to-end driver tests against a scripted in-memory server.
//!
//! The fake server speaks just enough TLS to exercise every driver path:
//! anonymous DHE and static RSA key exchange, ticket issuance, session
//! resumption (accepted and rejected), extended master secret, NPN, and a
//! tampering mode for Finished verification. It shares the crate's own
//! PRF and transcript primitives, mirroring what a real peer would
//! compute.

use std::collections::VecDeque;
use std::sync::Arc;

use num_bigint::BigUint;

use periscope_types::TlsError;

use super::client::ClientHandshake;
use super::codec::{
    encode_certificate, encode_finished, encode_new_session_ticket, encode_server_hello,
    encode_server_hello_done, parse_handshake_header, wrap_handshake, ClientHello, ServerHello,
};
use super::{HandshakeMessage, HandshakeType};
use crate::alert::AlertDescription;
use crate::cert_verify::{
    CertificateChain, CertificateDecoder, CertificateKeyType, CertificateValidation,
    CertificateVerifier, ParsedCertificate, ValidationOptions,
};
use crate::config::TlsConfig;
use crate::crypt::key_schedule::{
    compute_verify_data, derive_extended_master_secret, derive_master_secret,
};
use crate::crypt::transcript::{TranscriptAlg, TranscriptHash};
use crate::crypt::{suite_params, KeyExchangeKind, PrfHash};
use crate::record::{ContentType, PendingCipherSpec, RecordTransport};
use crate::session::{ClientSessionCache, InMemorySessionCache};
use crate::{CipherSuite, ProtocolVersion};

const ANON_SUITE: CipherSuite = CipherSuite::TLS_DH_ANON_WITH_AES_128_CBC_SHA;
const SERVER_RANDOM: [u8; 32] = [0x5C; 32];

// A 512-bit MODP prime (RFC 2409 Oakley group 1) for the anonymous DHE
// exchange.
fn oakley_prime() -> Vec<u8> {
    let hex = "ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024e088a67cc74\
               020bbea63b139b22514a08798e3404ddef9519b3cd3a431b302b0a6df25f1437\
               4fe1356d6d51c245e485b576625e7ec6f44c42e9a63a3620ffffffffffffffff";
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

enum Outgoing {
    Handshake(Vec<u8>),
    ChangeCipherSpec,
}

/// Scripted peer implementing the record-transport seam.
struct FakeServer {
    // behavior knobs
    version: u16,
    suite: CipherSuite,
    cert_chain: Vec<Vec<u8>>,
    issue_ticket: Option<Vec<u8>>,
    /// Master secret of the session to resume; echoing the client's
    /// session id signals acceptance.
    accept_resumption: Option<Vec<u8>>,
    ems: bool,
    npn_protos: Vec<String>,
    tamper_finished: bool,
    rsa_key: Option<rsa::RsaPrivateKey>,

    // protocol state
    queue: VecDeque<Outgoing>,
    transcript: TranscriptHash,
    client_random: Vec<u8>,
    master_secret: Vec<u8>,
    ems_negotiated: bool,
    ticket_supported: bool,
    resumed: bool,
    dh_exponent: BigUint,

    // observations for assertions
    written: Vec<(ContentType, Vec<u8>)>,
    alerts: Vec<AlertDescription>,
    read_cipher: Option<PendingCipherSpec>,
    write_cipher: Option<PendingCipherSpec>,
    client_finished_ok: Option<bool>,
}

impl FakeServer {
    fn new(suite: CipherSuite) -> Self {
        Self {
            version: 0x0303,
            suite,
            cert_chain: Vec::new(),
            issue_ticket: None,
            accept_resumption: None,
            ems: false,
            npn_protos: Vec::new(),
            tamper_finished: false,
            rsa_key: None,
            queue: VecDeque::new(),
            transcript: TranscriptHash::new(),
            client_random: Vec::new(),
            master_secret: Vec::new(),
            ems_negotiated: false,
            ticket_supported: false,
            resumed: false,
            dh_exponent: BigUint::from_bytes_be(&[0x33; 32]),
            written: Vec::new(),
            alerts: Vec::new(),
            read_cipher: None,
            write_cipher: None,
            client_finished_ok: None,
        }
    }

    fn version_enum(&self) -> Option<ProtocolVersion> {
        ProtocolVersion::from_u16(self.version)
    }

    fn prf_hash(&self) -> PrfHash {
        suite_params(self.suite)
            .map(|p| p.prf_hash)
            .unwrap_or(PrfHash::Sha256)
    }

    fn verify_data(&self, label: &str) -> Vec<u8> {
        compute_verify_data(
            self.version_enum().unwrap(),
            self.prf_hash(),
            &self.master_secret,
            label,
            &self.transcript.current_hash().unwrap(),
        )
        .unwrap()
    }

    fn queue_handshake(&mut self, bytes: Vec<u8>) {
        self.transcript.update(&bytes);
        self.queue.push_back(Outgoing::Handshake(bytes));
    }

    fn queue_server_finished(&mut self) {
        self.queue.push_back(Outgoing::ChangeCipherSpec);
        let verify_data = self.verify_data("server finished");
        let mut finished = encode_finished(&verify_data);
        if self.tamper_finished {
            finished[4] ^= 0x01;
        }
        self.transcript.update(&finished);
        self.queue.push_back(Outgoing::Handshake(finished));
    }

    fn on_client_hello(&mut self, raw: &[u8]) {
        let (_, body, _) = parse_handshake_header(raw).unwrap();
        let hello = ClientHello::parse(body).unwrap();

        let Some(version) = self.version_enum() else {
            // Bogus version under test: the client aborts right after the
            // ServerHello, so skip all key-schedule work.
            let sh = ServerHello {
                version: self.version,
                random: SERVER_RANDOM.to_vec(),
                session_id: vec![0xE0; 8],
                cipher_suite: self.suite,
                compression_method: 0,
                ..ServerHello::default()
            };
            self.queue.push_back(Outgoing::Handshake(encode_server_hello(&sh)));
            return;
        };

        self.transcript.update(raw);
        self.transcript
            .select(TranscriptAlg::for_connection(version, Some(self.prf_hash())));

        self.client_random = hello.random.clone();
        self.ems_negotiated = self.ems && hello.extended_master_secret;
        self.ticket_supported = self.issue_ticket.is_some() && hello.ticket_supported;
        self.resumed = self.accept_resumption.is_some()
            && !hello.session_id.is_empty()
            && !hello.session_ticket.is_empty();

        let sh = ServerHello {
            version: self.version,
            random: SERVER_RANDOM.to_vec(),
            session_id: if self.resumed {
                hello.session_id.clone()
            } else {
                vec![0xE0; 8]
            },
            cipher_suite: self.suite,
            compression_method: 0,
            next_proto_neg: !self.npn_protos.is_empty() && hello.next_proto_neg,
            next_protos: self.npn_protos.clone(),
            ticket_supported: self.ticket_supported,
            extended_master_secret: self.ems_negotiated,
            ..ServerHello::default()
        };
        self.queue_handshake(encode_server_hello(&sh));

        if self.resumed {
            self.master_secret = self.accept_resumption.clone().unwrap();
            if self.ticket_supported {
                let ticket = self.issue_ticket.clone().unwrap();
                self.queue_handshake(encode_new_session_ticket(3600, &ticket));
            }
            self.queue_server_finished();
            return;
        }

        if !self.cert_chain.is_empty() {
            let chain = self.cert_chain.clone();
            self.queue_handshake(encode_certificate(&chain));
        }

        match suite_params(self.suite).map(|p| p.kx) {
            Some(KeyExchangeKind::DheAnon) => {
                let p = BigUint::from_bytes_be(&oakley_prime());
                let g = BigUint::from(2u8);
                let ys = g.modpow(&self.dh_exponent, &p);
                let mut body = Vec::new();
                for vector in [oakley_prime(), vec![2], ys.to_bytes_be()] {
                    body.extend_from_slice(&(vector.len() as u16).to_be_bytes());
                    body.extend_from_slice(&vector);
                }
                self.queue_handshake(wrap_handshake(HandshakeType::ServerKeyExchange, &body));
            }
            Some(KeyExchangeKind::Rsa) | None => {}
            other => panic!("fake server has no key exchange for {other:?}"),
        }

        self.queue_handshake(encode_server_hello_done());
    }

    fn on_client_key_exchange(&mut self, raw: &[u8]) {
        self.transcript.update(raw);
        let body = &raw[4..];

        let pre_master = match suite_params(self.suite).map(|p| p.kx) {
            Some(KeyExchangeKind::DheAnon) => {
                let len = u16::from_be_bytes([body[0], body[1]]) as usize;
                let yc = BigUint::from_bytes_be(&body[2..2 + len]);
                let p = BigUint::from_bytes_be(&oakley_prime());
                yc.modpow(&self.dh_exponent, &p).to_bytes_be()
            }
            Some(KeyExchangeKind::Rsa) => {
                let len = u16::from_be_bytes([body[0], body[1]]) as usize;
                self.rsa_key
                    .as_ref()
                    .expect("rsa key")
                    .decrypt(rsa::Pkcs1v15Encrypt, &body[2..2 + len])
                    .expect("pre-master decrypt")
            }
            other => panic!("unexpected ClientKeyExchange for {other:?}"),
        };

        let version = self.version_enum().unwrap();
        self.master_secret = if self.ems_negotiated {
            let session_hash = self.transcript.current_hash().unwrap();
            derive_extended_master_secret(version, self.prf_hash(), &pre_master, &session_hash)
                .unwrap()
        } else {
            derive_master_secret(
                version,
                self.prf_hash(),
                &pre_master,
                &self.client_random,
                &SERVER_RANDOM,
            )
            .unwrap()
        };
    }

    fn on_client_finished(&mut self, raw: &[u8]) {
        let expected = self.verify_data("client finished");
        self.client_finished_ok = Some(expected.as_slice() == &raw[4..]);
        self.transcript.update(raw);

        if !self.resumed {
            if self.ticket_supported {
                let ticket = self.issue_ticket.clone().unwrap();
                self.queue_handshake(encode_new_session_ticket(3600, &ticket));
            }
            self.queue_server_finished();
        }
    }
}

impl RecordTransport for FakeServer {
    fn read_handshake(&mut self) -> Result<HandshakeMessage, TlsError> {
        match self.queue.pop_front() {
            Some(Outgoing::Handshake(raw)) => {
                let msg_type = HandshakeType::from_u8(raw[0])
                    .map_err(|v| TlsError::RecordError(format!("bad queued type {v}")))?;
                Ok(HandshakeMessage { msg_type, raw })
            }
            Some(Outgoing::ChangeCipherSpec) => Err(TlsError::RecordError(
                "client read a handshake message where CCS was pending".into(),
            )),
            None => Err(TlsError::RecordError("no server message queued".into())),
        }
    }

    fn read_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        match self.queue.pop_front() {
            Some(Outgoing::ChangeCipherSpec) => Ok(()),
            _ => Err(TlsError::RecordError("expected pending CCS".into())),
        }
    }

    fn write_record(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<(), TlsError> {
        self.written.push((content_type, payload.to_vec()));
        if content_type == ContentType::Handshake {
            match HandshakeType::from_u8(payload[0]) {
                Ok(HandshakeType::ClientHello) => self.on_client_hello(payload),
                Ok(HandshakeType::ClientKeyExchange) => self.on_client_key_exchange(payload),
                Ok(HandshakeType::Finished) => self.on_client_finished(payload),
                // Client Certificate, CertificateVerify, NextProtocol just
                // enter the transcript.
                Ok(_) => self.transcript.update(payload),
                Err(_) => {}
            }
        }
        Ok(())
    }

    fn send_alert(&mut self, description: AlertDescription) -> Result<(), TlsError> {
        self.alerts.push(description);
        Ok(())
    }

    fn prepare_read_cipher(&mut self, spec: PendingCipherSpec) -> Result<(), TlsError> {
        self.read_cipher = Some(spec);
        Ok(())
    }

    fn prepare_write_cipher(&mut self, spec: PendingCipherSpec) -> Result<(), TlsError> {
        self.write_cipher = Some(spec);
        Ok(())
    }

    fn peer_address(&self) -> String {
        "192.0.2.1:443".into()
    }
}

// ---------------------------------------------------------------------------
// Certificate stubs
// ---------------------------------------------------------------------------

/// Decoder for fabricated DER blobs: `[1, ..]` is an RSA leaf carrying the
/// test key, `[2, ..]` an ECDSA leaf.
struct StubDecoder {
    rsa_public_key: Option<rsa::RsaPublicKey>,
}

impl CertificateDecoder for StubDecoder {
    fn parse_certificate(&self, der: &[u8]) -> Result<ParsedCertificate, TlsError> {
        let key_type = match der.first() {
            Some(1) => CertificateKeyType::Rsa,
            Some(2) => CertificateKeyType::Ecdsa,
            _ => return Err(TlsError::CertVerifyFailed("stub: bad der".into())),
        };
        Ok(ParsedCertificate {
            der: der.to_vec(),
            subject: "CN=example.test".into(),
            issuer: "CN=scan-ca".into(),
            raw_issuer: vec![0x30, 0x00],
            key_type: key_type.clone(),
            rsa_public_key: match key_type {
                CertificateKeyType::Rsa => self.rsa_public_key.clone(),
                _ => None,
            },
        })
    }
}

struct TrustingVerifier;

impl CertificateVerifier for TrustingVerifier {
    fn validate_with_detail(
        &self,
        _leaf: &ParsedCertificate,
        opts: &ValidationOptions<'_>,
    ) -> (Vec<CertificateChain>, CertificateValidation, Option<TlsError>) {
        let chain: CertificateChain = opts
            .intermediates
            .iter()
            .map(|c| c.der.clone())
            .collect();
        (
            vec![chain],
            CertificateValidation {
                browser_trusted: true,
                browser_error: None,
                matches_domain: !opts.dns_name.is_empty(),
            },
            None,
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn anon_config() -> TlsConfig {
    TlsConfig::builder()
        .insecure_skip_verify(true)
        .cipher_suites(&[ANON_SUITE])
        .build()
}

fn written_handshake_types(server: &FakeServer) -> Vec<u8> {
    server
        .written
        .iter()
        .filter(|(ct, _)| *ct == ContentType::Handshake)
        .map(|(_, payload)| payload[0])
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_full_handshake_anonymous_dhe() {
    let config = anon_config();
    let mut server = FakeServer::new(ANON_SUITE);

    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    let summary = result.expect("handshake should complete");

    assert_eq!(summary.version, ProtocolVersion::Tls12);
    assert_eq!(summary.cipher_suite, ANON_SUITE);
    assert!(!summary.did_resume);
    assert_eq!(server.client_finished_ok, Some(true));

    // Both sides agree on the master secret.
    let key_material = log.key_material.expect("key material logged");
    assert_eq!(key_material.master_secret, server.master_secret);
    assert_eq!(key_material.master_secret.len(), 48);
    assert!(!key_material.pre_master_secret.is_empty());

    // Wire-order log for an anonymous full handshake.
    assert!(log.client_hello.is_some());
    assert!(log.server_hello.is_some());
    assert!(log.server_certificates.is_none());
    assert!(log.server_key_exchange.is_some());
    assert!(log.client_key_exchange.is_some());
    assert!(log.client_finished.is_some());
    assert!(log.server_finished.is_some());

    // Pending cipher specs were staged for both directions with the
    // suite's key geometry (AES-128-CBC-SHA: 20/16/16).
    let write = server.write_cipher.as_ref().expect("write cipher staged");
    assert_eq!(write.mac_key.len(), 20);
    assert_eq!(write.key.len(), 16);
    assert_eq!(write.iv.len(), 16);
    let read = server.read_cipher.as_ref().expect("read cipher staged");
    assert_ne!(read.key, write.key);

    assert!(server.alerts.is_empty());
}

#[test]
fn test_full_handshake_static_rsa_with_certificates() {
    let rsa_key = rsa::RsaPrivateKey::new(&mut TestRng, 1024).expect("generate key");
    let decoder = StubDecoder {
        rsa_public_key: Some(rsa_key.to_public_key()),
    };

    let config = TlsConfig::builder()
        .server_name("example.test")
        .cipher_suites(&[CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256])
        .certificate_decoder(Arc::new(decoder))
        .certificate_verifier(Arc::new(TrustingVerifier))
        .build();

    let mut server = FakeServer::new(CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256);
    server.cert_chain = vec![vec![1, 0xAA, 0xBB], vec![1, 0xCC, 0xDD]];
    server.rsa_key = Some(rsa_key);

    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    let summary = result.expect("handshake should complete");

    assert!(!summary.did_resume);
    assert_eq!(
        summary.cipher_suite,
        CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256
    );
    assert_eq!(summary.peer_certificates.len(), 2);
    assert_eq!(server.client_finished_ok, Some(true));

    let certs = log.server_certificates.expect("certificates logged");
    assert_eq!(certs.raw.len(), 2);
    assert_eq!(certs.parsed.len(), 2);
    assert!(!certs.chains.is_empty(), "verified chains recorded");
    assert!(certs.validation.unwrap().browser_trusted);

    // Static RSA: no ServerKeyExchange, encrypted pre-master in the CKE.
    assert!(log.server_key_exchange.is_none());
    let cke = log.client_key_exchange.expect("CKE logged");
    match cke.params {
        crate::handshake::key_exchange::ClientKeyExchangeParams::Rsa { .. } => {}
        other => panic!("expected RSA params, got {other:?}"),
    }

    // Both sides agree on the master secret (server decrypted the CKE).
    assert_eq!(
        log.key_material.unwrap().master_secret,
        server.master_secret
    );
}

#[test]
fn test_unimplemented_server_suite_still_captures_certificates() {
    // The server picks a suite we never offered; the scan must still
    // record the chain before failing.
    let config = TlsConfig::builder()
        .server_name("example.test")
        .insecure_skip_verify(true)
        .certificate_decoder(Arc::new(StubDecoder {
            rsa_public_key: None,
        }))
        .build();

    let mut server = FakeServer::new(CipherSuite(0x00FF));
    server.cert_chain = vec![vec![1, 0xAA], vec![1, 0xBB]];

    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    let error = result.expect_err("handshake cannot complete");
    assert!(matches!(error, TlsError::NoMutualCipher));

    // Certificates were captured before the sticky error fired.
    let certs = log.server_certificates.expect("chain captured");
    assert_eq!(certs.raw.len(), 2);
    // No key derivation happened.
    assert!(log.key_material.is_none());
    assert!(log.client_key_exchange.is_none());

    assert_eq!(server.alerts, vec![AlertDescription::HandshakeFailure]);
}

#[test]
fn test_forced_unknown_suite_fails_before_key_derivation() {
    // With force_suites the unknown code goes on the wire; if the server
    // picks it, the handshake still cannot complete.
    let config = TlsConfig::builder()
        .server_name("example.test")
        .insecure_skip_verify(true)
        .cipher_suites(&[CipherSuite(0x00FF)])
        .force_suites(true)
        .certificate_decoder(Arc::new(StubDecoder {
            rsa_public_key: None,
        }))
        .build();

    let mut server = FakeServer::new(CipherSuite(0x00FF));
    server.cert_chain = vec![vec![1, 0xAA]];

    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    let error = result.expect_err("unknown suite cannot complete");
    assert!(matches!(error, TlsError::UnimplementedCipher));
    assert!(log.key_material.is_none());

    // The hello really advertised the unknown code.
    let hello = log.client_hello.unwrap();
    assert_eq!(hello.cipher_suites, vec![CipherSuite(0x00FF)]);
    assert_eq!(server.alerts, vec![AlertDescription::HandshakeFailure]);
}

#[test]
fn test_resumption_happy_path() {
    let cache: Arc<InMemorySessionCache> = Arc::new(InMemorySessionCache::default());

    // First connection: full handshake, server issues a ticket.
    let config = TlsConfig::builder()
        .server_name("a.b")
        .insecure_skip_verify(true)
        .cipher_suites(&[ANON_SUITE])
        .session_cache(cache.clone())
        .build();

    let mut first_server = FakeServer::new(ANON_SUITE);
    first_server.issue_ticket = Some(vec![0x11; 24]);
    let (_, result) = ClientHandshake::new(&config).run(&mut first_server);
    result.expect("first handshake");

    let cached = cache.get("a.b").expect("session cached after first handshake");
    assert_eq!(cached.cipher_suite, ANON_SUITE);
    assert_eq!(cached.master_secret.len(), 48);

    // Second connection: server accepts the ticket by echoing the session
    // id; abbreviated flight only.
    let mut second_server = FakeServer::new(ANON_SUITE);
    second_server.accept_resumption = Some(cached.master_secret.clone());

    let (log, result) = ClientHandshake::new(&config).run(&mut second_server);
    let summary = result.expect("resumed handshake");

    assert!(summary.did_resume);
    assert_eq!(second_server.client_finished_ok, Some(true));
    // No certificate or key exchange on the abbreviated path.
    assert!(log.server_certificates.is_none());
    assert!(log.server_key_exchange.is_none());
    assert!(log.client_key_exchange.is_none());
    // Client flight is CCS + Finished only after the hello.
    assert_eq!(written_handshake_types(&second_server), vec![1, 20]);
    assert!(second_server
        .written
        .iter()
        .any(|(ct, _)| *ct == ContentType::ChangeCipherSpec));
    // Resumed master equals the cached one.
    assert_eq!(log.key_material.unwrap().master_secret, cached.master_secret);
}

#[test]
fn test_resumption_rejected_falls_back_to_full_handshake() {
    let cache: Arc<InMemorySessionCache> = Arc::new(InMemorySessionCache::default());
    let config = TlsConfig::builder()
        .server_name("a.b")
        .insecure_skip_verify(true)
        .cipher_suites(&[ANON_SUITE])
        .session_cache(cache.clone())
        .build();

    let mut first_server = FakeServer::new(ANON_SUITE);
    first_server.issue_ticket = Some(vec![0x11; 24]);
    ClientHandshake::new(&config)
        .run(&mut first_server)
        .1
        .expect("first handshake");
    let first_master = cache.get("a.b").unwrap().master_secret.clone();

    // Second server ignores the ticket (fresh session id) and issues a
    // new one.
    let mut second_server = FakeServer::new(ANON_SUITE);
    second_server.issue_ticket = Some(vec![0x22; 24]);

    let (log, result) = ClientHandshake::new(&config).run(&mut second_server);
    let summary = result.expect("full handshake after rejection");

    assert!(!summary.did_resume);
    // Full flight ran.
    assert!(log.server_key_exchange.is_some());
    assert!(log.client_key_exchange.is_some());
    // The cache now holds the new session.
    let cached = cache.get("a.b").unwrap();
    assert_eq!(cached.session_ticket, vec![0x22; 24]);
    assert_ne!(cached.master_secret, first_master);
}

#[test]
fn test_tampered_server_finished_fails_closed() {
    let config = anon_config();
    let mut server = FakeServer::new(ANON_SUITE);
    server.tamper_finished = true;

    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    let error = result.expect_err("tampered Finished must fail");
    match error {
        TlsError::HandshakeFailed(msg) => {
            assert_eq!(msg, "server's Finished message was incorrect")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.alerts, vec![AlertDescription::HandshakeFailure]);
    // The client's own Finished went out before the mismatch was seen.
    assert!(log.client_finished.is_some());
    assert!(log.server_finished.is_none());
}

#[test]
fn test_fingerprint_passthrough() {
    use crate::handshake::extensions_codec::ClientExtension;
    use crate::handshake::fingerprint::ClientHelloFingerprint;

    let fingerprint = ClientHelloFingerprint {
        handshake_version: 0x0303,
        client_random: vec![0x42; 32],
        session_id: vec![],
        cipher_suites: vec![ANON_SUITE],
        compression_methods: vec![0],
        extensions: vec![
            ClientExtension::Sni {
                domains: vec!["mimic.example".into()],
            },
            ClientExtension::Raw {
                extension_type: 0x3A3A,
                data: vec![0x00],
            },
        ],
    };

    let config = TlsConfig::builder()
        .insecure_skip_verify(true)
        .cipher_suites(&[ANON_SUITE])
        .client_fingerprint(fingerprint.clone())
        .build();

    let mut server = FakeServer::new(ANON_SUITE);
    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    result.expect("fingerprinted handshake");

    // The emitted bytes are exactly the fingerprint's bytes.
    let expected = fingerprint.marshal(&config).unwrap();
    assert_eq!(server.written[0].1, expected);

    // The driver reasoned over the re-parsed semantic form.
    let hello = log.client_hello.unwrap();
    assert_eq!(hello.random, vec![0x42; 32]);
    assert_eq!(hello.server_names, vec!["mimic.example".to_string()]);
    assert_eq!(server.client_finished_ok, Some(true));
}

#[test]
fn test_server_version_below_minimum_is_refused() {
    let config = anon_config();
    let mut server = FakeServer::new(ANON_SUITE);
    server.version = 0x0300; // SSL 3.0

    let (_, result) = ClientHandshake::new(&config).run(&mut server);
    let error = result.expect_err("SSL 3.0 must be refused");
    assert!(matches!(error, TlsError::UnsupportedVersion(0x0300)));
    assert_eq!(server.alerts, vec![AlertDescription::ProtocolVersion]);
}

#[test]
fn test_extended_master_secret_negotiation() {
    let config = TlsConfig::builder()
        .insecure_skip_verify(true)
        .cipher_suites(&[ANON_SUITE])
        .extended_master_secret(true)
        .build();

    let mut server = FakeServer::new(ANON_SUITE);
    server.ems = true;

    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    let summary = result.expect("EMS handshake");

    assert!(summary.extended_master_secret);
    assert_eq!(server.client_finished_ok, Some(true));
    // The fake server derived its master via the extended formula, so
    // agreement proves the client did too.
    assert_eq!(log.key_material.unwrap().master_secret, server.master_secret);
}

#[test]
fn test_next_protocol_negotiation() {
    let config = TlsConfig::builder()
        .insecure_skip_verify(true)
        .cipher_suites(&[ANON_SUITE])
        .next_protos(&["h2", "http/1.1"])
        .build();

    let mut server = FakeServer::new(ANON_SUITE);
    server.npn_protos = vec!["http/1.1".into()];

    let (_, result) = ClientHandshake::new(&config).run(&mut server);
    let summary = result.expect("NPN handshake");

    let proto = summary.negotiated_protocol.expect("protocol negotiated");
    assert_eq!(proto.protocol, "http/1.1");
    assert!(!proto.fallback);

    // NextProtocol (67) sits between ClientKeyExchange and Finished.
    assert_eq!(written_handshake_types(&server), vec![1, 16, 67, 20]);
    assert_eq!(server.client_finished_ok, Some(true));
}

#[test]
fn test_next_protocol_fallback_flag() {
    let config = TlsConfig::builder()
        .insecure_skip_verify(true)
        .cipher_suites(&[ANON_SUITE])
        .next_protos(&["spdy/3"])
        .build();

    let mut server = FakeServer::new(ANON_SUITE);
    server.npn_protos = vec!["h2".into()];

    let (_, result) = ClientHandshake::new(&config).run(&mut server);
    let summary = result.expect("NPN handshake");
    let proto = summary.negotiated_protocol.unwrap();
    assert_eq!(proto.protocol, "spdy/3");
    assert!(proto.fallback);
}

#[test]
fn test_tls10_handshake_uses_legacy_prf() {
    let config = anon_config();
    let mut server = FakeServer::new(ANON_SUITE);
    server.version = 0x0301;

    let (log, result) = ClientHandshake::new(&config).run(&mut server);
    let summary = result.expect("TLS 1.0 handshake");

    assert_eq!(summary.version, ProtocolVersion::Tls10);
    // Agreement across the MD5/SHA1 PRF and 36-byte transcript hash.
    assert_eq!(server.client_finished_ok, Some(true));
    assert_eq!(log.key_material.unwrap().master_secret, server.master_secret);
}

#[test]
fn test_missing_server_name_without_skip_verify_is_config_error() {
    let config = TlsConfig::builder().build();
    let mut server = FakeServer::new(ANON_SUITE);

    let (_, result) = ClientHandshake::new(&config).run(&mut server);
    let error = result.expect_err("config must be rejected");
    assert!(matches!(error, TlsError::ConfigError(_)));
    // Failed before any byte hit the wire, and without an alert.
    assert!(server.written.is_empty());
    assert!(server.alerts.is_empty());
}

/// OS-backed CSPRNG bridge for test key generation.
struct TestRng;

impl rand_core::RngCore for TestRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_be_bytes(buf)
    }
    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_be_bytes(buf)
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        getrandom::getrandom(dest).unwrap();
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl rand_core::CryptoRng for TestRng {}
