//! The client handshake driver.
//!
//! Drives one connection from the first ClientHello byte through the
//! Finished exchange, populating the handshake log as each message crosses
//! the wire. Scanning posture throughout: a server choice this
//! implementation cannot complete a handshake with (unknown suite, say)
//! is recorded as a sticky error and the driver keeps reading as far as the
//! protocol allows, so the certificate chain still lands in the log.

use std::sync::Arc;

use ::log::{debug, trace};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use periscope_types::TlsError;

use super::builder::build_client_hello;
use super::codec::{
    encode_certificate, encode_certificate_verify, encode_finished, encode_next_protocol,
    parse_certificate, parse_certificate_request, parse_certificate_status,
    parse_handshake_header, parse_new_session_ticket, parse_server_hello, CertificateRequest,
    ClientHello, ServerHello, CERT_TYPE_ECDSA_SIGN, CERT_TYPE_RSA_SIGN, STATUS_TYPE_OCSP,
};
use super::key_exchange::{
    generate_client_key_exchange, parse_server_key_exchange, ServerKeyExchangeParams,
    ServerKeyMaterial,
};
use super::signing::{select_signature_and_hash, sign_certificate_verify};
use super::HandshakeType;
use crate::alert::AlertDescription;
use crate::cert_verify::verify_server_certificates;
use crate::config::{ClientCertificate, TlsConfig};
use crate::crypt::key_schedule::{
    compute_verify_data, derive_extended_master_secret, derive_key_block, derive_master_secret,
};
use crate::crypt::transcript::{TranscriptAlg, TranscriptHash};
use crate::crypt::{mutual_cipher_suite, CipherSuiteParams};
use crate::log::{
    CertificateVerifyLog, ClientCertificatesLog, ClientKeyExchangeLog, FinishedLog,
    HandshakeLog, KeyMaterialLog, ServerCertificatesLog, ServerKeyExchangeLog, SessionTicketLog,
};
use crate::record::{ContentType, PendingCipherSpec, RecordTransport};
use crate::session::{ClientSessionState, session_cache_key};
use crate::{CipherSuite, ProtocolVersion};

/// Driver states. The driver runs linearly; the state field tracks where a
/// failure happened for post-mortem inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Start,
    WaitServerHello,
    WaitCertificate,
    WaitCertificateStatus,
    WaitServerKeyExchange,
    WaitCertificateRequest,
    WaitServerHelloDone,
    WaitChangeCipherSpecFull,
    WaitFinishedFull,
    WaitChangeCipherSpecResume,
    WaitFinishedResume,
    Done,
    Aborted,
}

/// Sticky cipher-selection failure. Recorded at ServerHello time and
/// consulted right before any cryptographic work would need the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    NoMutualCipher,
    UnimplementedCipher,
}

impl CipherError {
    fn into_error(self) -> TlsError {
        match self {
            CipherError::NoMutualCipher => TlsError::NoMutualCipher,
            CipherError::UnimplementedCipher => TlsError::UnimplementedCipher,
        }
    }
}

/// Next Protocol Negotiation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedProtocol {
    pub protocol: String,
    /// True when no server protocol matched and the first client
    /// preference was used instead.
    pub fallback: bool,
}

/// What a completed handshake negotiated.
#[derive(Debug)]
pub struct HandshakeSummary {
    pub version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub did_resume: bool,
    pub negotiated_protocol: Option<NegotiatedProtocol>,
    /// DER chain of the peer (presented now, or carried by the resumed
    /// session).
    pub peer_certificates: Vec<Vec<u8>>,
    pub extended_master_secret: bool,
    /// The session usable to resume this connection later, if one was
    /// established.
    pub session: Option<Arc<ClientSessionState>>,
}

/// One handshake's worth of state.
pub struct ClientHandshake<'c> {
    config: &'c TlsConfig,
    log: HandshakeLog,
    state: ClientState,
    transcript: TranscriptHash,
    version: ProtocolVersion,
    hello: ClientHello,
    server_hello: ServerHello,
    suite: Option<&'static CipherSuiteParams>,
    cipher_error: Option<CipherError>,
    pre_master_secret: Vec<u8>,
    master_secret: Vec<u8>,
    extended_master_secret: bool,
    /// Session offered for resumption, from the cache.
    offered_session: Option<Arc<ClientSessionState>>,
    /// Session established during this handshake, if any.
    new_session: Option<Arc<ClientSessionState>>,
    cache_key: String,
    peer_certificates: Vec<Vec<u8>>,
    server_rsa_key: Option<rsa::RsaPublicKey>,
    server_kx_params: Option<ServerKeyExchangeParams>,
    negotiated_protocol: Option<NegotiatedProtocol>,
}

impl Drop for ClientHandshake<'_> {
    fn drop(&mut self) {
        self.pre_master_secret.zeroize();
        self.master_secret.zeroize();
    }
}

impl<'c> ClientHandshake<'c> {
    pub fn new(config: &'c TlsConfig) -> Self {
        Self {
            config,
            log: HandshakeLog::default(),
            state: ClientState::Start,
            transcript: TranscriptHash::new(),
            version: ProtocolVersion::Tls12,
            hello: ClientHello::default(),
            server_hello: ServerHello::default(),
            suite: None,
            cipher_error: None,
            pre_master_secret: Vec::new(),
            master_secret: Vec::new(),
            extended_master_secret: false,
            offered_session: None,
            new_session: None,
            cache_key: String::new(),
            peer_certificates: Vec::new(),
            server_rsa_key: None,
            server_kx_params: None,
            negotiated_protocol: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Run the handshake to completion. The log is returned in both
    /// outcomes; on failure it holds everything observed up to the failing
    /// point.
    pub fn run<T: RecordTransport>(
        mut self,
        transport: &mut T,
    ) -> (HandshakeLog, Result<HandshakeSummary, TlsError>) {
        let result = self.handshake(transport);
        match result {
            Ok(_) => self.state = ClientState::Done,
            Err(_) => self.state = ClientState::Aborted,
        }
        (std::mem::take(&mut self.log), result)
    }

    /// Send the given alert (best effort) and pass the error through.
    fn abort<T: RecordTransport>(
        &mut self,
        transport: &mut T,
        alert: AlertDescription,
        error: TlsError,
    ) -> TlsError {
        let _ = transport.send_alert(alert);
        error
    }

    fn suite(&self) -> Result<&'static CipherSuiteParams, TlsError> {
        self.suite
            .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite selected".into()))
    }

    /// Randoms as fed into the PRF: plain randoms, or each side's random
    /// concatenated with its extended random when that side sent one.
    fn effective_randoms(&self) -> (Vec<u8>, Vec<u8>) {
        let mut client = self.hello.random.clone();
        if let Some(ref ext) = self.hello.extended_random {
            client.extend_from_slice(ext);
        }
        let mut server = self.server_hello.random.clone();
        if let Some(ref ext) = self.server_hello.extended_random {
            server.extend_from_slice(ext);
        }
        (client, server)
    }

    fn handshake<T: RecordTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<HandshakeSummary, TlsError> {
        if self.config.server_name.is_empty() && !self.config.insecure_skip_verify {
            return Err(TlsError::ConfigError(
                "either a server name or insecure_skip_verify must be configured".into(),
            ));
        }

        // Exactly one of the two ClientHello construction paths.
        let hello_bytes = if let Some(ref fingerprint) = self.config.client_fingerprint {
            let bytes = fingerprint.marshal(self.config)?;
            let (_, body, _) = parse_handshake_header(&bytes)?;
            self.hello = ClientHello::parse(body).map_err(|_| {
                TlsError::ConfigError("incompatible custom client fingerprint".into())
            })?;
            trace!("sending fingerprinted ClientHello ({} bytes)", bytes.len());
            bytes
        } else {
            let built = build_client_hello(self.config, &transport.peer_address())?;
            self.hello = built.hello;
            self.offered_session = built.session;
            self.cache_key = built.cache_key;
            built.bytes
        };

        transport.write_record(ContentType::Handshake, &hello_bytes)?;
        self.transcript.update(&hello_bytes);
        self.log.client_hello = Some(self.hello.clone());
        self.state = ClientState::WaitServerHello;

        // --- ServerHello ---
        let msg = transport.read_handshake()?;
        if msg.msg_type != HandshakeType::ServerHello {
            let err = TlsError::UnexpectedMessage(format!(
                "expected ServerHello, got {:?}",
                msg.msg_type
            ));
            return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
        }
        let server_hello = match parse_server_hello(msg.body()) {
            Ok(sh) => sh,
            Err(e) => return Err(self.abort(transport, AlertDescription::UnexpectedMessage, e)),
        };
        self.log.server_hello = Some(server_hello.clone());

        let version = match self.config.mutual_version(server_hello.version) {
            Some(v) => v,
            None => {
                let err = TlsError::UnsupportedVersion(server_hello.version);
                return Err(self.abort(transport, AlertDescription::ProtocolVersion, err));
            }
        };
        self.version = version;
        debug!("negotiated {version}");

        // Suite selection against the configured preferences. A miss is
        // sticky, not immediately fatal.
        let offered = self.config.cipher_suites();
        let chosen = server_hello.cipher_suite;
        self.suite = mutual_cipher_suite(&offered, chosen);
        if self.suite.is_none() {
            let error = if offered.contains(&chosen) {
                CipherError::UnimplementedCipher
            } else {
                CipherError::NoMutualCipher
            };
            debug!("server chose suite {:#06x}: {error:?}", chosen.0);
            self.cipher_error = Some(error);
        }

        self.transcript.select(TranscriptAlg::for_connection(
            version,
            self.suite.map(|s| s.prf_hash),
        ));
        self.transcript.update(&msg.raw);

        if server_hello.compression_method != 0 {
            let err = TlsError::UnexpectedMessage(
                "server selected unsupported compression format".into(),
            );
            return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
        }
        if !self.hello.next_proto_neg && server_hello.next_proto_neg {
            let err =
                TlsError::HandshakeFailed("server advertised unrequested NPN extension".into());
            return Err(self.abort(transport, AlertDescription::HandshakeFailure, err));
        }

        self.extended_master_secret = self.hello.extended_master_secret
            && server_hello.extended_master_secret
            && version >= ProtocolVersion::Tls10;

        let resumed = self.offered_session.is_some()
            && !self.hello.session_id.is_empty()
            && server_hello.session_id == self.hello.session_id;
        self.server_hello = server_hello;

        if resumed {
            debug!("server accepted session resumption");
            if let Some(session) = self.offered_session.clone() {
                self.master_secret = session.master_secret.clone();
                self.extended_master_secret = session.extended_master_secret;
                self.peer_certificates = session.server_certificates.clone();
                self.new_session = Some(session);
            }
            self.resumed_handshake(transport)?;
        } else {
            self.full_handshake(transport)?;
        }

        self.log.key_material = Some(KeyMaterialLog {
            master_secret: self.master_secret.clone(),
            pre_master_secret: self.pre_master_secret.clone(),
        });

        // Store the session only when one was established during this
        // handshake and it is not the one we resumed from.
        if let (Some(cache), Some(session)) =
            (self.config.session_cache.as_ref(), self.new_session.as_ref())
        {
            let is_resumed_session = self
                .offered_session
                .as_ref()
                .is_some_and(|offered| Arc::ptr_eq(offered, session));
            // The fingerprint path never touches the cache.
            let cacheable = !self.config.session_tickets_disabled
                && self.config.client_fingerprint.is_none();
            if cacheable && !is_resumed_session {
                let key = if self.cache_key.is_empty() {
                    session_cache_key(&self.config.server_name, &transport.peer_address())
                } else {
                    self.cache_key.clone()
                };
                cache.put(&key, Arc::clone(session));
                debug!("stored session for {key}");
            }
        }

        Ok(HandshakeSummary {
            version: self.version,
            cipher_suite: self.suite()?.suite,
            did_resume: resumed,
            negotiated_protocol: self.negotiated_protocol.clone(),
            peer_certificates: self.peer_certificates.clone(),
            extended_master_secret: self.extended_master_secret,
            session: self.new_session.clone(),
        })
    }

    /// Abbreviated handshake: the server already proved possession of the
    /// cached master secret by echoing the session id. Its CCS+Finished
    /// come first; the client answers with its own flight.
    fn resumed_handshake<T: RecordTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), TlsError> {
        self.state = ClientState::WaitChangeCipherSpecResume;
        // Key derivation cannot proceed without an implemented suite.
        if let Some(cipher_error) = self.cipher_error {
            let err = cipher_error.into_error();
            return Err(self.abort(transport, AlertDescription::HandshakeFailure, err));
        }

        self.establish_keys(transport)?;
        self.read_session_ticket(transport)?;
        self.read_server_finished(transport, ClientState::WaitFinishedResume)?;
        self.send_client_finished(transport)?;
        Ok(())
    }

    fn full_handshake<T: RecordTransport>(&mut self, transport: &mut T) -> Result<(), TlsError> {
        let mut msg = transport.read_handshake()?;

        // An unknown suite reads as authenticated, so the certificate
        // chain is still captured.
        let is_anon = self.suite.is_some_and(|s| s.anonymous);

        if !is_anon {
            self.state = ClientState::WaitCertificate;
            if msg.msg_type != HandshakeType::Certificate {
                let err = TlsError::UnexpectedMessage(format!(
                    "expected Certificate, got {:?}",
                    msg.msg_type
                ));
                return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
            }
            let chain = match parse_certificate(msg.body()) {
                Ok(chain) if !chain.is_empty() => chain,
                Ok(_) => {
                    let err =
                        TlsError::UnexpectedMessage("server sent an empty certificate chain".into());
                    return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
                }
                Err(e) => {
                    return Err(self.abort(transport, AlertDescription::UnexpectedMessage, e))
                }
            };
            self.transcript.update(&msg.raw);

            let mut cert_log = ServerCertificatesLog {
                raw: chain.clone(),
                ..ServerCertificatesLog::default()
            };
            let (audit, cert_error) = verify_server_certificates(self.config, &chain);
            cert_log.add_audit(&audit);
            self.log.server_certificates = Some(cert_log);
            if let Some(error) = cert_error {
                let alert = match error {
                    TlsError::UnsupportedCertificate(_) => AlertDescription::UnsupportedCertificate,
                    _ => AlertDescription::BadCertificate,
                };
                return Err(self.abort(transport, alert, error));
            }
            self.server_rsa_key = audit
                .certificates
                .first()
                .and_then(|leaf| leaf.rsa_public_key.clone());
            self.peer_certificates = chain;

            if self.server_hello.ocsp_stapling {
                self.state = ClientState::WaitCertificateStatus;
                let status_msg = transport.read_handshake()?;
                if status_msg.msg_type != HandshakeType::CertificateStatus {
                    let err = TlsError::UnexpectedMessage(format!(
                        "expected CertificateStatus, got {:?}",
                        status_msg.msg_type
                    ));
                    return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
                }
                let status = match parse_certificate_status(status_msg.body()) {
                    Ok(status) => status,
                    Err(e) => {
                        return Err(self.abort(transport, AlertDescription::UnexpectedMessage, e))
                    }
                };
                self.transcript.update(&status_msg.raw);
                if status.status_type == STATUS_TYPE_OCSP {
                    if let Some(ref mut log) = self.log.server_certificates {
                        log.ocsp_response = Some(status.response);
                    }
                }
            }

            msg = transport.read_handshake()?;
        }

        // Checkpoint: everything past here needs the suite.
        if let Some(cipher_error) = self.cipher_error {
            let err = cipher_error.into_error();
            return Err(self.abort(transport, AlertDescription::HandshakeFailure, err));
        }
        let suite = *self.suite()?;

        self.state = ClientState::WaitServerKeyExchange;
        if msg.msg_type == HandshakeType::ServerKeyExchange {
            if !suite.kx.requires_server_key_exchange() {
                let err = TlsError::UnexpectedMessage(
                    "ServerKeyExchange not allowed for RSA key exchange".into(),
                );
                return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
            }
            let params = match parse_server_key_exchange(suite.kx, self.version, msg.body()) {
                Ok(params) => params,
                Err(e) => return Err(self.abort(transport, AlertDescription::UnexpectedMessage, e)),
            };
            self.transcript.update(&msg.raw);
            self.log.server_key_exchange = Some(ServerKeyExchangeLog {
                raw: msg.body().to_vec(),
                params: Some(params.clone()),
            });
            self.server_kx_params = Some(params);
            msg = transport.read_handshake()?;
        } else if suite.kx.requires_server_key_exchange() {
            let err = TlsError::UnexpectedMessage(format!(
                "expected ServerKeyExchange, got {:?}",
                msg.msg_type
            ));
            return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
        }

        self.state = ClientState::WaitCertificateRequest;
        let mut certificate_request: Option<CertificateRequest> = None;
        if msg.msg_type == HandshakeType::CertificateRequest {
            let request =
                match parse_certificate_request(msg.body(), self.version == ProtocolVersion::Tls12)
                {
                    Ok(request) => request,
                    Err(e) => {
                        return Err(self.abort(transport, AlertDescription::UnexpectedMessage, e))
                    }
                };
            self.transcript.update(&msg.raw);
            certificate_request = Some(request);
            msg = transport.read_handshake()?;
        }

        self.state = ClientState::WaitServerHelloDone;
        if msg.msg_type != HandshakeType::ServerHelloDone {
            let err = TlsError::UnexpectedMessage(format!(
                "expected ServerHelloDone, got {:?}",
                msg.msg_type
            ));
            return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
        }
        self.transcript.update(&msg.raw);

        // --- client flight ---
        // (1) Certificate, possibly empty, iff requested.
        let mut chain_to_send: Option<&ClientCertificate> = None;
        if let Some(ref request) = certificate_request {
            chain_to_send = select_client_certificate(self.config, request);
            let chain = chain_to_send.map(|c| c.chain.clone()).unwrap_or_default();
            let cert_msg = encode_certificate(&chain);
            self.transcript.update(&cert_msg);
            self.log.client_certificates = Some(ClientCertificatesLog {
                chain: chain.clone(),
            });
            transport.write_record(ContentType::Handshake, &cert_msg)?;
        }

        // (2) ClientKeyExchange via the suite's key agreement.
        let material = match self.server_kx_params {
            Some(ServerKeyExchangeParams::Ecdhe {
                curve,
                ref public_key,
                ..
            }) => ServerKeyMaterial::Ecdhe {
                curve,
                public_key,
            },
            Some(ServerKeyExchangeParams::Dhe {
                ref prime,
                ref generator,
                ref public_key,
                ..
            }) => ServerKeyMaterial::Dhe {
                prime,
                generator,
                public_key,
            },
            None => match self.server_rsa_key {
                Some(ref public_key) => ServerKeyMaterial::Rsa { public_key },
                None => {
                    let err = TlsError::HandshakeFailed(
                        "server certificate carries no RSA key for static key exchange".into(),
                    );
                    return Err(self.abort(transport, AlertDescription::InternalError, err));
                }
            },
        };
        let outcome =
            match generate_client_key_exchange(self.config, material, self.hello.version) {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.abort(transport, AlertDescription::InternalError, e)),
            };
        self.transcript.update(&outcome.message);
        self.log.client_key_exchange = Some(ClientKeyExchangeLog {
            raw: outcome.message[4..].to_vec(),
            params: outcome.params.clone(),
        });
        transport.write_record(ContentType::Handshake, &outcome.message)?;
        self.pre_master_secret = outcome.pre_master_secret;

        // Extended master secret binds the transcript through the
        // ClientKeyExchange, before any CertificateVerify.
        let session_hash = if self.extended_master_secret {
            Some(self.transcript.current_hash()?)
        } else {
            None
        };

        // (3) CertificateVerify over the transcript, iff a non-empty chain
        // was sent.
        if let Some(client_cert) = chain_to_send {
            if !client_cert.chain.is_empty() {
                let requested = certificate_request
                    .as_ref()
                    .map(|r| r.signature_and_hashes.as_slice())
                    .unwrap_or(&[]);
                let signed = select_signature_and_hash(self.version, requested, &client_cert.key)
                    .and_then(|pair| {
                        sign_certificate_verify(self.version, &client_cert.key, &self.transcript)
                            .map(|signature| (pair, signature))
                    });
                let (pair, signature) = match signed {
                    Ok(result) => result,
                    Err(e) => {
                        return Err(self.abort(transport, AlertDescription::InternalError, e))
                    }
                };
                let cv_msg = encode_certificate_verify(pair, &signature);
                self.transcript.update(&cv_msg);
                self.log.certificate_verify = Some(CertificateVerifyLog {
                    signature_and_hash: pair,
                    signature,
                });
                transport.write_record(ContentType::Handshake, &cv_msg)?;
            }
        }

        // (4) Master secret, computed exactly once.
        let (client_random, server_random) = self.effective_randoms();
        self.master_secret = match session_hash {
            Some(hash) => derive_extended_master_secret(
                self.version,
                suite.prf_hash,
                &self.pre_master_secret,
                &hash,
            )?,
            None => derive_master_secret(
                self.version,
                suite.prf_hash,
                &self.pre_master_secret,
                &client_random,
                &server_random,
            )?,
        };

        // (5) Install pending ciphers, send CCS + Finished, then read the
        // server's ticket, CCS and Finished.
        self.establish_keys(transport)?;
        self.state = ClientState::WaitChangeCipherSpecFull;
        self.send_client_finished(transport)?;
        self.read_session_ticket(transport)?;
        self.read_server_finished(transport, ClientState::WaitFinishedFull)?;
        Ok(())
    }

    /// Derive the key block and stage both directions with the record
    /// layer. The actual switch happens at each ChangeCipherSpec.
    fn establish_keys<T: RecordTransport>(&mut self, transport: &mut T) -> Result<(), TlsError> {
        let suite = self.suite()?;
        let (client_random, server_random) = self.effective_randoms();
        let key_block = derive_key_block(
            self.version,
            suite,
            &self.master_secret,
            &client_random,
            &server_random,
        )?;
        transport.prepare_read_cipher(PendingCipherSpec::server_write(
            self.version,
            suite,
            &key_block,
        ))?;
        transport.prepare_write_cipher(PendingCipherSpec::client_write(
            self.version,
            suite,
            &key_block,
        ))?;
        Ok(())
    }

    /// Read NewSessionTicket iff the server advertised ticket support, and
    /// build the candidate session for the cache.
    fn read_session_ticket<T: RecordTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), TlsError> {
        if !self.server_hello.ticket_supported {
            return Ok(());
        }
        let msg = transport.read_handshake()?;
        if msg.msg_type != HandshakeType::NewSessionTicket {
            let err = TlsError::UnexpectedMessage(format!(
                "expected NewSessionTicket, got {:?}",
                msg.msg_type
            ));
            return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
        }
        let (lifetime_hint, ticket) = match parse_new_session_ticket(msg.body()) {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.abort(transport, AlertDescription::UnexpectedMessage, e)),
        };
        self.transcript.update(&msg.raw);

        let suite = self.suite()?;
        self.new_session = Some(Arc::new(ClientSessionState {
            session_ticket: ticket.clone(),
            protocol_version: self.version,
            cipher_suite: suite.suite,
            master_secret: self.master_secret.clone(),
            server_certificates: self.peer_certificates.clone(),
            extended_master_secret: self.extended_master_secret,
            lifetime_hint,
        }));
        self.log.session_ticket = Some(SessionTicketLog {
            lifetime_hint,
            ticket,
        });
        Ok(())
    }

    /// Await the server's ChangeCipherSpec and verify its Finished against
    /// the transcript as it stood before that Finished.
    fn read_server_finished<T: RecordTransport>(
        &mut self,
        transport: &mut T,
        wait_state: ClientState,
    ) -> Result<(), TlsError> {
        transport.read_change_cipher_spec()?;
        self.state = wait_state;

        let msg = transport.read_handshake()?;
        if msg.msg_type != HandshakeType::Finished {
            let err = TlsError::UnexpectedMessage(format!(
                "expected Finished, got {:?}",
                msg.msg_type
            ));
            return Err(self.abort(transport, AlertDescription::UnexpectedMessage, err));
        }

        let suite = self.suite()?;
        let expected = compute_verify_data(
            self.version,
            suite.prf_hash,
            &self.master_secret,
            "server finished",
            &self.transcript.current_hash()?,
        )?;
        let received = msg.body();
        let matches =
            expected.len() == received.len() && bool::from(expected.ct_eq(received));
        if !matches {
            let err = TlsError::HandshakeFailed("server's Finished message was incorrect".into());
            return Err(self.abort(transport, AlertDescription::HandshakeFailure, err));
        }

        self.transcript.update(&msg.raw);
        self.log.server_finished = Some(FinishedLog {
            verify_data: received.to_vec(),
        });
        Ok(())
    }

    /// Send ChangeCipherSpec, the NextProtocol message when NPN was
    /// negotiated, and the client Finished.
    fn send_client_finished<T: RecordTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), TlsError> {
        transport.write_record(ContentType::ChangeCipherSpec, &[1])?;

        if self.server_hello.next_proto_neg && !self.config.next_protos.is_empty() {
            let (protocol, fallback) =
                mutual_protocol(&self.config.next_protos, &self.server_hello.next_protos);
            let msg = encode_next_protocol(&protocol);
            self.transcript.update(&msg);
            transport.write_record(ContentType::Handshake, &msg)?;
            debug!("next protocol: {protocol} (fallback: {fallback})");
            self.negotiated_protocol = Some(NegotiatedProtocol { protocol, fallback });
        }

        let suite = self.suite()?;
        let verify_data = compute_verify_data(
            self.version,
            suite.prf_hash,
            &self.master_secret,
            "client finished",
            &self.transcript.current_hash()?,
        )?;
        let msg = encode_finished(&verify_data);
        self.transcript.update(&msg);
        self.log.client_finished = Some(FinishedLog { verify_data });
        transport.write_record(ContentType::Handshake, &msg)?;
        Ok(())
    }
}

/// Find a configured client chain acceptable to the server's request:
/// matching key type, and issued by one of the requested CAs when the
/// server listed any.
fn select_client_certificate<'a>(
    config: &'a TlsConfig,
    request: &CertificateRequest,
) -> Option<&'a ClientCertificate> {
    let rsa_ok = request.certificate_types.contains(&CERT_TYPE_RSA_SIGN);
    let ecdsa_ok = request.certificate_types.contains(&CERT_TYPE_ECDSA_SIGN);

    for candidate in &config.certificates {
        let key_matches = match candidate.key {
            crate::config::ClientPrivateKey::Rsa(_) => rsa_ok,
            crate::config::ClientPrivateKey::EcdsaP256(_) => ecdsa_ok,
        };
        if !key_matches || candidate.chain.is_empty() {
            continue;
        }
        if request.certificate_authorities.is_empty() {
            return Some(candidate);
        }
        for der in &candidate.chain {
            let Ok(parsed) = config.certificate_decoder.parse_certificate(der) else {
                debug!("skipping unparseable client certificate");
                continue;
            };
            if request
                .certificate_authorities
                .iter()
                .any(|ca| *ca == parsed.raw_issuer)
            {
                return Some(candidate);
            }
        }
    }
    None
}

/// Pick the first server-preferred protocol the client also supports; if
/// none matches, fall back to the client's first preference.
fn mutual_protocol(client_protos: &[String], server_protos: &[String]) -> (String, bool) {
    for server in server_protos {
        for client in client_protos {
            if server == client {
                return (server.clone(), false);
            }
        }
    }
    (client_protos[0].clone(), true)
}
