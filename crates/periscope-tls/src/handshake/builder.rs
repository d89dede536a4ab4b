//! Semantic ClientHello construction.
//!
//! Builds the first flight from the configuration: advertised suites are
//! filtered against the implemented table (unless forced), the session
//! cache is consulted for a resumable candidate, and every extension the
//! configuration asks for is assembled in a fixed order.

use std::sync::Arc;

use ::log::debug;
use periscope_types::{TlsError, HEARTBEAT_MODE_PEER_ALLOWED, POINT_FORMAT_UNCOMPRESSED};

use super::codec::ClientHello;
use crate::config::TlsConfig;
use crate::crypt::suite_params;
use crate::session::{session_cache_key, ClientSessionState};
use crate::ProtocolVersion;

/// A built first flight, plus the session offered for resumption.
pub struct BuiltClientHello {
    pub hello: ClientHello,
    /// Exact bytes written to the wire.
    pub bytes: Vec<u8>,
    /// Cached session whose ticket rides in the hello, if any.
    pub session: Option<Arc<ClientSessionState>>,
    /// Cache key the session came from (and a new one would be stored
    /// under). Empty when no cache is in play.
    pub cache_key: String,
}

pub fn build_client_hello(
    config: &TlsConfig,
    peer_address: &str,
) -> Result<BuiltClientHello, TlsError> {
    let max_version = config.max_version;

    let mut hello = ClientHello {
        version: max_version.as_u16(),
        random: vec![0u8; 32],
        compression_methods: vec![0],
        ocsp_stapling: true,
        secure_renegotiation: true,
        supported_curves: config.curve_preferences(),
        supported_points: vec![POINT_FORMAT_UNCOMPRESSED],
        next_proto_neg: !config.next_protos.is_empty(),
        extended_master_secret: config.extended_master_secret
            && max_version >= ProtocolVersion::Tls10,
        ..ClientHello::default()
    };
    if !config.server_name.is_empty() {
        hello.server_names = vec![config.server_name.clone()];
    }
    if config.force_session_ticket_ext {
        hello.ticket_supported = true;
    }
    if config.signed_certificate_timestamp_ext {
        hello.sct_enabled = true;
    }
    // Heartbeat and extended random are never offered together.
    if config.heartbeat_enabled && !config.extended_random {
        hello.heartbeat_enabled = true;
        hello.heartbeat_mode = HEARTBEAT_MODE_PEER_ALLOWED;
    }

    let possible = config.cipher_suites();
    hello.cipher_suites = if config.force_suites {
        possible
    } else {
        possible
            .into_iter()
            .filter(|suite| match suite_params(*suite) {
                // TLS 1.2-only suites are withheld below TLS 1.2.
                Some(params) => {
                    max_version >= ProtocolVersion::Tls12 || !params.tls12_only
                }
                None => false,
            })
            .collect()
    };

    if config.client_random.len() == 32 {
        hello.random = config.client_random.clone();
    } else {
        config.fill_random(&mut hello.random)?;
    }

    if config.extended_random {
        let mut extended = vec![0u8; 32];
        config.fill_random(&mut extended)?;
        hello.extended_random = Some(extended);
    }

    if max_version >= ProtocolVersion::Tls12 {
        hello.signature_and_hashes = config.signature_and_hashes_for_client();
    }

    let cache = if config.session_tickets_disabled {
        None
    } else {
        config.session_cache.as_ref()
    };

    let mut session = None;
    let mut cache_key = String::new();
    if let Some(cache) = cache {
        hello.ticket_supported = true;
        cache_key = session_cache_key(&config.server_name, peer_address);

        if let Some(candidate) = cache.get(&cache_key) {
            // The cached parameters must still fit this configuration.
            let suite_ok = hello.cipher_suites.contains(&candidate.cipher_suite);
            let version_ok = candidate.protocol_version >= config.min_version
                && candidate.protocol_version <= config.max_version;
            if suite_ok && version_ok {
                session = Some(candidate);
            } else {
                debug!("cached session for {cache_key} no longer fits configuration");
            }
        }
    }

    if let Some(ref candidate) = session {
        hello.session_ticket = candidate.session_ticket.clone();
        // A random session id lets the server signal resumption
        // acceptance by echoing it (RFC 5077 §3.4).
        let mut session_id = vec![0u8; 16];
        config.fill_random(&mut session_id)?;
        hello.session_id = session_id;
        debug!("offering cached session for {cache_key}");
    }

    let bytes = hello.marshal();
    Ok(BuiltClientHello {
        hello,
        bytes,
        session,
        cache_key,
    })
}
