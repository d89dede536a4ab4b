//! Resumable session state and the client session cache.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use zeroize::Zeroize;

use crate::{CipherSuite, ProtocolVersion};

/// State needed to resume an earlier session via its ticket.
#[derive(Debug, Clone)]
pub struct ClientSessionState {
    pub session_ticket: Vec<u8>,
    pub protocol_version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub master_secret: Vec<u8>,
    /// DER-encoded server chain observed when the session was established.
    pub server_certificates: Vec<Vec<u8>>,
    pub extended_master_secret: bool,
    /// Ticket lifetime hint from NewSessionTicket, in seconds.
    pub lifetime_hint: u32,
}

impl Drop for ClientSessionState {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

/// Shared store of resumable sessions, keyed by server identity.
///
/// `get`/`put` must be safe for concurrent use; the handshake driver reads
/// once during ClientHello construction and writes at most once at the end
/// of a handshake. No lock is held across I/O.
pub trait ClientSessionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<ClientSessionState>>;
    fn put(&self, key: &str, session: Arc<ClientSessionState>);
}

/// Cache key: the configured server name when present, else the peer
/// address string.
pub fn session_cache_key(server_name: &str, peer_address: &str) -> String {
    if !server_name.is_empty() {
        server_name.to_string()
    } else {
        peer_address.to_string()
    }
}

struct CacheInner {
    entries: HashMap<String, Arc<ClientSessionState>>,
    order: VecDeque<String>,
}

/// Bounded in-memory session cache. Eviction is oldest-insertion-first;
/// the driver touches a key at most twice per connection so recency
/// tracking buys nothing.
pub struct InMemorySessionCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl InMemorySessionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }
}

impl Default for InMemorySessionCache {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ClientSessionCache for InMemorySessionCache {
    fn get(&self, key: &str) -> Option<Arc<ClientSessionState>> {
        let inner = self.inner.lock().ok()?;
        inner.entries.get(key).cloned()
    }

    fn put(&self, key: &str, session: Arc<ClientSessionState>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.insert(key.to_string(), session).is_none() {
            inner.order.push_back(key.to_string());
            if inner.order.len() > self.capacity {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.entries.remove(&evicted);
                }
            }
        }
    }
}
