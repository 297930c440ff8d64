//! Resumable sessions and the session cache.
//!
//! A TLS 1.2 [`Session`] is keyed by its session ID on the server and by
//! server name on the client. A TLS 1.3 [`Ticket`] is keyed by its opaque
//! identity on the server (tickets are single use: the server removes the
//! entry when it is presented) and by server name on the client.
//!
//! The cache is an explicit object handed to each connection that should
//! share it; there is no process-wide instance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;
use weft_crypto::HashAlgorithm;

use crate::cipher::CipherSuite;
use crate::key_schedule::Secret;

/// Largest difference between the client's and the server's view of a
/// ticket's age, in milliseconds.
pub const MAX_TICKET_AGE_SKEW_MS: u64 = 10_000;

/// A TLS 1.2 session that can be resumed with its ID.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID chosen by the server
    pub id: Vec<u8>,
    /// Suite of the original handshake
    pub suite: CipherSuite,
    /// Master secret
    pub master_secret: Secret,
    /// Server name the session was made with
    pub server_name: Option<String>,
    /// When the full handshake completed
    pub created: Instant,
}

/// A TLS 1.3 resumption ticket.
#[derive(Debug, Clone)]
pub struct Ticket {
    /// Names the ticket was issued for
    pub server_names: Vec<String>,
    /// Opaque PSK identity
    pub identity: Vec<u8>,
    /// Nonce of the NewSessionTicket
    pub nonce: Vec<u8>,
    /// Lifetime in seconds
    pub lifetime: u32,
    /// Obfuscation added to the ticket age
    pub age_add: u32,
    /// Resumption PSK
    pub psk: Secret,
    /// Hash of the suite the PSK belongs to
    pub hash: HashAlgorithm,
    /// Suite of the original handshake
    pub suite: CipherSuite,
    /// Early data the server accepts under this ticket
    pub max_early_data_size: u32,
    /// Issue time (server) or receive time (client)
    pub created: Instant,
}

impl Ticket {
    /// Whether the ticket is within its lifetime at `now`.
    pub fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) < Duration::from_secs(u64::from(self.lifetime))
    }

    /// Age in milliseconds at `now`.
    pub fn age_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.created).as_millis() as u64
    }

    /// `obfuscated_ticket_age` to send at `now`.
    pub fn obfuscated_age(&self, now: Instant) -> u32 {
        (self.age_ms(now) as u32).wrapping_add(self.age_add)
    }

    /// Whether a client-reported `obfuscated_age` is consistent with the
    /// server's record of the ticket at `now`.
    pub fn age_is_plausible(&self, obfuscated_age: u32, now: Instant) -> bool {
        let client_age = u64::from(obfuscated_age.wrapping_sub(self.age_add));
        client_age.abs_diff(self.age_ms(now)) <= MAX_TICKET_AGE_SKEW_MS
    }
}

/// What a cache entry holds.
#[derive(Debug, Clone)]
pub enum CachedSession {
    /// TLS 1.2 session
    Session(Session),
    /// TLS 1.3 ticket
    Ticket(Ticket),
}

impl CachedSession {
    /// The TLS 1.2 session, if this is one.
    pub fn as_session(&self) -> Option<&Session> {
        match self {
            CachedSession::Session(s) => Some(s),
            CachedSession::Ticket(_) => None,
        }
    }

    /// The TLS 1.3 ticket, if this is one.
    pub fn as_ticket(&self) -> Option<&Ticket> {
        match self {
            CachedSession::Ticket(t) => Some(t),
            CachedSession::Session(_) => None,
        }
    }
}

/// How a cache entry is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Client side: the server name connected to
    ServerName(String),
    /// Server side: TLS 1.2 session ID
    SessionId(Vec<u8>),
    /// Server side: TLS 1.3 ticket identity
    TicketIdentity(Vec<u8>),
}

/// Storage for resumable sessions, shared by many connections.
///
/// Implementations synchronize internally. Connections never hold a cache
/// lock across transport I/O.
pub trait SessionCache: Send + Sync {
    /// Look up an entry.
    fn get(&self, key: &SessionKey) -> Option<CachedSession>;

    /// Insert or replace an entry.
    fn put(&self, key: SessionKey, value: CachedSession);

    /// Remove an entry, returning it.
    fn remove(&self, key: &SessionKey) -> Option<CachedSession>;
}

#[derive(Debug)]
struct Entry {
    value: CachedSession,
    inserted: Instant,
}

/// Mutex-guarded map with a time to live and a capacity.
///
/// Expired entries are dropped lazily; when full, the oldest entry is
/// evicted.
#[derive(Debug)]
pub struct InMemorySessionCache {
    entries: Mutex<HashMap<SessionKey, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for InMemorySessionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(7200), 1024)
    }
}

impl InMemorySessionCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Number of live and not yet purged entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted) >= self.ttl
    }
}

impl SessionCache for InMemorySessionCache {
    fn get(&self, key: &SessionKey) -> Option<CachedSession> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if self.expired(entry, now) => {
                entries.remove(key);
                trace!(?key, "session cache entry expired");
                None
            },
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn put(&self, key: SessionKey, value: CachedSession) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| now.saturating_duration_since(e.inserted) < self.ttl);
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone())
            {
                trace!(key = ?oldest, "session cache eviction");
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                inserted: now,
            },
        );
    }

    fn remove(&self, key: &SessionKey) -> Option<CachedSession> {
        let now = Instant::now();
        let entry = self.entries.lock().remove(key)?;
        if self.expired(&entry, now) {
            None
        } else {
            Some(entry.value)
        }
    }
}
