//! Session ticket encryption with a rotating key ring
//!
//! Tickets are sealed with the ring's first (primary) key and opened with
//! whichever ring key matches the 16-byte name prefix, so a ring can be
//! rotated without invalidating every outstanding session: tickets sealed
//! under an older key still open, and the caller is told the session
//! should be re-issued under the primary key.
//!
//! Wire layout of a sealed ticket:
//! `key name (16) ‖ IV (16) ‖ AES-128-CBC ciphertext ‖ HMAC-SHA-256 tag (32)`
//! with the MAC computed over everything before the tag.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use aws_lc_rs::cipher::{
    DecryptionContext, PaddedBlockDecryptingKey, PaddedBlockEncryptingKey,
    UnboundCipherKey, AES_128,
};
use aws_lc_rs::iv::FixedLength;
use aws_lc_rs::{hmac, rand};
use parking_lot::RwLock;
use rustls::server::ProducesTickets;
use tracing::{debug, warn};

use crate::TlsError;

/// Length of the key name prefix identifying which ring key sealed a ticket.
pub const TICKET_KEY_NAME_LEN: usize = 16;
const TICKET_AES_KEY_LEN: usize = 16;
const TICKET_HMAC_KEY_LEN: usize = 32;
/// Length of one persisted key record: name ‖ AES key ‖ HMAC key.
pub const TICKET_KEY_RECORD_LEN: usize =
    TICKET_KEY_NAME_LEN + TICKET_AES_KEY_LEN + TICKET_HMAC_KEY_LEN;
const TICKET_IV_LEN: usize = 16;
const TICKET_TAG_LEN: usize = 32;

/// One session ticket key
#[derive(Clone)]
pub struct TicketKey {
    name: [u8; TICKET_KEY_NAME_LEN],
    aes_key: [u8; TICKET_AES_KEY_LEN],
    hmac_key: [u8; TICKET_HMAC_KEY_LEN],
}

impl TicketKey {
    /// Generate a fresh key from the system RNG
    pub fn generate() -> Result<Self, TlsError> {
        let mut key = TicketKey {
            name: [0; TICKET_KEY_NAME_LEN],
            aes_key: [0; TICKET_AES_KEY_LEN],
            hmac_key: [0; TICKET_HMAC_KEY_LEN],
        };
        for buf in [
            &mut key.name[..],
            &mut key.aes_key[..],
            &mut key.hmac_key[..],
        ] {
            rand::fill(buf)
                .map_err(|_| TlsError::TicketKeys("system RNG failure".to_string()))?;
        }
        Ok(key)
    }

    /// Parse a persisted 64-byte record
    pub fn from_record(record: &[u8]) -> Result<Self, TlsError> {
        if record.len() != TICKET_KEY_RECORD_LEN {
            return Err(TlsError::TicketKeys(format!(
                "ticket key record must be {} bytes, got {}",
                TICKET_KEY_RECORD_LEN,
                record.len()
            )));
        }
        let mut key = TicketKey {
            name: [0; TICKET_KEY_NAME_LEN],
            aes_key: [0; TICKET_AES_KEY_LEN],
            hmac_key: [0; TICKET_HMAC_KEY_LEN],
        };
        key.name.copy_from_slice(&record[..TICKET_KEY_NAME_LEN]);
        key.aes_key
            .copy_from_slice(&record[TICKET_KEY_NAME_LEN..TICKET_KEY_NAME_LEN + TICKET_AES_KEY_LEN]);
        key.hmac_key
            .copy_from_slice(&record[TICKET_KEY_NAME_LEN + TICKET_AES_KEY_LEN..]);
        Ok(key)
    }

    /// Serialise to the persisted record form
    pub fn to_record(&self) -> [u8; TICKET_KEY_RECORD_LEN] {
        let mut record = [0u8; TICKET_KEY_RECORD_LEN];
        record[..TICKET_KEY_NAME_LEN].copy_from_slice(&self.name);
        record[TICKET_KEY_NAME_LEN..TICKET_KEY_NAME_LEN + TICKET_AES_KEY_LEN]
            .copy_from_slice(&self.aes_key);
        record[TICKET_KEY_NAME_LEN + TICKET_AES_KEY_LEN..].copy_from_slice(&self.hmac_key);
        record
    }

    /// Public key name (safe to log)
    pub fn name(&self) -> &[u8; TICKET_KEY_NAME_LEN] {
        &self.name
    }
}

// Key material must never reach logs.
impl fmt::Debug for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TicketKey({:02x?})", self.name)
    }
}

/// Which ring key opened a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKeyUse {
    /// The primary (first) key; the ticket is current.
    Primary,
    /// An older ring key; the session should be re-issued a fresh ticket.
    NeedsRenewal,
}

/// Load a key ring file of concatenated 64-byte records
pub fn load_ticket_keys(path: &Path) -> Result<Vec<TicketKey>, TlsError> {
    let data = fs::read(path)
        .map_err(|e| TlsError::TicketKeys(format!("{}: {}", path.display(), e)))?;
    if data.is_empty() || data.len() % TICKET_KEY_RECORD_LEN != 0 {
        return Err(TlsError::TicketKeys(format!(
            "{}: expected whole {}-byte records, found {} bytes",
            path.display(),
            TICKET_KEY_RECORD_LEN,
            data.len()
        )));
    }
    data.chunks_exact(TICKET_KEY_RECORD_LEN)
        .map(TicketKey::from_record)
        .collect()
}

/// An ordered ring of ticket keys; the first key seals new tickets
pub struct TicketKeyRing {
    keys: Vec<TicketKey>,
}

impl TicketKeyRing {
    /// Build a ring. At least one key is required.
    pub fn new(keys: Vec<TicketKey>) -> Result<Self, TlsError> {
        if keys.is_empty() {
            return Err(TlsError::TicketKeys(
                "ticket key ring must hold at least one key".to_string(),
            ));
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Seal a ticket under the primary key with a fresh random IV.
    ///
    /// Returns `None` on any crypto failure; the handshake then falls back
    /// to a full session, never to a weaker ticket.
    pub fn seal(&self, plain: &[u8]) -> Option<Vec<u8>> {
        let key = &self.keys[0];

        let unbound = UnboundCipherKey::new(&AES_128, &key.aes_key).ok()?;
        let enc_key = PaddedBlockEncryptingKey::cbc_pkcs7(unbound).ok()?;
        let mut ciphertext = plain.to_vec();
        let context = match enc_key.encrypt(&mut ciphertext) {
            Ok(context) => context,
            Err(_) => {
                warn!("session ticket seal failed: cipher error");
                return None;
            }
        };
        let DecryptionContext::Iv128(iv) = context else {
            return None;
        };

        let mut out = Vec::with_capacity(
            TICKET_KEY_NAME_LEN + TICKET_IV_LEN + ciphertext.len() + TICKET_TAG_LEN,
        );
        out.extend_from_slice(&key.name);
        out.extend_from_slice(iv.as_ref());
        out.extend_from_slice(&ciphertext);

        let mac_key = hmac::Key::new(hmac::HMAC_SHA256, &key.hmac_key);
        let tag = hmac::sign(&mac_key, &out);
        out.extend_from_slice(tag.as_ref());
        Some(out)
    }

    /// Open a ticket, searching the ring by key name.
    ///
    /// Returns the plaintext and whether the sealing key was the primary
    /// one. Unknown key name, MAC mismatch or a malformed ticket all
    /// return `None`.
    pub fn open(&self, ticket: &[u8]) -> Option<(Vec<u8>, TicketKeyUse)> {
        if ticket.len() < TICKET_KEY_NAME_LEN + TICKET_IV_LEN + TICKET_TAG_LEN {
            return None;
        }
        let (name, rest) = ticket.split_at(TICKET_KEY_NAME_LEN);
        let (iv, rest) = rest.split_at(TICKET_IV_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TICKET_TAG_LEN);

        let Some(index) = self.keys.iter().position(|key| key.name[..] == *name) else {
            debug!("session ticket key not found in ring");
            return None;
        };
        let key = &self.keys[index];

        let mac_key = hmac::Key::new(hmac::HMAC_SHA256, &key.hmac_key);
        if hmac::verify(&mac_key, &ticket[..ticket.len() - TICKET_TAG_LEN], tag).is_err() {
            debug!("session ticket failed authentication");
            return None;
        }

        let unbound = UnboundCipherKey::new(&AES_128, &key.aes_key).ok()?;
        let dec_key = PaddedBlockDecryptingKey::cbc_pkcs7(unbound).ok()?;
        let iv = FixedLength::<TICKET_IV_LEN>::try_from(iv).ok()?;
        let mut in_out = ciphertext.to_vec();
        let plain = dec_key
            .decrypt(&mut in_out, DecryptionContext::Iv128(iv))
            .ok()?;
        let plain = plain.to_vec();

        let usage = if index == 0 {
            TicketKeyUse::Primary
        } else {
            TicketKeyUse::NeedsRenewal
        };
        Some((plain, usage))
    }
}

impl fmt::Debug for TicketKeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketKeyRing")
            .field("keys", &self.keys.len())
            .finish()
    }
}

/// [`ProducesTickets`] implementation over a swappable [`TicketKeyRing`].
///
/// Rotation publishes a whole new ring atomically; in-flight handshakes
/// keep the ring they already cloned out of the lock.
pub struct RingTicketer {
    ring: RwLock<Arc<TicketKeyRing>>,
    lifetime: u32,
}

impl RingTicketer {
    pub fn new(ring: TicketKeyRing, lifetime: u32) -> Self {
        Self {
            ring: RwLock::new(Arc::new(ring)),
            lifetime,
        }
    }

    /// Replace the ring. Tickets sealed under the old primary key keep
    /// opening for as long as that key remains in the new ring.
    pub fn rotate(&self, ring: TicketKeyRing) {
        *self.ring.write() = Arc::new(ring);
        debug!("session ticket key ring rotated");
    }

    fn current(&self) -> Arc<TicketKeyRing> {
        Arc::clone(&self.ring.read())
    }
}

impl fmt::Debug for RingTicketer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingTicketer")
            .field("keys", &self.current().len())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl ProducesTickets for RingTicketer {
    fn enabled(&self) -> bool {
        true
    }

    fn lifetime(&self) -> u32 {
        self.lifetime
    }

    fn encrypt(&self, plain: &[u8]) -> Option<Vec<u8>> {
        self.current().seal(plain)
    }

    fn decrypt(&self, cipher: &[u8]) -> Option<Vec<u8>> {
        let (plain, usage) = self.current().open(cipher)?;
        if usage == TicketKeyUse::NeedsRenewal {
            debug!("session ticket sealed under a non-primary key; session will be re-issued");
        }
        Some(plain)
    }
}
