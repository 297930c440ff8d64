//! Record layer.
//!
//! Splits outgoing content into records of at most 2^14 bytes, applies the
//! active write protection and frames them with the five byte header:
//!
//! ```text
//! struct {
//!     ContentType type;
//!     ProtocolVersion legacy_record_version;   // always 0x0303 on write
//!     uint16 length;
//!     opaque fragment[length];
//! } TLSPlaintext;
//! ```
//!
//! On read it validates the header, enforces the length limits of the
//! active protection and removes it. Protection is a [`RecordProtection`]
//! trait object so the handshake can swap TLS 1.2 and TLS 1.3 keys without
//! the record layer knowing which version is in use.

pub mod tls12;
pub mod tls13;

use core::fmt;

use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{ContentType, ProtocolVersion, MAX_FRAGMENT_LEN};
use crate::transport::Transport;

/// Record header length.
pub const HEADER_LEN: usize = 5;

/// Largest protected TLS 1.2 fragment (2^14 + 2048).
pub const MAX_TLS12_CIPHERTEXT_LEN: usize = MAX_FRAGMENT_LEN + 2048;

/// Largest protected TLS 1.3 fragment (2^14 + 256).
pub const MAX_TLS13_CIPHERTEXT_LEN: usize = MAX_FRAGMENT_LEN + 256;

/// A record after protection has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Content type (the inner type for TLS 1.3)
    pub content_type: ContentType,
    /// Version from the record header
    pub version: ProtocolVersion,
    /// Plaintext fragment
    pub fragment: Vec<u8>,
}

/// One direction of record protection with its own sequence number.
///
/// Implementations advance the sequence number only when a record was
/// sealed or opened successfully.
pub trait RecordProtection: Send {
    /// Protect `fragment`, returning the outer content type and the body.
    fn seal(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<(ContentType, Vec<u8>)>;

    /// Verify and decrypt `body`, returning the real content type and the
    /// plaintext.
    fn open(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        body: &[u8],
    ) -> Result<(ContentType, Vec<u8>)>;

    /// Largest body this protection accepts.
    fn max_ciphertext_len(&self) -> usize;

    /// Sequence number of the next record.
    fn sequence_number(&self) -> u64;

    /// TLS 1.3 protection hides the content type.
    fn hides_content_type(&self) -> bool {
        false
    }
}

/// 64-bit record sequence counter that refuses to wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SequenceNumber(u64);

impl SequenceNumber {
    pub(crate) fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn advance(&mut self) -> Result<()> {
        self.0 = self
            .0
            .checked_add(1)
            .ok_or_else(|| Error::Internal("record sequence number exhausted".into()))?;
        Ok(())
    }

    /// The sequence number left-padded with zeros and XORed into `iv`.
    pub(crate) fn nonce(self, iv: &[u8]) -> Vec<u8> {
        let mut nonce = iv.to_vec();
        let offset = nonce.len().saturating_sub(8);
        for (n, s) in nonce[offset..].iter_mut().zip(self.0.to_be_bytes()) {
            *n ^= s;
        }
        nonce
    }
}

/// Record framing plus the currently active protection in each direction.
pub struct RecordLayer {
    max_fragment: usize,
    read: Option<Box<dyn RecordProtection>>,
    write: Option<Box<dyn RecordProtection>>,
    early_skip: usize,
}

impl fmt::Debug for RecordLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordLayer")
            .field("max_fragment", &self.max_fragment)
            .field("read_protected", &self.read.is_some())
            .field("write_protected", &self.write.is_some())
            .field("early_skip", &self.early_skip)
            .finish()
    }
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordLayer {
    /// Unprotected record layer.
    pub fn new() -> Self {
        Self {
            max_fragment: MAX_FRAGMENT_LEN,
            read: None,
            write: None,
            early_skip: 0,
        }
    }

    /// Lower the fragment size used for outgoing records.
    pub fn set_max_fragment(&mut self, len: usize) {
        self.max_fragment = len.clamp(1, MAX_FRAGMENT_LEN);
    }

    /// Install protection for incoming records.
    pub fn activate_read(&mut self, protection: Box<dyn RecordProtection>) {
        self.read = Some(protection);
    }

    /// Install protection for outgoing records.
    pub fn activate_write(&mut self, protection: Box<dyn RecordProtection>) {
        self.write = Some(protection);
    }

    /// Drop both protections (a failed connection restarting from idle).
    pub fn reset(&mut self) {
        self.read = None;
        self.write = None;
        self.early_skip = 0;
    }

    /// True once incoming records are protected.
    pub fn is_read_protected(&self) -> bool {
        self.read.is_some()
    }

    /// True once outgoing records are protected.
    pub fn is_write_protected(&self) -> bool {
        self.write.is_some()
    }

    /// Sequence number of the next incoming record, if protected.
    pub fn read_sequence(&self) -> Option<u64> {
        self.read.as_ref().map(|p| p.sequence_number())
    }

    /// Sequence number of the next outgoing record, if protected.
    pub fn write_sequence(&self) -> Option<u64> {
        self.write.as_ref().map(|p| p.sequence_number())
    }

    /// Silently discard up to `budget` bytes of records that fail to
    /// decrypt, as a server does after rejecting 0-RTT data. The first
    /// record that opens ends the skipping.
    pub fn skip_undecryptable(&mut self, budget: usize) {
        self.early_skip = budget;
    }

    /// Remaining early data skip budget.
    pub fn skip_budget(&self) -> usize {
        self.early_skip
    }

    /// Fragment, protect and send `data` as records of `content_type`.
    ///
    /// Empty `data` sends nothing.
    pub fn write_record<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        content_type: ContentType,
        data: &[u8],
    ) -> Result<()> {
        for chunk in data.chunks(self.max_fragment) {
            let (outer, body) = match self.write.as_mut() {
                Some(protection) => protection.seal(content_type, ProtocolVersion::Tls12, chunk)?,
                None => (content_type, chunk.to_vec()),
            };
            let mut wire = Vec::with_capacity(HEADER_LEN + body.len());
            wire.push(outer.to_u8());
            wire.extend_from_slice(&ProtocolVersion::Tls12.to_u16().to_be_bytes());
            wire.extend_from_slice(&(body.len() as u16).to_be_bytes());
            wire.extend_from_slice(&body);
            trace!(
                content_type = ?content_type,
                len = body.len(),
                protected = self.write.is_some(),
                "record out"
            );
            transport.write_all(&wire)?;
        }
        Ok(())
    }

    /// Read the next record, removing protection.
    ///
    /// Records that fail to decrypt while an early data skip budget is
    /// left are dropped and reading continues.
    pub fn read_record<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Record> {
        loop {
            let mut header = [0u8; HEADER_LEN];
            transport.read_exact(&mut header)?;

            let content_type = ContentType::from_u8(header[0])
                .ok_or_else(|| Error::decode(format_args!("unknown content type {}", header[0])))?;
            if header[1] != 3 {
                return Err(Error::decode(format_args!(
                    "unsupported record version {}.{}",
                    header[1], header[2]
                )));
            }
            let version = ProtocolVersion::from_u16(u16::from_be_bytes([header[1], header[2]]));
            let len = u16::from_be_bytes([header[3], header[4]]) as usize;

            let skipping_plaintext = self.read.is_none()
                && self.early_skip > 0
                && content_type == ContentType::ApplicationData;
            let limit = match &self.read {
                Some(protection) => protection.max_ciphertext_len(),
                None if skipping_plaintext => MAX_TLS13_CIPHERTEXT_LEN,
                None => MAX_FRAGMENT_LEN,
            };
            if len > limit {
                return Err(Error::RecordOverflow(len));
            }
            if len == 0
                && matches!(content_type, ContentType::Handshake | ContentType::Alert)
            {
                return Err(Error::decode("empty handshake or alert record"));
            }

            let mut body = vec![0u8; len];
            transport.read_exact(&mut body)?;

            let Some(protection) = self.read.as_mut() else {
                if skipping_plaintext {
                    self.early_skip = self.early_skip.saturating_sub(len);
                    trace!(len, "skipped early data record");
                    continue;
                }
                trace!(content_type = ?content_type, len, "record in");
                return Ok(Record {
                    content_type,
                    version,
                    fragment: body,
                });
            };

            if protection.hides_content_type() {
                match content_type {
                    ContentType::ChangeCipherSpec => {
                        return Ok(Record {
                            content_type,
                            version,
                            fragment: body,
                        })
                    },
                    ContentType::ApplicationData => {},
                    other => {
                        return Err(Error::UnexpectedMessage(format!(
                            "unprotected {:?} record after keys were installed",
                            other
                        )))
                    },
                }
            }

            match protection.open(content_type, version, &body) {
                Ok((inner, fragment)) => {
                    self.early_skip = 0;
                    if fragment.is_empty()
                        && matches!(inner, ContentType::Handshake | ContentType::Alert)
                    {
                        return Err(Error::decode("empty handshake or alert record"));
                    }
                    trace!(content_type = ?inner, len = fragment.len(), "record in");
                    return Ok(Record {
                        content_type: inner,
                        version,
                        fragment,
                    });
                },
                Err(Error::BadRecordMac) if self.early_skip >= len => {
                    self.early_skip -= len;
                    trace!(len, remaining = self.early_skip, "skipped undecryptable record");
                },
                Err(e) => return Err(e),
            }
        }
    }
}
