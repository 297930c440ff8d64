//! NewSessionTicket (RFC 8446 Section 4.6.1).

use bytes::{BufMut, BytesMut};

use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::extensions::{ExtensionContext, Extensions};

/// Longest ticket lifetime a server may announce (seven days).
pub const MAX_TICKET_LIFETIME: u32 = 604_800;

/// NewSessionTicket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    /// Lifetime in seconds
    pub lifetime: u32,

    /// Added to the ticket age by the client to obfuscate it
    pub age_add: u32,

    /// Per-ticket nonce fed into the resumption PSK derivation
    pub nonce: Vec<u8>,

    /// Opaque label the client presents as a PSK identity
    pub ticket: Vec<u8>,

    /// Extensions (early_data)
    pub extensions: Extensions,
}

impl NewSessionTicket {
    /// Append the body.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.lifetime);
        buf.put_u32(self.age_add);
        buf.put_vec_u8(&self.nonce);
        buf.put_vec_u16(&self.ticket);
        self.extensions.encode(buf);
    }

    /// Decode a body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut r = Reader::new(body);
        let lifetime = r.u32()?;
        if lifetime > MAX_TICKET_LIFETIME {
            return Err(Error::IllegalParameter(format!(
                "ticket lifetime {} exceeds seven days",
                lifetime
            )));
        }
        let age_add = r.u32()?;
        let nonce = r.vec_u8()?.to_vec();
        let ticket = r.vec_u16()?;
        if ticket.is_empty() {
            return Err(Error::decode("empty ticket"));
        }
        let ticket = ticket.to_vec();
        let extensions = Extensions::decode(&mut r, ExtensionContext::NewSessionTicket)?;
        r.expect_end("NewSessionTicket")?;
        Ok(Self {
            lifetime,
            age_add,
            nonce,
            ticket,
            extensions,
        })
    }

    /// Early data limit carried in the early_data extension, zero if absent.
    pub fn max_early_data_size(&self) -> u32 {
        self.extensions.early_data().flatten().unwrap_or(0)
    }
}
