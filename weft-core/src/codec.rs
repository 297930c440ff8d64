//! Wire encoding helpers shared by the record layer and the message catalog.
//!
//! Decoding goes through [`Reader`], a bounds-checked cursor whose every
//! failure is a [`Error::Decode`]. Encoding writes into `bytes::BytesMut`
//! through the [`BufMutExt`] extension trait, which adds the TLS
//! length-prefixed vector forms.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// Declares a `u16` wire enum whose unknown codepoints survive decoding.
macro_rules! open_u16_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )*
            /// Codepoint not known to this implementation
            Unknown(u16),
        }

        impl $name {
            /// Decode from the wire value; never fails.
            pub const fn from_u16(value: u16) -> Self {
                match value {
                    $( $value => $name::$variant, )*
                    other => $name::Unknown(other),
                }
            }

            /// Wire value.
            pub const fn to_u16(self) -> u16 {
                match self {
                    $( $name::$variant => $value, )*
                    $name::Unknown(value) => value,
                }
            }
        }
    };
}

/// Bounds-checked reader over a byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::decode(format!(
                "truncated: need {} bytes, have {}",
                n,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Take everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// Read one byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian `u16`.
    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian 24-bit integer.
    pub fn u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Read a big-endian `u32`.
    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a fixed-size array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// `opaque<0..2^8-1>`
    pub fn vec_u8(&mut self) -> Result<&'a [u8]> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    /// `opaque<0..2^16-1>`
    pub fn vec_u16(&mut self) -> Result<&'a [u8]> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    /// `opaque<0..2^24-1>`
    pub fn vec_u24(&mut self) -> Result<&'a [u8]> {
        let len = self.u24()? as usize;
        self.take(len)
    }

    /// A reader over a `u8`-length-prefixed sub-structure.
    pub fn sub_u8(&mut self) -> Result<Reader<'a>> {
        Ok(Reader::new(self.vec_u8()?))
    }

    /// A reader over a `u16`-length-prefixed sub-structure.
    pub fn sub_u16(&mut self) -> Result<Reader<'a>> {
        Ok(Reader::new(self.vec_u16()?))
    }

    /// A reader over a `u24`-length-prefixed sub-structure.
    pub fn sub_u24(&mut self) -> Result<Reader<'a>> {
        Ok(Reader::new(self.vec_u24()?))
    }

    /// Fail unless every byte was consumed.
    pub fn expect_end(&self, what: &str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::decode(format!(
                "{} bytes of trailing data in {}",
                self.remaining(),
                what
            )))
        }
    }
}

/// Length-prefixed writers for `BytesMut`.
pub trait BufMutExt {
    /// Write a big-endian 24-bit integer.
    fn put_u24(&mut self, value: u32);

    /// `opaque<0..2^8-1>`
    fn put_vec_u8(&mut self, data: &[u8]);

    /// `opaque<0..2^16-1>`
    fn put_vec_u16(&mut self, data: &[u8]);

    /// `opaque<0..2^24-1>`
    fn put_vec_u24(&mut self, data: &[u8]);

    /// Write whatever `body` writes behind a `u8` length.
    fn put_nested_u8(&mut self, body: impl FnOnce(&mut BytesMut));

    /// Write whatever `body` writes behind a `u16` length.
    fn put_nested_u16(&mut self, body: impl FnOnce(&mut BytesMut));

    /// Write whatever `body` writes behind a `u24` length.
    fn put_nested_u24(&mut self, body: impl FnOnce(&mut BytesMut));
}

impl BufMutExt for BytesMut {
    fn put_u24(&mut self, value: u32) {
        self.put_slice(&value.to_be_bytes()[1..]);
    }

    fn put_vec_u8(&mut self, data: &[u8]) {
        self.put_u8(data.len() as u8);
        self.put_slice(data);
    }

    fn put_vec_u16(&mut self, data: &[u8]) {
        self.put_u16(data.len() as u16);
        self.put_slice(data);
    }

    fn put_vec_u24(&mut self, data: &[u8]) {
        self.put_u24(data.len() as u32);
        self.put_slice(data);
    }

    fn put_nested_u8(&mut self, body: impl FnOnce(&mut BytesMut)) {
        let start = self.len();
        self.put_u8(0);
        body(self);
        let len = self.len() - start - 1;
        self[start] = len as u8;
    }

    fn put_nested_u16(&mut self, body: impl FnOnce(&mut BytesMut)) {
        let start = self.len();
        self.put_u16(0);
        body(self);
        let len = (self.len() - start - 2) as u16;
        self[start..start + 2].copy_from_slice(&len.to_be_bytes());
    }

    fn put_nested_u24(&mut self, body: impl FnOnce(&mut BytesMut)) {
        let start = self.len();
        self.put_u24(0);
        body(self);
        let len = (self.len() - start - 3) as u32;
        self[start..start + 3].copy_from_slice(&len.to_be_bytes()[1..]);
    }
}
