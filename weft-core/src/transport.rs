//! Byte transport underneath the record layer.
//!
//! The engine only needs two blocking primitives: write a whole buffer and
//! fill a whole buffer. Anything that is `Read + Write` (a `TcpStream`, a
//! `UnixStream`, an in-memory pipe) is a transport.

use std::io::{Read, Write};

use crate::error::Result;

/// Blocking, reliable, ordered byte stream.
pub trait Transport {
    /// Write all of `data` and flush it.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Fill `buf` completely.
    ///
    /// End of stream before `buf` is full is
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
}

impl<S: Read + Write> Transport for S {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        Write::write_all(self, data)?;
        self.flush()?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        Read::read_exact(self, buf)?;
        Ok(())
    }
}
