//! In-memory message body with a read cursor.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Byte buffer with a cursor, used for both request and response bodies.
///
/// Writes land at the cursor and advance it, so a freshly written body must be
/// [rewound](Body::rewind) before it is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    buf: Vec<u8>,
    pos: usize,
}

impl Body {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Write `bytes` at the cursor, overwriting and then extending the buffer.
    ///
    /// # Errors
    ///
    /// * If the cursor plus `bytes` would overflow the address space
    pub fn write_bytes(&mut self, bytes: impl AsRef<[u8]>) -> io::Result<usize> {
        let bytes = bytes.as_ref();
        let end = self.pos.checked_add(bytes.len()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "write past the end of the addressable body",
            )
        })?;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(bytes.len())
    }

    /// Append `bytes` after the last byte and move the cursor to the end.
    pub fn append(&mut self, bytes: impl AsRef<[u8]>) {
        self.buf.extend_from_slice(bytes.as_ref());
        self.pos = self.buf.len();
    }

    pub const fn rewind(&mut self) {
        self.pos = 0;
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes from the cursor to the end, without moving the cursor.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    /// The whole buffer regardless of the cursor.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self { buf: value, pos: 0 }
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        value.as_bytes().to_vec().into()
    }
}

impl Read for Body {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let remaining = self.contents();
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for Body {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.write_bytes(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Body {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(n) => {
                self.pos = usize::try_from(n)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                return Ok(n);
            }
            SeekFrom::End(n) => (self.buf.len(), n),
            SeekFrom::Current(n) => (self.pos, n),
        };

        let base = i64::try_from(base).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = base
            .checked_add(offset)
            .and_then(|x| usize::try_from(x).ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid seek to a negative or overflowing position",
                )
            })?;

        self.pos = target;
        Ok(target as u64)
    }
}
