use crate::{Error, LINE_TERMINATOR, MAX_LINE_LEN, Result};

use bytes::{Bytes, BytesMut};
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reads newline-terminated handshake lines from a byte stream.
///
/// Lines may arrive split across any number of reads. Bytes that follow the
/// terminator in the same read are kept and handed back by
/// [`LineReader::into_parts`], since after the handshake they belong to the
/// raw stream.
///
/// `read_line` is cancel safe: partially received lines stay buffered.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    max_len: usize,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps `inner`, accepting lines up to [`MAX_LINE_LEN`] bytes.
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_LINE_LEN)
    }

    /// Wraps `inner`, accepting lines up to `max_len` bytes.
    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(max_len),
            max_len,
        }
    }

    /// Reads the next line, terminator included.
    ///
    /// Returns `Ok(None)` if the stream ends before any byte of a new line.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, the stream ends part way through a
    /// line, or no terminator appears within the length limit.
    pub async fn read_line(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(pos) = memchr(LINE_TERMINATOR, &self.buf) {
                if pos >= self.max_len {
                    return Err(Error::LineTooLong(self.max_len));
                }

                return Ok(Some(self.buf.split_to(pos + 1).freeze()));
            }

            if self.buf.len() >= self.max_len {
                return Err(Error::LineTooLong(self.max_len));
            }

            let n = self
                .inner
                .read_buf(&mut self.buf)
                .await
                .map_err(|e| Error::Io("error reading line", e))?;

            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }

                return Err(Error::UnexpectedEof);
            }
        }
    }

    /// Bytes received after the last line returned.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the underlying reader and any bytes read past the last line.
    pub fn into_parts(self) -> (R, BytesMut) {
        (self.inner, self.buf)
    }
}
