use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;
use memchr::memchr2;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;

#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    max_line_len: usize,
    // Last line ended in `\r`; a following `\n` or `\0` belongs to that terminator.
    pending_cr: bool,
}

impl<R> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4 * 1024),
            max_line_len: 4 * 1024,
            pending_cr: false,
        }
    }

    pub fn max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max.max(1);
        self
    }
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Read one line, stripping its terminator.
    ///
    /// Telnet clients send CRLF, but bare LF, bare CR and CR NUL all show up in
    /// practice; each counts as exactly one end of line.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` for a line (may be empty),
    /// - `Ok(None)` on clean EOF with no buffered data.
    pub async fn read_line(&mut self) -> std::io::Result<Option<Bytes>> {
        loop {
            if self.pending_cr {
                if let Some(&b) = self.buf.first() {
                    if b == b'\n' || b == 0 {
                        self.buf.advance(1);
                    }
                    self.pending_cr = false;
                }
            }

            if let Some(i) = memchr2(b'\n', b'\r', &self.buf) {
                let eol = self.buf[i];
                let line = self.buf.split_to(i).freeze();
                self.buf.advance(1);
                self.pending_cr = eol == b'\r';
                return Ok(Some(line));
            }

            if self.buf.len() > self.max_line_len {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "line too long",
                ));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "eof while reading line",
                ));
            }
        }
    }

    /// Like [`read_line`](Self::read_line), decoding invalid UTF-8 lossily.
    pub async fn read_line_lossy(&mut self) -> std::io::Result<Option<String>> {
        Ok(self
            .read_line()
            .await?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }
}
