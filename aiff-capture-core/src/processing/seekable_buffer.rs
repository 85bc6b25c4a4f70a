use std::io;

use crate::models::error::CaptureError;

/// Reference point for [`SeekableByteBuffer::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    FromStart,
    FromCurrent,
    FromEnd,
}

/// Growable in-memory byte store with a write cursor.
///
/// Acts as a sequential sink for streamed sample data and as a randomly
/// seekable surface so header fields can be overwritten in place once their
/// values are known. Contents never shrink. A seek only moves the cursor;
/// the buffer is extended lazily (zero-filled) by the next write that lands
/// past the current end.
///
/// Not synchronized. When shared across threads, wrap in
/// `Arc<parking_lot::Mutex<SeekableByteBuffer>>`.
#[derive(Debug, Default, Clone)]
pub struct SeekableByteBuffer {
    contents: Vec<u8>,
    cursor: usize,
}

impl SeekableByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with `capacity` bytes reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            contents: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Write `bytes` at the cursor, extending the buffer when needed.
    ///
    /// Either every byte is written or nothing is. The cursor advances by
    /// `bytes.len()`. A target the allocator cannot satisfy, such as a write
    /// after seeking near `i64::MAX`, fails with
    /// [`CaptureError::InvalidOffset`] and leaves buffer and cursor untouched.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, CaptureError> {
        let end = self
            .cursor
            .checked_add(bytes.len())
            .ok_or(CaptureError::InvalidOffset { offset: i64::MAX })?;

        if end > self.contents.len() {
            self.grow_to(end)?;
        }
        self.contents[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        Ok(bytes.len())
    }

    /// Write the ASCII/UTF-8 bytes of `text` (chunk tags such as `"FORM"`).
    pub fn write_text(&mut self, text: &str) -> Result<usize, CaptureError> {
        self.write_bytes(text.as_bytes())
    }

    /// Move the cursor. Returns the new absolute position.
    ///
    /// Fails with [`CaptureError::InvalidOffset`] if the target is negative;
    /// the cursor is left untouched in that case.
    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> Result<u64, CaptureError> {
        let base = match mode {
            SeekMode::FromStart => 0i64,
            SeekMode::FromCurrent => self.cursor as i64,
            SeekMode::FromEnd => self.contents.len() as i64,
        };
        let target = base
            .checked_add(offset)
            .ok_or(CaptureError::InvalidOffset { offset })?;
        if target < 0 {
            return Err(CaptureError::InvalidOffset { offset: target });
        }
        self.cursor = usize::try_from(target).map_err(|_| CaptureError::InvalidOffset { offset: target })?;
        Ok(self.cursor as u64)
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.cursor as u64
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.contents.capacity()
    }

    /// Full contents written so far.
    ///
    /// The borrow ends before the next write, so a view can never outlive a
    /// reallocation.
    pub fn snapshot(&self) -> &[u8] {
        &self.contents
    }

    /// Consume the buffer and hand out its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.contents
    }

    /// Extend to `end` bytes, zero-filling any gap left by a forward seek.
    fn grow_to(&mut self, end: usize) -> Result<(), CaptureError> {
        let len = self.contents.len();
        let additional = end - len;
        if end > self.contents.capacity() {
            // At least double so per-frame appends amortize.
            let amortized = self.contents.try_reserve(additional.max(len));
            if amortized.is_err() {
                self.contents.try_reserve_exact(additional).map_err(|_| {
                    CaptureError::InvalidOffset {
                        offset: self.cursor as i64,
                    }
                })?;
            }
        }
        self.contents.resize(end, 0);
        Ok(())
    }
}

impl io::Write for SeekableByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for SeekableByteBuffer {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let result = match pos {
            io::SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset exceeds i64")
                })?;
                SeekableByteBuffer::seek(self, offset, SeekMode::FromStart)
            }
            io::SeekFrom::Current(offset) => SeekableByteBuffer::seek(self, offset, SeekMode::FromCurrent),
            io::SeekFrom::End(offset) => SeekableByteBuffer::seek(self, offset, SeekMode::FromEnd),
        };
        result.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}
