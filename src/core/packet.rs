use bytes::Bytes;

/// Fixed capacity of the read buffer used for one read cycle
pub const DEFAULT_PACKET_SIZE: usize = 256;

/// An immutable byte buffer plus the count of meaningful bytes in it.
///
/// Received packets may carry a buffer larger than their payload: with the
/// default framing the whole read buffer is handed over and only the first
/// `len` bytes belong to the final read. Use [`Packet::payload`] to get the
/// meaningful bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    buffer: Bytes,
    len: usize,
}

impl Packet {
    /// Build a packet whose payload is the whole buffer
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        let buffer = buffer.into();
        let len = buffer.len();
        Self { buffer, len }
    }

    /// Build a packet from a buffer and a meaningful-byte count.
    ///
    /// The count is clamped to the buffer length.
    pub fn with_len(buffer: impl Into<Bytes>, len: usize) -> Self {
        let buffer = buffer.into();
        let len = len.min(buffer.len());
        Self { buffer, len }
    }

    /// The meaningful bytes
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// The full underlying buffer, including bytes past `len`
    #[inline]
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// Number of meaningful bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cheap clone of the payload as shared bytes
    pub fn to_bytes(&self) -> Bytes {
        self.buffer.slice(..self.len)
    }
}

impl From<&'static [u8]> for Packet {
    fn from(value: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(value))
    }
}

impl From<Vec<u8>> for Packet {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}
