//! Addressable byte buffers.

use bytes::Bytes;
use std::fmt;

/// MIME type used when the caller does not supply one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// An immutable file payload awaiting upload.
///
/// A blob is validated once at construction and never mutated afterwards.
/// Cloning is cheap since the bytes are reference counted.
#[derive(Clone)]
pub struct Blob {
    data: Bytes,
    mime_type: String,
}

impl Blob {
    /// Create a blob, rejecting empty payloads and payloads above `max_size`.
    pub fn new(data: Bytes, mime_type: Option<String>, max_size: u64) -> crate::Result<Self> {
        let size = data.len() as u64;
        if size == 0 {
            return Err(crate::Error::EmptyBlob);
        }
        if size > max_size {
            return Err(crate::Error::BlobTooLarge {
                size,
                max: max_size,
            });
        }

        let mime_type = mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        Ok(Self { data, mime_type })
    }

    /// Create a blob with the default size limit.
    pub fn from_bytes(data: impl Into<Bytes>) -> crate::Result<Self> {
        Self::new(data.into(), None, crate::DEFAULT_MAX_BLOB_SIZE)
    }

    /// The blob contents.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("size_bytes", &self.size_bytes())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}
