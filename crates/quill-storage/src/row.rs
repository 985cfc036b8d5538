//! Fixed-width row representation and serialization.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use quill_common::{QuillError, Result};

/// Size of the id column.
pub const ID_SIZE: usize = std::mem::size_of::<u32>();

/// Maximum username length in bytes.
pub const USERNAME_SIZE: usize = 32;

/// Maximum email length in bytes.
pub const EMAIL_SIZE: usize = 255;

/// Offset of the id column.
pub const ID_OFFSET: usize = 0;

/// Offset of the username column.
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;

/// Offset of the email column.
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Serialized row size: 4 + 32 + 255 = 291 bytes.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A row of the single hard-coded table schema.
///
/// Layout (291 bytes):
/// - id: 4 bytes (little-endian)
/// - username: 32 bytes (zero-padded)
/// - email: 255 bytes (zero-padded)
///
/// Strings are stored without a length prefix. A value that fills its column
/// exactly has no terminating zero byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    id: u32,
    username: String,
    email: String,
}

impl Row {
    /// Creates a new row, rejecting strings that do not fit their column.
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let email = email.into();

        Self::check_len("username", &username, USERNAME_SIZE)?;
        Self::check_len("email", &email, EMAIL_SIZE)?;

        Ok(Self {
            id,
            username,
            email,
        })
    }

    fn check_len(column: &'static str, value: &str, max: usize) -> Result<()> {
        if value.len() > max {
            return Err(QuillError::FieldTooLong {
                column,
                len: value.len(),
                max,
            });
        }
        // An embedded NUL would be read back as the end of the string.
        if value.as_bytes().contains(&0) {
            return Err(QuillError::InvalidField {
                column,
                reason: "contains a NUL byte".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the row id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the email.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Writes the row into the first ROW_SIZE bytes of `dst`.
    ///
    /// Every byte of the slot is written, so stale page contents never leak.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than ROW_SIZE.
    pub fn serialize_into(&self, dst: &mut [u8]) {
        let mut buf = &mut dst[..ROW_SIZE];
        buf.put_u32_le(self.id);
        put_padded(&mut buf, self.username.as_bytes(), USERNAME_SIZE);
        put_padded(&mut buf, self.email.as_bytes(), EMAIL_SIZE);
    }

    /// Serializes the row to a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::zeroed(ROW_SIZE);
        self.serialize_into(&mut buf);
        buf.freeze()
    }

    /// Deserializes a row from the first ROW_SIZE bytes of `src`.
    ///
    /// Returns None if the buffer is too short.
    pub fn deserialize(src: &[u8]) -> Option<Self> {
        if src.len() < ROW_SIZE {
            return None;
        }

        let mut buf = &src[..ROW_SIZE];
        let id = buf.get_u32_le();
        let username = take_padded(&mut buf, USERNAME_SIZE);
        let email = take_padded(&mut buf, EMAIL_SIZE);

        Some(Self {
            id,
            username,
            email,
        })
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

/// Writes `value` followed by zeros up to `width` bytes.
fn put_padded(buf: &mut &mut [u8], value: &[u8], width: usize) {
    buf.put_slice(value);
    buf.put_bytes(0, width - value.len());
}

/// Reads a `width`-byte zero-padded column.
fn take_padded(buf: &mut &[u8], width: usize) -> String {
    let field = &buf[..width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    let value = String::from_utf8_lossy(&field[..end]).into_owned();
    buf.advance(width);
    value
}
