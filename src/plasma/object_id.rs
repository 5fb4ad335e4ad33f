// In: src/plasma/object_id.rs

use std::fmt;

use crate::error::{CarrowError, Result};
use crate::store::protocol::ID_LEN;

/// A fixed 20-byte object store key.
///
/// The textual input form is the raw 20-byte string taken by `from_string`;
/// numeric indexes go through `from_index`, which zero-pads them to 20 decimal
/// digits. `Display` prints lowercase hex and is meant for diagnostics only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ID_LEN]);

impl ObjectId {
    /// Generates a random id. Byte 6 carries the `0x4_` version nibble and
    /// byte 8 the `0b10` variant bits, so generated ids are distinguishable
    /// from caller-chosen ones.
    pub fn random() -> Self {
        let mut bytes: [u8; ID_LEN] = rand::random();
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    /// Takes the bytes of `s` verbatim. `s` must be exactly 20 bytes long.
    pub fn from_string(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let id: [u8; ID_LEN] = bytes.try_into().map_err(|_| CarrowError::Length {
            expected: ID_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(id))
    }

    /// The id of the `n`th object: `n` as 20 zero-padded decimal digits.
    pub fn from_index(n: u64) -> Self {
        let digits = format!("{:020}", n);
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(digits.as_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Whether the version and variant bits of a generated id are present.
    pub fn is_generated(&self) -> bool {
        self.0[6] & 0xF0 == 0x40 && self.0[8] & 0xC0 == 0x80
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_carry_tag_bits() {
        for _ in 0..1000 {
            let id = ObjectId::random();
            assert_eq!(id.as_bytes()[6] >> 4, 0x4);
            assert_eq!(id.as_bytes()[8] >> 6, 0b10);
            assert!(id.is_generated());
        }
        assert_ne!(ObjectId::random(), ObjectId::random());
    }

    #[test]
    fn test_from_string_is_raw_bytes() {
        let s = "abcdefghij0123456789";
        let id = ObjectId::from_string(s).unwrap();
        assert_eq!(id.as_bytes(), s.as_bytes());
    }

    #[test]
    fn test_from_string_rejects_other_lengths() {
        for s in ["", "short", "abcdefghij012345678", "abcdefghij0123456789x"] {
            let err = ObjectId::from_string(s).unwrap_err();
            assert!(matches!(err, CarrowError::Length { expected: 20, actual } if actual == s.len()));
        }
    }

    #[test]
    fn test_from_index_is_zero_padded() {
        let id = ObjectId::from_index(42);
        assert_eq!(id, ObjectId::from_string("00000000000000000042").unwrap());
        assert_eq!(ObjectId::from_index(u64::MAX).as_bytes(), b"18446744073709551615");
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        let id = ObjectId::from_bytes(&[0xAB; 20]).unwrap();
        assert_eq!(id.to_string(), "ab".repeat(20));
    }
}
