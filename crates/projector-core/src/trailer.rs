//! Trailer record encoding.
//!
//! The runtime loader finds its payload by reading a fixed 8-byte record at
//! the very end of its own executable:
//!
//! ```text
//! +----------------+----------------------+
//! | 56 34 12 FA    | payload length (u32) |
//! | magic marker   | little-endian        |
//! +----------------+----------------------+
//! ```
//!
//! The loader reads these bytes verbatim, so every encoder here must produce
//! exactly the same output as a plain little-endian `u32` serialization.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut};

/// Marker identifying the trailer to the runtime loader
pub const MAGIC: [u8; 4] = [0x56, 0x34, 0x12, 0xFA];

/// Size of the 32-bit length field
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Size of the full trailer record (magic + length)
pub const TRAILER_SIZE: usize = MAGIC.len() + LENGTH_FIELD_SIZE;

/// Largest payload a 32-bit length field can describe
pub const MAX_PAYLOAD_LEN: u64 = u32::MAX as u64;

/// Encode a payload length as a 4-byte little-endian field.
///
/// Lengths that do not fit in 32 bits are rejected rather than wrapped.
pub fn encode_length(len: usize) -> Result<[u8; LENGTH_FIELD_SIZE]> {
    let value = Trailer::for_payload(len)?.payload_len;
    let mut field = [0u8; LENGTH_FIELD_SIZE];
    (&mut field[..]).put_u32_le(value);
    Ok(field)
}

/// Decode a 4-byte little-endian length field
pub fn decode_length(field: [u8; LENGTH_FIELD_SIZE]) -> u32 {
    (&field[..]).get_u32_le()
}

/// The trailer appended after the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Payload length in bytes
    pub payload_len: u32,
}

impl Trailer {
    /// Creates a trailer describing a payload of `len` bytes
    pub fn for_payload(len: usize) -> Result<Self> {
        let payload_len =
            u32::try_from(len).map_err(|_| Error::payload_too_large(len, MAX_PAYLOAD_LEN))?;
        Ok(Self { payload_len })
    }

    /// Serializes the trailer: magic marker followed by the length field
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut out = [0u8; TRAILER_SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(&MAGIC);
        buf.put_u32_le(self.payload_len);
        out
    }

    /// Parses the trailer from the last [`TRAILER_SIZE`] bytes of `image`.
    ///
    /// Returns `None` if the image is too short or does not end in a trailer.
    pub fn parse(image: &[u8]) -> Option<Self> {
        let start = image.len().checked_sub(TRAILER_SIZE)?;
        let (marker, field) = image[start..].split_at(MAGIC.len());
        if marker != MAGIC {
            return None;
        }
        let field: [u8; LENGTH_FIELD_SIZE] = field.try_into().ok()?;
        Some(Self {
            payload_len: decode_length(field),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_small_lengths() {
        assert_eq!(encode_length(0).unwrap(), [0x00, 0x00, 0x00, 0x00]);
        assert_eq!(encode_length(3).unwrap(), [0x03, 0x00, 0x00, 0x00]);
        assert_eq!(encode_length(256).unwrap(), [0x00, 0x01, 0x00, 0x00]);
        assert_eq!(encode_length(0x0102_0304).unwrap(), [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_encode_max_length() {
        assert_eq!(
            encode_length(u32::MAX as usize).unwrap(),
            [0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_encode_rejects_oversized_length() {
        let err = encode_length(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(
            err,
            Error::PayloadTooLarge {
                len: 4_294_967_296,
                max: MAX_PAYLOAD_LEN
            }
        ));
        assert!(Trailer::for_payload(u32::MAX as usize + 1).is_err());
    }

    #[test]
    fn test_matches_shift_loop() {
        for len in [0usize, 1, 255, 256, 65_535, 65_536, 16_777_216, 123_456_789] {
            let mut expected = [0u8; 4];
            let mut remaining = len;
            for byte in expected.iter_mut() {
                *byte = (remaining & 0xFF) as u8;
                remaining >>= 8;
            }
            let encoded = encode_length(len).unwrap();
            assert_eq!(encoded, expected);
            assert_eq!(decode_length(encoded) as usize, len);
        }
    }

    #[test]
    fn test_trailer_bytes() {
        let trailer = Trailer::for_payload(3).unwrap();
        assert_eq!(
            trailer.to_bytes(),
            [0x56, 0x34, 0x12, 0xFA, 0x03, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_parse_trailer() {
        let mut image = vec![0xAA; 5];
        image.extend_from_slice(&Trailer { payload_len: 5 }.to_bytes());
        assert_eq!(Trailer::parse(&image), Some(Trailer { payload_len: 5 }));

        assert_eq!(Trailer::parse(&image[..image.len() - 1]), None);
        assert_eq!(Trailer::parse(&[0x56, 0x34, 0x12]), None);
    }
}
