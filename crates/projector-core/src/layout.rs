//! Arrangements of runtime, payload and trailer within a projector image.
//!
//! Windows projectors put the payload directly after the runtime and the
//! trailer at the very end, which is the layout every loader understands.
//! Linux projectors instead expect the length and marker between runtime and
//! payload:
//!
//! ```text
//! Windows : runtime | payload | 56 34 12 FA | u32 len
//! Linux32 : runtime | u32 len | 56 34 12 FA | payload
//! Linux64 : runtime | u64 len | 56 34 12 FA | FF FF FF FF | payload
//! ```

use crate::error::{Error, Result};
use crate::format::RuntimeFormat;
use crate::trailer::{self, Trailer, MAGIC, TRAILER_SIZE};
use bytes::{Buf, BufMut};
use std::fmt;
use std::ops::Range;
use tracing::trace;

/// Padding that follows the marker in the 64-bit Linux layout
const LINUX64_PADDING: [u8; 4] = [0xFF; 4];

/// Placement of the payload and its trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `runtime | payload | magic | u32 len`
    #[default]
    Windows,
    /// `runtime | u32 len | magic | payload`
    Linux32,
    /// `runtime | u64 len | magic | FF FF FF FF | payload`
    Linux64,
}

impl Layout {
    /// Order in which layouts are tried when none is specified
    pub const DETECTION_ORDER: [Layout; 3] = [Layout::Windows, Layout::Linux64, Layout::Linux32];

    /// Picks the layout a runtime of the given format expects
    pub fn for_runtime(format: RuntimeFormat) -> Self {
        match format {
            RuntimeFormat::Pe | RuntimeFormat::Unknown => Self::Windows,
            RuntimeFormat::Elf32 => Self::Linux32,
            RuntimeFormat::Elf64 => Self::Linux64,
        }
    }

    /// Number of bytes the layout adds on top of runtime and payload
    pub fn trailer_len(&self) -> usize {
        match self {
            Self::Windows | Self::Linux32 => TRAILER_SIZE,
            Self::Linux64 => 8 + MAGIC.len() + LINUX64_PADDING.len(),
        }
    }

    /// Largest payload the layout's length field can describe
    pub fn max_payload_len(&self) -> u64 {
        match self {
            Self::Windows | Self::Linux32 => trailer::MAX_PAYLOAD_LEN,
            Self::Linux64 => u64::MAX,
        }
    }

    /// Concatenates runtime, payload and trailer into a projector image.
    ///
    /// Fails without allocating the output if the payload length does not fit
    /// the layout's length field.
    pub fn assemble(&self, runtime: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() as u64 > self.max_payload_len() {
            return Err(Error::payload_too_large(
                payload.len(),
                self.max_payload_len(),
            ));
        }

        let mut out = Vec::with_capacity(runtime.len() + payload.len() + self.trailer_len());
        out.put_slice(runtime);

        match self {
            Self::Windows => {
                let trailer = Trailer::for_payload(payload.len())?;
                out.put_slice(payload);
                out.put_slice(&trailer.to_bytes());
            }
            Self::Linux32 => {
                let length = trailer::encode_length(payload.len())?;
                out.put_slice(&length);
                out.put_slice(&MAGIC);
                out.put_slice(payload);
            }
            Self::Linux64 => {
                out.put_u64_le(payload.len() as u64);
                out.put_slice(&MAGIC);
                out.put_slice(&LINUX64_PADDING);
                out.put_slice(payload);
            }
        }

        Ok(out)
    }

    /// Finds the payload in a finished projector image built with this layout
    pub fn locate(&self, image: &[u8]) -> Result<LocatedPayload> {
        match self {
            Self::Windows => self.locate_in(image, &[]),
            Self::Linux32 | Self::Linux64 => self.locate_in(image, &marker_positions(image)),
        }
    }

    /// Like [`Layout::locate`], reusing marker positions found by
    /// [`marker_positions`]
    fn locate_in(&self, image: &[u8], markers: &[usize]) -> Result<LocatedPayload> {
        match self {
            Self::Windows => locate_windows(image),
            Self::Linux32 => locate_linux(image, markers, *self, 4, &[]),
            Self::Linux64 => locate_linux(image, markers, *self, 8, &LINUX64_PADDING),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("windows"),
            Self::Linux32 => f.write_str("linux32"),
            Self::Linux64 => f.write_str("linux64"),
        }
    }
}

/// Where the payload sits inside a projector image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedPayload {
    /// Layout the image was built with
    pub layout: Layout,
    /// Length of the runtime image at the start of the file
    pub runtime_len: usize,
    /// Byte range of the payload
    pub payload: Range<usize>,
}

impl LocatedPayload {
    /// The runtime bytes
    pub fn runtime<'a>(&self, image: &'a [u8]) -> &'a [u8] {
        &image[..self.runtime_len]
    }

    /// The payload bytes
    pub fn payload<'a>(&self, image: &'a [u8]) -> &'a [u8] {
        &image[self.payload.clone()]
    }

    /// Payload length in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Tries every layout in [`Layout::DETECTION_ORDER`].
///
/// A projector bundled as the payload of another projector matches more than
/// one layout; the match with the shortest runtime is the outermost one and
/// wins. A length mismatch is reported only if no layout matches at all.
pub fn locate_any(image: &[u8]) -> Result<LocatedPayload> {
    let markers = marker_positions(image);
    let mut best: Option<LocatedPayload> = None;
    let mut mismatch = None;

    for layout in Layout::DETECTION_ORDER {
        match layout.locate_in(image, &markers) {
            Ok(found) => {
                trace!("{} layout matches with {} byte runtime", layout, found.runtime_len);
                if best.as_ref().map_or(true, |b| found.runtime_len < b.runtime_len) {
                    best = Some(found);
                }
            }
            Err(Error::TrailerNotFound) => {}
            Err(e) => {
                trace!("{} layout rejected: {}", layout, e);
                mismatch.get_or_insert(e);
            }
        }
    }

    match best {
        Some(found) => Ok(found),
        None => Err(mismatch.unwrap_or(Error::TrailerNotFound)),
    }
}

fn locate_windows(image: &[u8]) -> Result<LocatedPayload> {
    let trailer = Trailer::parse(image).ok_or(Error::TrailerNotFound)?;
    let available = image.len() - TRAILER_SIZE;
    let len = trailer.payload_len as usize;
    if len > available {
        return Err(Error::length_mismatch(trailer.payload_len as u64, available));
    }

    let start = available - len;
    Ok(LocatedPayload {
        layout: Layout::Windows,
        runtime_len: start,
        payload: start..available,
    })
}

/// Scans for a marker whose preceding length field matches the bytes that
/// follow it. The runtime may itself contain the marker, so every occurrence
/// is checked.
fn locate_linux(
    image: &[u8],
    markers: &[usize],
    layout: Layout,
    field_size: usize,
    padding: &[u8],
) -> Result<LocatedPayload> {
    let mut candidates = 0usize;

    for &marker in markers {
        let Some(runtime_len) = marker.checked_sub(field_size) else {
            continue;
        };
        let payload_start = marker + MAGIC.len() + padding.len();
        if payload_start > image.len() || !image[marker + MAGIC.len()..].starts_with(padding) {
            continue;
        }
        candidates += 1;

        let mut field = &image[runtime_len..marker];
        let declared = if field_size == 8 {
            field.get_u64_le()
        } else {
            field.get_u32_le() as u64
        };
        let available = image.len() - payload_start;

        if declared == available as u64 {
            return Ok(LocatedPayload {
                layout,
                runtime_len,
                payload: payload_start..image.len(),
            });
        }
        trace!(
            "Marker at {} declares {} bytes, {} available",
            marker,
            declared,
            available
        );
    }

    trace!("{} layout: {} marker candidates, none matched", layout, candidates);
    Err(Error::TrailerNotFound)
}

/// Offsets of every magic marker in `image`, found in a single pass
fn marker_positions(image: &[u8]) -> Vec<usize> {
    image
        .windows(MAGIC.len())
        .enumerate()
        .filter(|(_, window)| *window == MAGIC)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RUNTIME: &[u8] = b"\x7fELF-runtime-bytes";
    const PAYLOAD: &[u8] = b"FWS\x0apayload";

    #[test]
    fn test_windows_assemble() {
        let image = Layout::Windows.assemble(&[0u8; 10], &[1, 2, 3]).unwrap();
        let mut expected = vec![0u8; 10];
        expected.extend_from_slice(&[0x01, 0x02, 0x03]);
        expected.extend_from_slice(&[0x56, 0x34, 0x12, 0xFA]);
        expected.extend_from_slice(&[0x03, 0x00, 0x00, 0x00]);
        assert_eq!(image, expected);
        assert_eq!(image.len(), 17);
    }

    #[test]
    fn test_linux32_assemble() {
        let image = Layout::Linux32.assemble(b"RT", b"abc").unwrap();
        assert_eq!(
            image,
            b"RT\x03\x00\x00\x00\x56\x34\x12\xFAabc".to_vec()
        );
    }

    #[test]
    fn test_linux64_assemble() {
        let image = Layout::Linux64.assemble(b"RT", b"abc").unwrap();
        assert_eq!(
            image,
            b"RT\x03\x00\x00\x00\x00\x00\x00\x00\x56\x34\x12\xFA\xFF\xFF\xFF\xFFabc".to_vec()
        );
        assert_eq!(image.len(), 2 + 3 + Layout::Linux64.trailer_len());
    }

    #[test]
    fn test_locate_each_layout() {
        for layout in Layout::DETECTION_ORDER {
            let image = layout.assemble(RUNTIME, PAYLOAD).unwrap();
            let found = layout.locate(&image).unwrap();
            assert_eq!(found.layout, layout);
            assert_eq!(found.runtime(&image), RUNTIME);
            assert_eq!(found.payload(&image), PAYLOAD);

            assert_eq!(locate_any(&image).unwrap(), found);
        }
    }

    #[test]
    fn test_locate_empty_payload() {
        for layout in Layout::DETECTION_ORDER {
            let image = layout.assemble(RUNTIME, &[]).unwrap();
            let found = layout.locate(&image).unwrap();
            assert_eq!(found.payload_len(), 0);
            assert_eq!(found.runtime_len, RUNTIME.len());
        }
    }

    #[test]
    fn test_linux_skips_marker_inside_runtime() {
        let mut runtime = b"head".to_vec();
        runtime.extend_from_slice(&[0x09, 0x00, 0x00, 0x00]);
        runtime.extend_from_slice(&MAGIC);
        runtime.extend_from_slice(b"tail");

        let image = Layout::Linux32.assemble(&runtime, PAYLOAD).unwrap();
        let found = Layout::Linux32.locate(&image).unwrap();
        assert_eq!(found.runtime_len, runtime.len());
        assert_eq!(found.payload(&image), PAYLOAD);
    }

    #[test]
    fn test_locate_any_prefers_outermost_projector() {
        let inner = Layout::Windows.assemble(b"inner-runtime", b"INNER").unwrap();
        let outer = Layout::Linux32.assemble(b"\x7fELF\x01outer", &inner).unwrap();

        // The inner Windows trailer sits at the end of the outer image too
        assert!(Layout::Windows.locate(&outer).is_ok());

        let found = locate_any(&outer).unwrap();
        assert_eq!(found.layout, Layout::Linux32);
        assert_eq!(found.runtime_len, 10);
        assert_eq!(found.payload(&outer), &inner[..]);
        assert_eq!(found.payload_len(), 26);

        let outer = Layout::Windows.assemble(b"MZ-outer", &inner).unwrap();
        let found = locate_any(&outer).unwrap();
        assert_eq!(found.layout, Layout::Windows);
        assert_eq!(found.payload(&outer), &inner[..]);
    }

    #[test]
    fn test_locate_any_nested_linux64() {
        let inner = Layout::Linux32.assemble(b"\x7fELF\x01inner", PAYLOAD).unwrap();
        let outer = Layout::Linux64.assemble(b"\x7fELF\x02outer", &inner).unwrap();

        let found = locate_any(&outer).unwrap();
        assert_eq!(found.layout, Layout::Linux64);
        assert_eq!(found.payload(&outer), &inner[..]);
    }

    #[test]
    fn test_windows_length_mismatch() {
        let mut image = b"tiny".to_vec();
        image.extend_from_slice(&Trailer { payload_len: 100 }.to_bytes());
        let err = Layout::Windows.locate(&image).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                declared: 100,
                available: 4
            }
        ));
        assert!(matches!(
            locate_any(&image).unwrap_err(),
            Error::LengthMismatch { .. }
        ));
    }

    #[test]
    fn test_no_trailer() {
        let image = b"plain executable without any trailer".to_vec();
        for layout in Layout::DETECTION_ORDER {
            assert!(matches!(layout.locate(&image), Err(Error::TrailerNotFound)));
        }
        assert!(matches!(locate_any(&image), Err(Error::TrailerNotFound)));
        assert!(matches!(locate_any(&[]), Err(Error::TrailerNotFound)));
    }

    #[test]
    fn test_for_runtime() {
        assert_eq!(Layout::for_runtime(RuntimeFormat::Pe), Layout::Windows);
        assert_eq!(Layout::for_runtime(RuntimeFormat::Elf32), Layout::Linux32);
        assert_eq!(Layout::for_runtime(RuntimeFormat::Elf64), Layout::Linux64);
        assert_eq!(Layout::for_runtime(RuntimeFormat::Unknown), Layout::Windows);
    }
}
