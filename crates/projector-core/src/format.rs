//! Sniffing of runtime executables and payload files.

use bytes::Buf;
use std::fmt;

/// Offset of the PE header pointer in the DOS stub
const PE_POINTER_OFFSET: usize = 0x3C;

/// ELF identification bytes
const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Offset of the EI_CLASS byte in an ELF header
const ELF_CLASS_OFFSET: usize = 4;

/// Executable format of a runtime image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFormat {
    /// Windows Portable Executable
    Pe,
    /// 32-bit ELF
    Elf32,
    /// 64-bit ELF
    Elf64,
    /// Anything else
    Unknown,
}

impl RuntimeFormat {
    /// Detects the executable format from the leading bytes of an image
    pub fn detect(image: &[u8]) -> Self {
        if image.starts_with(b"MZ") && has_pe_header(image) {
            return Self::Pe;
        }
        if image.starts_with(&ELF_MAGIC) {
            return match image.get(ELF_CLASS_OFFSET) {
                Some(1) => Self::Elf32,
                Some(2) => Self::Elf64,
                _ => Self::Unknown,
            };
        }
        Self::Unknown
    }

    /// Conventional file kind for this format
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pe => "EXE",
            Self::Elf32 | Self::Elf64 => "ELF",
            Self::Unknown => "binary",
        }
    }
}

impl fmt::Display for RuntimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pe => f.write_str("PE"),
            Self::Elf32 => f.write_str("ELF32"),
            Self::Elf64 => f.write_str("ELF64"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

fn has_pe_header(image: &[u8]) -> bool {
    let Some(mut pointer) = image.get(PE_POINTER_OFFSET..PE_POINTER_OFFSET + 4) else {
        return false;
    };
    let offset = pointer.get_u32_le() as usize;
    image
        .get(offset..)
        .map(|header| header.starts_with(b"PE"))
        .unwrap_or(false)
}

/// Compression used by an SWF movie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwfCompression {
    /// `FWS`
    None,
    /// `CWS`
    Zlib,
    /// `ZWS`
    Lzma,
}

/// Kind of payload, as far as its signature reveals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Flash movie
    Swf {
        /// Body compression
        compression: SwfCompression,
        /// SWF version byte
        version: u8,
    },
    /// Unrecognized content
    Unknown,
}

impl PayloadKind {
    /// Detects the payload kind from its leading bytes
    pub fn detect(payload: &[u8]) -> Self {
        let compression = match payload.get(..3) {
            Some(b"FWS") => SwfCompression::None,
            Some(b"CWS") => SwfCompression::Zlib,
            Some(b"ZWS") => SwfCompression::Lzma,
            _ => return Self::Unknown,
        };
        Self::Swf {
            compression,
            version: payload.get(3).copied().unwrap_or(0),
        }
    }

    /// Returns true for SWF payloads
    pub fn is_swf(&self) -> bool {
        matches!(self, Self::Swf { .. })
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swf {
                compression,
                version,
            } => {
                let compression = match compression {
                    SwfCompression::None => "uncompressed",
                    SwfCompression::Zlib => "zlib",
                    SwfCompression::Lzma => "LZMA",
                };
                write!(f, "SWF v{} ({})", version, compression)
            }
            Self::Unknown => f.write_str("unknown"),
        }
    }
}
