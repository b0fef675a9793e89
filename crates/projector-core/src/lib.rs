//! # projector-core
//!
//! A library for building standalone "projector" executables: a prebuilt
//! runtime loader with a payload and a small trailer record appended.
//!
//! This crate provides the core functionality for:
//! - Encoding the trailer the runtime loader reads to find its payload
//! - Assembling runtime, payload and trailer in the layout a runtime expects
//! - Locating and extracting the payload of a finished projector
//!
//! ## Architecture
//!
//! - [`trailer`]: The magic marker and little-endian length field
//! - [`layout`]: Windows and Linux arrangements of runtime, payload and trailer
//! - [`builder`]: Reading inputs and writing the projector
//! - [`extract`]: Recovering payloads from projectors
//! - [`format`]: Executable and payload signature sniffing
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use projector_core::{Extractor, ProjectorBuilder};
//!
//! let runtime = vec![0u8; 10];
//! let image = ProjectorBuilder::new().build(&runtime, &[0x01, 0x02, 0x03])?;
//!
//! assert_eq!(image.len(), 10 + 3 + 8);
//! assert_eq!(&image[13..], &[0x56, 0x34, 0x12, 0xFA, 0x03, 0x00, 0x00, 0x00]);
//! assert_eq!(Extractor::new().extract(&image)?, &[0x01, 0x02, 0x03]);
//! # Ok::<(), projector_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod builder;
pub mod error;
pub mod extract;
mod files;
pub mod format;
pub mod layout;
pub mod trailer;

// Re-export primary types for convenience
pub use builder::{BuildReport, ProjectorBuilder};
pub use error::{Error, Result};
pub use extract::{ExtractReport, Extractor};
pub use files::read_file;
pub use format::{PayloadKind, RuntimeFormat, SwfCompression};
pub use layout::{Layout, LocatedPayload};
pub use trailer::{Trailer, MAGIC};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
