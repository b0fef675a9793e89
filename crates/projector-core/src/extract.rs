//! Recovery of payloads from finished projectors.

use crate::error::{Error, Result};
use crate::files;
use crate::format::PayloadKind;
use crate::layout::{self, Layout, LocatedPayload};
use std::path::Path;
use tracing::{debug, info};

/// Finds and extracts the payload of a projector image
#[derive(Debug, Clone)]
pub struct Extractor {
    layout: Option<Layout>,
    require_swf: bool,
    overwrite: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            layout: None,
            require_swf: false,
            overwrite: true,
        }
    }
}

/// Summary of a finished extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    /// Where the payload was found
    pub located: LocatedPayload,
    /// Detected payload kind
    pub payload_kind: PayloadKind,
}

impl Extractor {
    /// Creates an extractor that tries every layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept images built with `layout`
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Reject payloads without an SWF signature
    pub fn require_swf(mut self, require: bool) -> Self {
        self.require_swf = require;
        self
    }

    /// Whether an existing output file may be replaced (default: true)
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Finds the payload in `image`
    pub fn locate(&self, image: &[u8]) -> Result<LocatedPayload> {
        let located = match self.layout {
            Some(layout) => layout.locate(image)?,
            None => layout::locate_any(image)?,
        };
        debug!(
            "Located {} byte payload at {}..{} ({} layout)",
            located.payload_len(),
            located.payload.start,
            located.payload.end,
            located.layout
        );

        if self.require_swf {
            let payload = located.payload(image);
            if !PayloadKind::detect(payload).is_swf() {
                return Err(Error::NotSwf {
                    found: payload.iter().take(3).copied().collect(),
                });
            }
        }

        Ok(located)
    }

    /// Returns the payload bytes of `image`
    pub fn extract<'a>(&self, image: &'a [u8]) -> Result<&'a [u8]> {
        let located = self.locate(image)?;
        Ok(located.payload(image))
    }

    /// Reads a projector from disk and writes its payload to `output`
    pub fn extract_file(
        &self,
        image_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<ExtractReport> {
        let (image_path, output_path) = (image_path.as_ref(), output_path.as_ref());

        let image = files::read_file(image_path)?;
        let located = self.locate(&image)?;
        let payload = located.payload(&image);
        let payload_kind = PayloadKind::detect(payload);

        let permissions = files::data_permissions(files::file_permissions(image_path)?);
        files::write_atomic(output_path, payload, self.overwrite, Some(permissions))?;

        info!(
            "Extracted {} ({} bytes) to {}",
            payload_kind,
            payload.len(),
            output_path.display()
        );

        Ok(ExtractReport {
            located,
            payload_kind,
        })
    }
}
