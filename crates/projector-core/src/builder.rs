//! Assembly of projector executables.
//!
//! A projector is a runtime loader with a payload and a trailer appended to
//! it. The runtime is copied verbatim; nothing inside it is patched.
//!
//! ```no_run
//! use projector_core::{Layout, ProjectorBuilder};
//!
//! let report = ProjectorBuilder::new()
//!     .layout(Layout::Windows)
//!     .build_file("flashplayer_sa.exe", "movie.swf", "movie.exe")?;
//! println!("wrote {} bytes", report.output_len);
//! # Ok::<(), projector_core::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::files;
use crate::format::{PayloadKind, RuntimeFormat};
use crate::layout::Layout;
use std::path::Path;
use tracing::{debug, info};

/// Builds projector images from a runtime and a payload
#[derive(Debug, Clone)]
pub struct ProjectorBuilder {
    /// Fixed layout, or `None` to pick one from the runtime format
    layout: Option<Layout>,
    overwrite: bool,
    preserve_permissions: bool,
}

impl Default for ProjectorBuilder {
    fn default() -> Self {
        Self {
            layout: Some(Layout::Windows),
            overwrite: true,
            preserve_permissions: true,
        }
    }
}

/// Summary of a finished build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Layout used for the output
    pub layout: Layout,
    /// Detected runtime format
    pub runtime_format: RuntimeFormat,
    /// Detected payload kind
    pub payload_kind: PayloadKind,
    /// Bytes of runtime copied
    pub runtime_len: usize,
    /// Bytes of payload copied
    pub payload_len: usize,
    /// Total bytes written
    pub output_len: usize,
}

impl ProjectorBuilder {
    /// Creates a builder using the Windows layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed layout
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Picks the layout from the runtime's executable format
    pub fn auto_layout(mut self) -> Self {
        self.layout = None;
        self
    }

    /// Whether an existing output file may be replaced (default: true)
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Whether the output copies the runtime's permission bits (default: true)
    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// Layout that will be used for the given runtime
    pub fn resolve_layout(&self, runtime: &[u8]) -> Layout {
        self.layout
            .unwrap_or_else(|| Layout::for_runtime(RuntimeFormat::detect(runtime)))
    }

    /// Assembles a projector image in memory
    pub fn build(&self, runtime: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let layout = self.resolve_layout(runtime);
        debug!(
            "Assembling {} byte runtime and {} byte payload ({} layout)",
            runtime.len(),
            payload.len(),
            layout
        );
        layout.assemble(runtime, payload)
    }

    /// Reads runtime and payload from disk and writes the projector to `output`.
    ///
    /// Inputs are read, and the payload size validated, before the output is
    /// touched.
    pub fn build_file(
        &self,
        runtime_path: impl AsRef<Path>,
        payload_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<BuildReport> {
        let (runtime_path, payload_path, output_path) =
            (runtime_path.as_ref(), payload_path.as_ref(), output_path.as_ref());

        let runtime = files::read_file(runtime_path)?;
        let runtime_format = RuntimeFormat::detect(&runtime);
        let layout = self.resolve_layout(&runtime);
        debug!(
            "Runtime {} is {} ({} layout)",
            runtime_path.display(),
            runtime_format,
            layout
        );

        // Reject oversized payloads before pulling them into memory
        let payload_size = files::file_len(payload_path)?;
        if payload_size > layout.max_payload_len() {
            return Err(Error::PayloadTooLarge {
                len: payload_size,
                max: layout.max_payload_len(),
            });
        }

        let payload = files::read_file(payload_path)?;
        let payload_kind = PayloadKind::detect(&payload);
        debug!("Payload {} is {}", payload_path.display(), payload_kind);

        let image = layout.assemble(&runtime, &payload)?;

        let permissions = if self.preserve_permissions {
            Some(files::file_permissions(runtime_path)?)
        } else {
            None
        };
        files::write_atomic(output_path, &image, self.overwrite, permissions)?;

        info!(
            "Wrote {} {} ({} bytes)",
            runtime_format.label(),
            output_path.display(),
            image.len()
        );

        Ok(BuildReport {
            layout,
            runtime_format,
            payload_kind,
            runtime_len: runtime.len(),
            payload_len: payload.len(),
            output_len: image.len(),
        })
    }
}
