//! Scoped output streams.
//!
//! Content goes to a temp file next to the target and replaces it only on
//! [`OutputStream::finish`]. A stream dropped any other way deletes its temp file and
//! marks the output invalid, so half-written content is never recorded.

use super::BuildContext;
use crate::config::TEMP_PREFIX;
use crate::error::BuildError;
use crate::resource::hasher::short_hex;
use crate::resource::ResourceStat;
use crate::types::ResourceId;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub struct OutputStream<'a> {
    ctx: &'a BuildContext,
    id: ResourceId,
    writer: Option<BufWriter<NamedTempFile>>,
}

impl<'a> OutputStream<'a> {
    pub(crate) fn open(ctx: &'a BuildContext, id: ResourceId) -> Result<Self, BuildError> {
        let parent = match id.path().parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&parent)?;
        ctx.begin_write(&id)?;
        debug!(output = %id, "Opened output stream");
        Ok(Self {
            ctx,
            id,
            writer: Some(BufWriter::new(temp)),
        })
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Flush, sync and move the content into place, then record the output as valid.
    pub fn finish(mut self) -> Result<(), BuildError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        match self.commit(writer) {
            Ok(stat) => {
                debug!(
                    output = %self.id,
                    size = stat.size,
                    digest = ?stat.digest.as_ref().map(short_hex),
                    "Finalized output"
                );
                self.ctx.finish_write(&self.id, stat);
                Ok(())
            }
            Err(e) => {
                warn!(output = %self.id, error = %e, "Failed to finalize output");
                self.ctx.discard_write(&self.id);
                Err(e)
            }
        }
    }

    fn commit(&self, writer: BufWriter<NamedTempFile>) -> Result<ResourceStat, BuildError> {
        let temp = writer.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        temp.persist(self.id.path()).map_err(|e| e.error)?;
        ResourceStat::capture(self.id.path(), self.ctx.digests_enabled())?
            .ok_or_else(|| BuildError::invalid(self.id.path(), "missing after finalize"))
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<NamedTempFile>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "output stream already closed"))
    }
}

impl Write for OutputStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for OutputStream<'_> {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            warn!(output = %self.id, "Output stream dropped without finish; output discarded");
            self.ctx.discard_write(&self.id);
        }
    }
}
