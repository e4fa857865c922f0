use std::{
    collections::HashSet,
    io::{Cursor, Write},
};

use anyhow::Context;

use crate::error::{LogomarkError, LogomarkResult};

/// Download name for the finished bundle.
pub const ARCHIVE_FILE_NAME: &str = "images_with_logo.zip";

/// Accumulates named byte buffers and produces one deflate-compressed ZIP.
///
/// Entry names must be unique; [`ArchiveBuilder::finalize`] consumes the
/// builder, so entries after finalize are impossible by construction.
pub struct ArchiveBuilder {
    writer: zip::ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: zip::ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
        }
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Append one named entry.
    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> LogomarkResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(LogomarkError::duplicate_entry(name));
        }

        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        self.writer
            .start_file(name, options)
            .with_context(|| format!("begin archive entry '{name}'"))?;
        self.writer
            .write_all(bytes)
            .with_context(|| format!("write archive entry '{name}'"))?;
        Ok(())
    }

    /// Produce the final compressed bundle.
    pub fn finalize(self) -> LogomarkResult<Vec<u8>> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| LogomarkError::archive_finalize(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
