//! crates/docchat_core/src/chunker.rs
//!
//! Splits extracted text into overlapping fixed-width windows for embedding.

use crate::ports::{PortError, PortResult};

/// Window width and overlap, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkConfig {
    /// Creates a validated configuration.
    pub fn new(chunk_size: usize, overlap: usize) -> PortResult<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fails with `InvalidChunkConfig` when the window could never advance.
    pub fn validate(&self) -> PortResult<()> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(PortError::InvalidChunkConfig {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Slides a `chunk_size` window over `text`, advancing by `chunk_size - overlap`.
///
/// Consecutive chunks share exactly `overlap` characters and the last chunk may be
/// shorter than `chunk_size`. Empty text yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> PortResult<Vec<String>> {
    config.validate()?;

    // Byte offset of every char boundary, including the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + config.chunk_size).min(char_count);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        if end == char_count {
            break;
        }
        start += config.stride();
    }
    Ok(chunks)
}
