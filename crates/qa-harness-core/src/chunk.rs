//! Overlapping, sentence-aware text chunker.
//!
//! Splits extracted document text into fixed-size character windows that
//! overlap by a configurable amount, so a rule that straddles a window
//! boundary is still fully contained in at least one chunk.
//!
//! # Algorithm
//!
//! 1. Take a window `[start, start + chunk_size)` (clamped to the text).
//! 2. If the window does not reach the end of the text, find the last `.`
//!    or `\n` inside it. When that character lies past the window midpoint
//!    (`start + chunk_size / 2`), end the window just after it.
//! 3. Emit the trimmed window text as a chunk (whitespace-only windows are
//!    skipped).
//! 4. Continue from `end - overlap`; stop after the window that reaches the
//!    end of the text.
//!
//! Offsets are character offsets, not byte offsets.
//!
//! # Example
//!
//! ```rust
//! use qa_harness_core::chunk::{chunk_text, ChunkOptions};
//!
//! let chunks = chunk_text("Discount codes are case-insensitive.", "faq.md", &ChunkOptions::default()).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].metadata.chunk_index, 0);
//! ```

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, ChunkMetadata};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;

/// Window size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkOptions {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let options = Self {
            chunk_size,
            overlap,
        };
        options.validate()?;
        Ok(options)
    }

    /// The window loop only advances when `overlap < chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if self.overlap >= self.chunk_size {
            bail!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

/// Split `text` into overlapping chunks tagged with `source`.
///
/// Returns an empty vector for empty or whitespace-only text. Chunk indices
/// are contiguous from 0 in emission order.
///
/// # Errors
///
/// Returns an error if `options` would not let the window loop advance.
pub fn chunk_text(text: &str, source: &str, options: &ChunkOptions) -> Result<Vec<Chunk>> {
    options.validate()?;

    let chars: Vec<char> = text.chars().collect();
    // Byte offset of every char position, plus one past the end.
    let byte_at: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = chars.len();
    let half = options.chunk_size / 2;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + options.chunk_size).min(len);

        if end < len {
            let last_break = chars[start..end]
                .iter()
                .rposition(|&c| c == '.' || c == '\n')
                .map(|rel| start + rel);
            if let Some(brk) = last_break {
                if brk > start + half && brk + 1 > start + options.overlap {
                    end = brk + 1;
                }
            }
        }

        let piece = text[byte_at[start]..byte_at[end]].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(source, chunks.len() as i64, piece, start, end));
        }

        if end >= len {
            break;
        }
        start = end - options.overlap;
    }

    Ok(chunks)
}

fn make_chunk(source: &str, index: i64, text: &str, start: usize, end: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        text: text.to_string(),
        hash,
        metadata: ChunkMetadata {
            source: source.to_string(),
            chunk_index: index,
            start_char: start,
            end_char: end,
        },
    }
}
