//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`]: breaks at paragraph, line, sentence, then word
//!   boundaries, hard-cutting only when no boundary fits
//! - [`FixedSizeChunker`]: hard character cuts with a constant stride
//!
//! Both measure sizes in characters, never split inside a UTF-8 sequence, and
//! guarantee that consecutive windows overlap by at least `chunk_overlap`
//! characters.

use std::ops::Range;

use crate::config::{ChunkingStrategy, RagConfig};
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Boundaries tried by [`RecursiveChunker`], largest unit first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "? ", "! ", " "];

/// How far back a window start may move to land on the start of a word.
const WORD_SNAP_WINDOW: usize = 40;

/// A strategy for splitting text into overlapping windows.
pub trait Chunker: Send + Sync {
    /// Split `text` into byte ranges, in order.
    ///
    /// Every range lies on character boundaries, covers at most
    /// `chunk_size` characters, and overlaps the next range by at least
    /// `chunk_overlap` characters. The ranges jointly cover the whole text.
    /// Returns an empty `Vec` for empty text.
    fn spans(&self, text: &str) -> Vec<Range<usize>>;

    /// Split `text` into owned passages.
    fn split_text(&self, text: &str) -> Vec<String> {
        self.spans(text).into_iter().map(|span| text[span].to_string()).collect()
    }
}

fn check_params(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ChunkingError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ChunkingError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Byte offsets of every character boundary in `text`, including `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Splits text into fixed-size windows by character count.
///
/// # Example
///
/// ```rust,ignore
/// use chatdoc_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(1000, 150)?;
/// let passages = chunker.split_text(&text);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_params(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let bounds = char_boundaries(text);
        let total = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + self.chunk_size).min(total);
            spans.push(bounds[start]..bounds[end]);
            if end == total {
                break;
            }
            start += step;
        }
        spans
    }
}

/// Splits text at the largest natural boundary that fits each window.
///
/// For every window the chunker tries paragraph breaks, then line breaks,
/// then sentence ends, then spaces. A boundary only counts if the chunk it
/// closes keeps at least half the window and is longer than the overlap, so
/// chunks stay reasonably full and the scan always advances. Without a usable
/// boundary the window is cut at exactly `chunk_size` characters.
///
/// The next window begins `chunk_overlap` characters before the previous end,
/// moved back to the start of a word when one is close by.
///
/// # Example
///
/// ```rust,ignore
/// use chatdoc_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 150)?;
/// let passages = chunker.split_text(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_params(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Pick the end (in characters) of the window starting at `start`.
    ///
    /// `limit` is `start + chunk_size` and lies strictly before the end of text.
    fn break_point(&self, text: &str, bounds: &[usize], start: usize, limit: usize) -> usize {
        let min_end = start + (self.chunk_overlap + 1).max(self.chunk_size / 2);
        let window = &text[bounds[start]..bounds[limit]];

        for separator in SEPARATORS {
            let Some(offset) = window.rfind(separator) else {
                continue;
            };
            let byte_end = bounds[start] + offset + separator.len();
            // Separators are ASCII, so the byte after one is always a boundary.
            if let Ok(end) = bounds.binary_search(&byte_end) {
                if end >= min_end {
                    return end;
                }
            }
        }
        limit
    }

    /// Pick the start (in characters) of the window following `start..end`.
    fn next_start(&self, text: &str, bounds: &[usize], start: usize, end: usize) -> usize {
        let target = end - self.chunk_overlap;
        if self.chunk_overlap == 0 {
            return target;
        }

        let floor = (start + 1).max(target.saturating_sub(WORD_SNAP_WINDOW));
        if floor >= target {
            return target;
        }
        let region = &text[bounds[floor]..bounds[target]];
        match region.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
            Some((offset, c)) => {
                let byte_after = bounds[floor] + offset + c.len_utf8();
                bounds.binary_search(&byte_after).unwrap_or(target)
            }
            None => target,
        }
    }
}

impl Chunker for RecursiveChunker {
    fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let bounds = char_boundaries(text);
        let total = bounds.len() - 1;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < total {
            let limit = start + self.chunk_size;
            let end = if limit >= total {
                total
            } else {
                self.break_point(text, &bounds, start, limit)
            };
            spans.push(bounds[start]..bounds[end]);
            if end == total {
                break;
            }
            start = self.next_start(text, &bounds, start, end);
        }
        spans
    }
}

/// Build the chunker selected by `config`.
pub fn chunker_for(config: &RagConfig) -> Result<Box<dyn Chunker>> {
    Ok(match config.strategy {
        ChunkingStrategy::Recursive => {
            Box::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?)
        }
        ChunkingStrategy::FixedSize => {
            Box::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?)
        }
    })
}

/// Split every document into chunks and number them.
///
/// Chunk IDs start at zero and increase by one across all documents, in
/// document order. Each chunk copies its document's source, page and
/// metadata. Whitespace-only windows are skipped.
pub fn chunk_documents(documents: &[Document], chunker: &dyn Chunker) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for document in documents {
        for span in chunker.spans(&document.text) {
            let text = &document.text[span];
            if text.trim().is_empty() {
                continue;
            }
            chunks.push(Chunk {
                chunk_id: chunks.len(),
                text: text.to_string(),
                source: document.source.clone(),
                page: document.page,
                metadata: document.metadata.clone(),
            });
        }
    }
    chunks
}
