//! Configuration for indexing and answering.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Chunk sizes offered to interactive users, in characters.
pub const CHUNK_SIZE_RANGE: RangeInclusive<usize> = 500..=2000;

/// Chunk overlaps offered to interactive users, in characters.
pub const CHUNK_OVERLAP_RANGE: RangeInclusive<usize> = 0..=400;

/// Retrieval counts offered to interactive users.
pub const TOP_K_RANGE: RangeInclusive<usize> = 2..=8;

/// Which splitting strategy builds the chunks of an index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Break at paragraph, line, sentence, then word boundaries.
    #[default]
    Recursive,
    /// Hard character cuts with a constant stride.
    FixedSize,
}

/// Configuration parameters for building an index and answering from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Upper bound on generated tokens per answer.
    pub max_new_tokens: u32,
    /// Upper bound on the rendered context block, in characters.
    pub max_context_chars: usize,
    /// Splitting strategy.
    pub strategy: ChunkingStrategy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
            top_k: 4,
            max_new_tokens: 256,
            max_context_chars: 12_000,
            strategy: ChunkingStrategy::Recursive,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check the structural invariants every config must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `max_new_tokens == 0` or `max_context_chars == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.max_new_tokens == 0 {
            return Err(RagError::ConfigError(
                "max_new_tokens must be greater than zero".to_string(),
            ));
        }
        if self.max_context_chars == 0 {
            return Err(RagError::ConfigError(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Check that the user-tunable knobs fall inside the interactive ranges
    /// ([`CHUNK_SIZE_RANGE`], [`CHUNK_OVERLAP_RANGE`], [`TOP_K_RANGE`]).
    pub fn check_interactive_bounds(&self) -> Result<()> {
        check_range("chunk_size", self.chunk_size, &CHUNK_SIZE_RANGE)?;
        check_range("chunk_overlap", self.chunk_overlap, &CHUNK_OVERLAP_RANGE)?;
        check_top_k(self.top_k)
    }
}

/// Check a per-question retrieval count against [`TOP_K_RANGE`].
pub fn check_top_k(top_k: usize) -> Result<()> {
    check_range("top_k", top_k, &TOP_K_RANGE)
}

fn check_range(name: &str, value: usize, range: &RangeInclusive<usize>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(RagError::ConfigError(format!(
            "{name} ({value}) must be between {} and {}",
            range.start(),
            range.end()
        )))
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the generation length limit.
    pub fn max_new_tokens(mut self, tokens: u32) -> Self {
        self.config.max_new_tokens = tokens;
        self
    }

    /// Set the context block budget in characters.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the chunking strategy.
    pub fn strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_interactive() {
        let config = RagConfig::default();
        config.validate().unwrap();
        config.check_interactive_bounds().unwrap();
    }

    #[test]
    fn overlap_not_below_size_is_rejected() {
        let err = RagConfig::builder().chunk_size(500).chunk_overlap(500).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(ref msg) if msg.contains("chunk_overlap")));

        let err = RagConfig::builder().chunk_size(500).chunk_overlap(900).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().max_new_tokens(0).build().is_err());
        assert!(RagConfig::builder().max_context_chars(0).build().is_err());
    }

    #[test]
    fn interactive_bounds() {
        let config = RagConfig::builder().chunk_size(300).chunk_overlap(50).build().unwrap();
        assert!(config.check_interactive_bounds().is_err());

        let config = RagConfig::builder().chunk_size(2000).chunk_overlap(400).top_k(8).build();
        config.unwrap().check_interactive_bounds().unwrap();

        assert!(check_top_k(1).is_err());
        assert!(check_top_k(9).is_err());
        assert!(check_top_k(2).is_ok());
    }
}
