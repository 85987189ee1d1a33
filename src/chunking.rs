//! Splitting documents into overlapping word windows.
//!
//! Each window holds up to `chunk_size` whitespace-separated words and the
//! next window starts `chunk_size - overlap` words later, so neighbouring
//! windows share `overlap` words. Windows shorter than `min_words` are
//! dropped; with the defaults that discards fragments of 50 words or fewer,
//! which are mostly headers, captions and tails of documents.

use crate::error::{Error, Result};

/// Default window length in words.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Default number of words shared by adjacent windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Default minimum window length in words.
pub const DEFAULT_MIN_WORDS: usize = 51;

/// Word-window settings.
///
/// # Examples
///
/// ```
/// use ragrank::chunking::{ChunkingConfig, chunk_words};
///
/// let config = ChunkingConfig { chunk_size: 4, overlap: 1, min_words: 2 };
/// let chunks = chunk_words("a b c d e f g", &config).unwrap();
/// assert_eq!(chunks, vec!["a b c d", "d e f g"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            min_words: DEFAULT_MIN_WORDS,
        }
    }
}

impl ChunkingConfig {
    /// Number of words between the starts of adjacent windows.
    pub fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk size must be at least 1 word".into(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split text into overlapping word windows joined by single spaces.
///
/// Windows start at word 0 and every [`ChunkingConfig::stride`] words after
/// it while the start is still inside the text. A window is kept iff it has
/// at least `min_words` words.
pub fn chunk_words(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = config.stride();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        let window = &words[start..end];
        if window.len() >= config.min_words {
            chunks.push(window.join(" "));
        }
        start += stride;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn config(
        chunk_size: usize,
        overlap: usize,
        min_words: usize,
    ) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
            min_words,
        }
    }

    #[test]
    fn defaults() {
        let config = ChunkingConfig::default();
        assert_eq!(config, self::config(400, 50, 51));
        assert_eq!(config.stride(), 350);
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks =
            chunk_words("one two  three\nfour", &config(10, 2, 1)).unwrap();
        assert_eq!(chunks, vec!["one two three four"]);
    }

    #[test]
    fn windows_overlap_by_configured_words() {
        let chunks = chunk_words(&words(10), &config(4, 1, 1)).unwrap();
        assert_eq!(
            chunks,
            vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9", "w9"]
        );
    }

    #[test]
    fn short_windows_are_dropped() {
        let chunks = chunk_words(&words(10), &config(4, 1, 2)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.split(' ').count() == 4));
    }

    #[test]
    fn fifty_words_or_fewer_are_discarded_by_default() {
        let config = ChunkingConfig::default();
        assert!(chunk_words(&words(50), &config).unwrap().is_empty());
        assert_eq!(chunk_words(&words(51), &config).unwrap().len(), 1);
    }

    #[test]
    fn default_windows_over_long_text() {
        // Starts at 0, 350, 700: lengths 400, 400, 300.
        let chunks =
            chunk_words(&words(1000), &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("w0 "));
        assert!(chunks[1].starts_with("w350 "));
        assert!(chunks[2].starts_with("w700 "));
        assert!(chunks[2].ends_with(" w999"));
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_words("  \n\t", &config(4, 1, 1)).unwrap().is_empty());
    }

    #[test]
    fn zero_chunk_size_is_invalid() {
        assert!(matches!(
            chunk_words("a b", &config(0, 0, 1)),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(matches!(
            chunk_words("a b", &config(3, 3, 1)),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
