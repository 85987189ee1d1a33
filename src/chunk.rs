use serde::Serialize;

/// A passage of source text with its provenance.
///
/// Stored in the metadata artifact as the byte length of `source_id` (u32,
/// little endian), then `source_id`, then `text`.
///
/// # Examples
///
/// ```
/// use ragrank::Chunk;
///
/// let chunk = Chunk::new("paper.txt", "Attention is all you need.");
/// let bytes = chunk.serialize().unwrap();
/// assert_eq!(Chunk::deserialize(&bytes), Some(chunk));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Chunk {
    pub source_id: String,
    pub text: String,
}

impl Chunk {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }

    /// Serialize to bytes for the metadata table.
    ///
    /// Returns `None` if `source_id` is longer than `u32::MAX` bytes.
    pub fn serialize(&self) -> Option<Vec<u8>> {
        let id_len = u32::try_from(self.source_id.len()).ok()?;
        let mut bytes =
            Vec::with_capacity(4 + self.source_id.len() + self.text.len());
        bytes.extend_from_slice(&id_len.to_le_bytes());
        bytes.extend_from_slice(self.source_id.as_bytes());
        bytes.extend_from_slice(self.text.as_bytes());
        Some(bytes)
    }

    /// Deserialize from bytes. Returns `None` if the format is invalid.
    pub fn deserialize(bytes: &[u8]) -> Option<Self> {
        let (prefix, rest) = bytes.split_first_chunk::<4>()?;
        let id_len = u32::from_le_bytes(*prefix) as usize;
        if id_len > rest.len() {
            return None;
        }
        let (source_id, text) = rest.split_at(id_len);
        Some(Self::new(
            std::str::from_utf8(source_id).ok()?,
            std::str::from_utf8(text).ok()?,
        ))
    }
}

/// A chunk under consideration for reranking, with the embedding to score it
/// by.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub score: f32,
}

impl Candidate {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            chunk,
            vector,
            score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(chunk: &Chunk) -> Option<Chunk> {
        Chunk::deserialize(&chunk.serialize().unwrap())
    }

    #[test]
    fn text_may_contain_nul() {
        let chunk = Chunk::new("a.txt", "before\0after");
        assert_eq!(roundtrip(&chunk), Some(chunk));
    }

    #[test]
    fn source_id_may_contain_nul() {
        let chunk = Chunk::new("a\0b", "text");
        let restored = roundtrip(&chunk).unwrap();
        assert_eq!(restored.source_id, "a\0b");
        assert_eq!(restored.text, "text");
    }

    #[test]
    fn truncated_bytes_are_invalid() {
        assert_eq!(Chunk::deserialize(&[5, 0]), None);
        assert_eq!(Chunk::deserialize(&[5, 0, 0, 0, b'a', b'b']), None);
    }

    #[test]
    fn invalid_utf8_is_invalid() {
        assert_eq!(Chunk::deserialize(&[1, 0, 0, 0, 0xff, 0x41]), None);
        assert_eq!(Chunk::deserialize(&[1, 0, 0, 0, 0x41, 0xff]), None);
    }

    #[test]
    fn empty_fields_survive() {
        let chunk = Chunk::new("", "");
        assert_eq!(roundtrip(&chunk), Some(chunk));
    }
}
