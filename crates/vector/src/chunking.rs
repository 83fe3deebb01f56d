use serde::{Deserialize, Serialize};

/// Chunking policy for splitting a file's text content into overlapping windows
/// before embedding. Sizes are measured in characters, which stand in for
/// tokens per the default policy (1000/200 characters when unspecified).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingPolicy {
    pub max_chunk_size_tokens: u32,
    pub chunk_overlap_tokens: u32,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            max_chunk_size_tokens: 1000,
            chunk_overlap_tokens: 200,
        }
    }
}

impl From<&config::ChunkingConfig> for ChunkingPolicy {
    fn from(config: &config::ChunkingConfig) -> Self {
        Self {
            max_chunk_size_tokens: config.max_chunk_size_tokens,
            chunk_overlap_tokens: config.chunk_overlap_tokens,
        }
    }
}

/// Splits `content` into overlapping chunks according to `policy`.
///
/// Empty input produces no chunks. A chunk size of zero is treated as "no
/// splitting" (the whole content as one chunk) to avoid an infinite loop.
pub fn chunk(content: &str, policy: ChunkingPolicy) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let max = policy.max_chunk_size_tokens as usize;
    if max == 0 || max >= chars.len() {
        return vec![content.to_string()];
    }

    let overlap = (policy.chunk_overlap_tokens as usize).min(max.saturating_sub(1));
    let step = max - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + max).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_yields_single_chunk() {
        let policy = ChunkingPolicy::default();
        assert_eq!(chunk("hello world", policy), vec!["hello world".to_string()]);
    }

    #[test]
    fn long_content_overlaps() {
        let policy = ChunkingPolicy {
            max_chunk_size_tokens: 10,
            chunk_overlap_tokens: 4,
        };
        let content = "a".repeat(25);
        let chunks = chunk(&content, policy);

        assert!(chunks.len() > 1);
        for window in chunks.windows(1) {
            assert!(window[0].len() <= 10);
        }
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        assert!(chunk("", ChunkingPolicy::default()).is_empty());
    }
}
