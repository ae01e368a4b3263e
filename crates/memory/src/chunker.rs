/// Sentence-boundary chunking and mean pooling for oversized embedding input.
use {
    chrono::{DateTime, Utc},
    sha2::{Digest, Sha256},
};

/// An ephemeral text segment produced while splitting an oversized document.
/// Chunks are never persisted; only the pooled vector survives.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Content-derived id (sha256 prefix of the text).
    pub id: String,
    pub text: String,
    pub meta: ChunkMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMeta {
    /// Source page, when the caller knows it.
    pub url: Option<String>,
    /// Position of this chunk within the document.
    pub index: usize,
    pub captured_at: DateTime<Utc>,
}

/// Size bounds for [`split_sentences`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkPolicy {
    /// Byte threshold a chunk should stay under.
    pub max_bytes: usize,
    /// A chunk must pass this size before the threshold closes it.
    pub min_bytes: usize,
}

impl ChunkPolicy {
    /// Policy derived from a provider request-size limit.
    pub fn for_limit(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            min_bytes: (max_bytes / 8).max(1),
        }
    }
}

/// Split `text` into sentence chunks. Sentences accumulate greedily: a chunk
/// closes when the next sentence would cross `max_bytes` while the chunk is
/// already past `min_bytes`. A single sentence longer than the threshold
/// becomes its own oversized chunk rather than being cut mid-sentence.
pub fn split_sentences(text: &str, policy: ChunkPolicy, url: Option<&str>) -> Vec<Chunk> {
    let captured_at = Utc::now();
    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in sentences(text) {
        if current.len() + sentence.len() > policy.max_bytes && current.len() > policy.min_bytes {
            push_chunk(&mut chunks, &mut current, url, captured_at);
        }
        current.push_str(sentence);
    }
    push_chunk(&mut chunks, &mut current, url, captured_at);
    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, current: &mut String, url: Option<&str>, captured_at: DateTime<Utc>) {
    let text = current.trim();
    if text.is_empty() {
        current.clear();
        return;
    }
    chunks.push(Chunk {
        id: chunk_id(text),
        text: text.to_string(),
        meta: ChunkMeta {
            url: url.map(str::to_string),
            index: chunks.len(),
            captured_at,
        },
    });
    current.clear();
}

fn chunk_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Sentence slices of `text`, split after terminal punctuation and the
/// whitespace run following it. Concatenating the slices yields `text`.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?' | '\n') {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = iter.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = j + next.len_utf8();
            iter.next();
        }
        out.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Element-wise arithmetic mean across chunk vectors. Lossy on purpose: one
/// pooled vector stands in for the whole document. Vectors whose length
/// differs from the first are skipped.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dims = first.len();
    let mut sum = vec![0.0f64; dims];
    let mut counted = 0usize;
    for vector in vectors {
        if vector.len() != dims {
            continue;
        }
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += f64::from(*value);
        }
        counted += 1;
    }
    sum.into_iter().map(|total| (total / counted as f64) as f32).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn policy(max: usize, min: usize) -> ChunkPolicy {
        ChunkPolicy {
            max_bytes: max,
            min_bytes: min,
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_sentences("One sentence. Another one.", policy(1000, 10), None);
        assert_eq!(chunks.len(), 1, "text under the threshold should stay whole");
        assert_eq!(chunks[0].text, "One sentence. Another one.");
        assert_eq!(chunks[0].meta.index, 0);
    }

    #[test]
    fn long_text_splits_on_sentence_boundaries() {
        let text = "Alpha alpha alpha. Beta beta beta. Gamma gamma gamma. Delta delta delta.";
        let chunks = split_sentences(text, policy(40, 10), None);
        assert!(chunks.len() >= 2, "expected a split, got {} chunk(s)", chunks.len());
        for chunk in &chunks {
            assert!(
                chunk.text.ends_with('.'),
                "chunks should end at sentence boundaries: {:?}",
                chunk.text
            );
        }
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
        assert_eq!(joined, text, "splitting should not lose content");
    }

    #[test]
    fn oversized_single_sentence_becomes_one_chunk() {
        let sentence = format!("{} end.", "word ".repeat(50));
        let chunks = split_sentences(&sentence, policy(40, 10), None);
        assert_eq!(chunks.len(), 1, "an unsplittable sentence should stay one oversized chunk");
        assert!(chunks[0].text.len() > 40);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "First point here. Second point there. Third point everywhere. Fourth closes it.";
        let a = split_sentences(text, policy(45, 10), Some("https://example.com"));
        let b = split_sentences(text, policy(45, 10), Some("https://example.com"));
        let texts_a: Vec<&str> = a.iter().map(|c| c.text.as_str()).collect();
        let texts_b: Vec<&str> = b.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts_a, texts_b, "same input and policy should chunk identically");
        let ids_a: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids_a, ids_b, "chunk ids are content-derived and stable");
    }

    #[test]
    fn chunk_ids_differ_per_content() {
        let chunks = split_sentences("One sentence here. Completely different text.", policy(25, 5), None);
        assert!(chunks.len() >= 2);
        assert_ne!(chunks[0].id, chunks[1].id);
        assert_eq!(chunks[0].id.len(), 16);
    }

    #[test]
    fn mean_pool_averages_elementwise() {
        let pooled = mean_pool(&[vec![1.0, 0.0, 3.0], vec![3.0, 2.0, 1.0]]);
        assert_eq!(pooled, vec![2.0, 1.0, 2.0]);
    }

    #[test]
    fn mean_pool_skips_mismatched_vectors() {
        let pooled = mean_pool(&[vec![2.0, 4.0], vec![1.0], vec![4.0, 2.0]]);
        assert_eq!(pooled, vec![3.0, 3.0], "the odd-length vector should not count");
    }

    #[test]
    fn mean_pool_of_nothing_is_empty() {
        assert!(mean_pool(&[]).is_empty());
    }
}
